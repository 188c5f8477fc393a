//! In-memory ledger
//!
//! Holds locked funds in a contract account and moves them atomically with
//! the state flip: all value movement for a transition happens inside the
//! escrow's critical section, and a failed movement aborts the transition.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use agentpay_escrow::{EscrowStore, Transition};
use agentpay_types::{
    Address, Amount, ChainInfo, EscrowError, EscrowEvent, EscrowId, EventFilter, Hash32, LogEntry,
    RawEscrow, Result,
};
use async_trait::async_trait;
use dashmap::{DashMap, DashSet};

use crate::{transaction_hash, Ledger, LedgerRequest, TxReceipt};

/// Label the contract account address is derived from
const CONTRACT_LABEL: &str = "agentpay-escrow-contract";

/// In-process ledger backed by an [`EscrowStore`]
///
/// Thread-safe; share it behind an `Arc`. Calls against different escrows
/// never take the same escrow lock, but they are not lock-free with respect
/// to each other: the balance and log maps are sharded `DashMap`s, so two
/// commits whose accounts or escrow ids hash to the same shard briefly
/// serialise on that shard's write lock, and every commit bumps the shared
/// sequence counter.
pub struct InMemoryLedger {
    chain: ChainInfo,
    contract: Address,
    store: EscrowStore,
    balances: DashMap<Address, Amount>,
    /// Addresses that refuse incoming value
    rejecting: DashSet<Address>,
    /// Append-only event log, keyed by escrow
    logs: DashMap<EscrowId, Vec<LogEntry>>,
    /// Last committed ledger sequence number
    sequence: AtomicU64,
    available: AtomicBool,
}

impl InMemoryLedger {
    pub fn new(chain: ChainInfo) -> Self {
        Self {
            chain,
            contract: Address::from_label(CONTRACT_LABEL),
            store: EscrowStore::new(),
            balances: DashMap::new(),
            rejecting: DashSet::new(),
            logs: DashMap::new(),
            sequence: AtomicU64::new(0),
            available: AtomicBool::new(true),
        }
    }

    /// Account holding locked escrow funds
    pub fn contract_address(&self) -> Address {
        self.contract
    }

    /// Mint value into an account
    pub fn fund(&self, address: Address, amount: Amount) -> Result<Amount> {
        self.credit(&Address::ZERO, &address, amount)
    }

    pub fn balance_of(&self, address: &Address) -> Amount {
        self.balances
            .get(address)
            .map(|balance| *balance)
            .unwrap_or_default()
    }

    /// Make every transfer to `address` fail
    pub fn reject_transfers_to(&self, address: Address) {
        self.rejecting.insert(address);
    }

    pub fn accept_transfers_to(&self, address: &Address) {
        self.rejecting.remove(address);
    }

    /// Simulate the ledger going away; every call fails with `LedgerUnavailable`
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of escrows created so far
    pub fn escrow_count(&self) -> usize {
        self.store.len()
    }

    /// Last committed sequence number (0 before the first transaction)
    pub fn height(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }

    fn ensure_available(&self, escrow_id: Option<EscrowId>) -> Result<()> {
        if self.available.load(Ordering::SeqCst) {
            return Ok(());
        }
        let err = EscrowError::unavailable(format!("ledger {} is not reachable", self.chain.name));
        Err(match escrow_id {
            Some(id) => err.with_escrow(id),
            None => err,
        })
    }

    fn create(&self, payer: &Address, agent: Address, task_id: Hash32, value: Amount) -> Result<TxReceipt> {
        let (_, receipt) = self.store.create(*payer, agent, value, task_id, |record| {
            self.move_funds(payer, &self.contract, value)?;
            Ok(self.append(EscrowEvent::EscrowCreated {
                escrow_id: record.id,
                payer: record.payer,
                agent: record.agent,
                amount: record.amount,
                task_id: record.task_id,
            }))
        })?;
        Ok(receipt)
    }

    fn transition(&self, caller: &Address, escrow_id: EscrowId, transition: Transition) -> Result<TxReceipt> {
        let (_, receipt) = self.store.transition(escrow_id, caller, transition, |_, outcome| {
            if let Some(payout) = outcome.payout {
                self.move_funds(&self.contract, &payout.to, payout.amount)?;
            }
            Ok(self.append(outcome.event))
        })?;
        Ok(receipt)
    }

    /// Commit an event at the next sequence number
    fn append(&self, event: EscrowEvent) -> TxReceipt {
        let block_number = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let escrow_id = event.escrow_id();
        let tx_hash = transaction_hash(self.chain.chain_id, block_number, event.kind(), escrow_id);

        self.logs.entry(escrow_id).or_insert_with(Vec::new).push(LogEntry {
            tx_hash,
            block_number,
            log_index: 0,
            event,
        });

        TxReceipt {
            tx_hash,
            block_number,
            escrow_id,
        }
    }

    /// Move value between two accounts, all or nothing
    fn move_funds(&self, from: &Address, to: &Address, amount: Amount) -> Result<()> {
        if self.rejecting.contains(to) {
            return Err(EscrowError::TransferFailed {
                escrow_id: None,
                from: *from,
                to: *to,
                reason: "recipient rejects transfers".to_string(),
            });
        }

        self.debit(from, to, amount)?;
        if let Err(err) = self.credit(from, to, amount) {
            // Undo the debit; it cannot overflow, the value just left this account
            let _ = self.credit(to, from, amount);
            return Err(err);
        }
        Ok(())
    }

    fn debit(&self, from: &Address, to: &Address, amount: Amount) -> Result<Amount> {
        let insufficient = |have: Amount| EscrowError::TransferFailed {
            escrow_id: None,
            from: *from,
            to: *to,
            reason: format!("insufficient balance: have {}, need {}", have, amount),
        };

        let mut balance = self
            .balances
            .get_mut(from)
            .ok_or_else(|| insufficient(Amount::zero()))?;
        let next = balance
            .checked_sub(amount)
            .ok_or_else(|| insufficient(*balance))?;
        *balance = next;
        Ok(next)
    }

    fn credit(&self, from: &Address, to: &Address, amount: Amount) -> Result<Amount> {
        let mut balance = self.balances.entry(*to).or_insert_with(Amount::zero);
        let next = balance
            .checked_add(amount)
            .ok_or_else(|| EscrowError::TransferFailed {
                escrow_id: None,
                from: *from,
                to: *to,
                reason: "balance overflow".to_string(),
            })?;
        *balance = next;
        Ok(next)
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new(ChainInfo::local())
    }
}

#[async_trait]
impl Ledger for InMemoryLedger {
    fn chain(&self) -> &ChainInfo {
        &self.chain
    }

    async fn submit(&self, caller: &Address, request: LedgerRequest) -> Result<TxReceipt> {
        self.ensure_available(request.escrow_id())?;

        let result = match request {
            LedgerRequest::Create {
                agent,
                task_id,
                value,
            } => self.create(caller, agent, task_id, value),
            LedgerRequest::SubmitProof {
                escrow_id,
                proof_hash,
            } => self.transition(caller, escrow_id, Transition::SubmitProof { proof_hash }),
            LedgerRequest::Release { escrow_id } => {
                self.transition(caller, escrow_id, Transition::Release)
            }
            LedgerRequest::Refund { escrow_id } => {
                self.transition(caller, escrow_id, Transition::Refund)
            }
        };

        match &result {
            Ok(receipt) => tracing::info!(
                escrow_id = %receipt.escrow_id,
                caller = %caller,
                event = %request.event_kind(),
                tx_hash = %receipt.tx_hash,
                block_number = receipt.block_number,
                "Transaction committed"
            ),
            Err(err) => tracing::warn!(
                escrow_id = ?err.escrow_id(),
                caller = %caller,
                event = %request.event_kind(),
                code = err.error_code(),
                error = %err,
                "Transaction rejected"
            ),
        }

        result
    }

    async fn read(&self, escrow_id: EscrowId) -> Result<RawEscrow> {
        self.ensure_available(Some(escrow_id))?;
        Ok(self
            .store
            .get(escrow_id)
            .map(|record| record.to_raw())
            .unwrap_or_default())
    }

    async fn query_events(&self, filter: &EventFilter) -> Result<Vec<LogEntry>> {
        self.ensure_available(filter.escrow_id)?;

        let mut entries: Vec<LogEntry> = match filter.escrow_id {
            Some(escrow_id) => self
                .logs
                .get(&escrow_id)
                .map(|log| log.iter().filter(|e| filter.matches(e)).copied().collect())
                .unwrap_or_default(),
            None => self
                .logs
                .iter()
                .flat_map(|log| {
                    log.value()
                        .iter()
                        .filter(|e| filter.matches(e))
                        .copied()
                        .collect::<Vec<_>>()
                })
                .collect(),
        };
        entries.sort_by_key(|e| (e.block_number, e.log_index));

        tracing::debug!(
            kind = ?filter.kind,
            escrow_id = ?filter.escrow_id,
            matches = entries.len(),
            "Event query"
        );
        Ok(entries)
    }
}
