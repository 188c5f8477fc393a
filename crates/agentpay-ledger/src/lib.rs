//! AgentPay Ledger - The substrate escrows live on
//!
//! The ledger executes escrow transitions atomically, rejects illegal ones,
//! and emits exactly one event per accepted transition into an append-only
//! log. Everything above it talks to it through three operations:
//!
//! - **submit**: run one transition as the given caller, await inclusion
//! - **read**: the ledger-native view of one escrow (zero-valued if unknown)
//! - **query_events**: filtered scan of the event log
//!
//! [`InMemoryLedger`] implements the surface in-process on top of
//! [`agentpay_escrow::EscrowStore`], with per-address balances and
//! deterministic transaction hashes.

use agentpay_types::{
    Address, Amount, ChainInfo, EscrowId, EventFilter, EventKind, Hash32, LogEntry, RawEscrow,
    Result, TxHash,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

mod memory;

pub use memory::InMemoryLedger;

/// A mutating request against the escrow contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum LedgerRequest {
    /// Lock `value` from the caller for `agent`
    Create {
        agent: Address,
        task_id: Hash32,
        value: Amount,
    },
    SubmitProof {
        escrow_id: EscrowId,
        proof_hash: Hash32,
    },
    Release {
        escrow_id: EscrowId,
    },
    Refund {
        escrow_id: EscrowId,
    },
}

impl LedgerRequest {
    /// Kind of event the request emits when accepted
    pub fn event_kind(&self) -> EventKind {
        match self {
            Self::Create { .. } => EventKind::Created,
            Self::SubmitProof { .. } => EventKind::ProofSubmitted,
            Self::Release { .. } => EventKind::Released,
            Self::Refund { .. } => EventKind::Refunded,
        }
    }

    /// Escrow the request targets, `None` for a create
    pub fn escrow_id(&self) -> Option<EscrowId> {
        match self {
            Self::Create { .. } => None,
            Self::SubmitProof { escrow_id, .. }
            | Self::Release { escrow_id }
            | Self::Refund { escrow_id } => Some(*escrow_id),
        }
    }
}

/// Inclusion receipt for a committed request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    pub tx_hash: TxHash,
    pub block_number: u64,
    /// Escrow the transaction touched (the new id for a create)
    pub escrow_id: EscrowId,
}

/// Ledger surface consumed by the client and the reconciler
///
/// Every `submit` either commits fully or fails with no observable effect.
/// The ledger is the single serialisation point for transitions; callers
/// must not cache state across calls.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Chain this ledger belongs to
    fn chain(&self) -> &ChainInfo;

    /// Submit a transition and wait for inclusion
    async fn submit(&self, caller: &Address, request: LedgerRequest) -> Result<TxReceipt>;

    /// Read one escrow; unknown ids yield the zero-valued record
    async fn read(&self, escrow_id: EscrowId) -> Result<RawEscrow>;

    /// Events matching `filter`, in ledger order
    async fn query_events(&self, filter: &EventFilter) -> Result<Vec<LogEntry>>;
}

/// Deterministic transaction hash
///
/// Keccak-256 over the chain id, the ledger sequence number, the event kind
/// and the escrow id.
pub fn transaction_hash(chain_id: u64, sequence: u64, kind: EventKind, escrow_id: EscrowId) -> TxHash {
    let mut preimage = Vec::with_capacity(48);
    preimage.extend_from_slice(&chain_id.to_be_bytes());
    preimage.extend_from_slice(&sequence.to_be_bytes());
    preimage.extend_from_slice(kind.as_str().as_bytes());
    preimage.extend_from_slice(&escrow_id.value().to_be_bytes());
    TxHash::from_bytes(*agentpay_types::keccak256(&preimage).as_bytes())
}
