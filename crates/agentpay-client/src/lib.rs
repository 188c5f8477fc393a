//! AgentPay Client - Issue escrow transitions as one identity
//!
//! An [`EscrowClient`] is bound to one caller identity and one ledger. It
//! keeps no state of its own: every call goes to the ledger, every mutating
//! call awaits inclusion and returns the transaction hash. Construct one per
//! identity and use them concurrently against the same escrow; the ledger
//! decides who wins.
//!
//! ```ignore
//! let payer = EscrowClient::new(ledger.clone(), payer_address);
//! let agent = payer.with_identity(agent_address);
//!
//! let created = payer.create(agent_address, task_id, amount).await?;
//! agent.submit_proof(created.escrow_id, proof_hash).await?;
//! payer.settle(created.escrow_id).await?;
//! ```
//!
//! # Retries
//!
//! [`EscrowClient::create`] is **not idempotent**. If a create call fails
//! with `LedgerUnavailable` the transaction may or may not have committed;
//! resubmitting it blindly can mint a second escrow and lock the amount
//! twice. Re-read the event log for the payer before retrying.

use std::sync::Arc;

use agentpay_types::{
    Address, Amount, ChainInfo, EscrowError, EscrowId, EscrowRecord, EventFilter, Hash32, LogEntry,
    RawEscrow, Result, TxHash,
};
use serde::{Deserialize, Serialize};

pub use agentpay_ledger::{InMemoryLedger, Ledger, LedgerRequest, TxReceipt};

// ============================================================================
// Responses
// ============================================================================

/// Output of a committed create
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Created {
    pub escrow_id: EscrowId,
    pub tx_hash: TxHash,
}

// ============================================================================
// Client
// ============================================================================

/// Stateless escrow client bound to one identity
#[derive(Clone)]
pub struct EscrowClient {
    ledger: Arc<dyn Ledger>,
    identity: Address,
}

impl EscrowClient {
    pub fn new(ledger: Arc<dyn Ledger>, identity: Address) -> Self {
        Self { ledger, identity }
    }

    /// Client for another identity on the same ledger
    pub fn with_identity(&self, identity: Address) -> Self {
        Self {
            ledger: Arc::clone(&self.ledger),
            identity,
        }
    }

    /// Identity every transition is submitted as
    pub fn identity(&self) -> Address {
        self.identity
    }

    pub fn chain(&self) -> &ChainInfo {
        self.ledger.chain()
    }

    /// Lock `amount` for `agent` against `task_id`
    ///
    /// The caller becomes the payer. Not idempotent: see the crate docs
    /// before retrying a failed call.
    pub async fn create(&self, agent: Address, task_id: Hash32, amount: Amount) -> Result<Created> {
        let receipt = self
            .submit(LedgerRequest::Create {
                agent,
                task_id,
                value: amount,
            })
            .await?;
        Ok(Created {
            escrow_id: receipt.escrow_id,
            tx_hash: receipt.tx_hash,
        })
    }

    /// Record the proof handle; the caller must be the escrow's agent
    pub async fn submit_proof(&self, escrow_id: EscrowId, proof_hash: Hash32) -> Result<TxHash> {
        self.submit(LedgerRequest::SubmitProof {
            escrow_id,
            proof_hash,
        })
        .await
        .map(|receipt| receipt.tx_hash)
    }

    /// Release the payment to the agent; the caller must be the payer
    pub async fn settle(&self, escrow_id: EscrowId) -> Result<TxHash> {
        self.submit(LedgerRequest::Release { escrow_id })
            .await
            .map(|receipt| receipt.tx_hash)
    }

    /// Return the payment to the payer; only possible before proof
    pub async fn refund(&self, escrow_id: EscrowId) -> Result<TxHash> {
        self.submit(LedgerRequest::Refund { escrow_id })
            .await
            .map(|receipt| receipt.tx_hash)
    }

    /// Current escrow state
    ///
    /// Fails with `NotFound` for an id that was never allocated.
    pub async fn read(&self, escrow_id: EscrowId) -> Result<EscrowRecord> {
        self.try_read(escrow_id)
            .await?
            .ok_or(EscrowError::NotFound { escrow_id })
    }

    /// Current escrow state, `None` if the escrow does not exist
    pub async fn try_read(&self, escrow_id: EscrowId) -> Result<Option<EscrowRecord>> {
        let raw = self.read_raw(escrow_id).await?;
        EscrowRecord::from_raw(escrow_id, &raw)
    }

    /// Ledger-native view; unknown ids yield the zero-valued record
    pub async fn read_raw(&self, escrow_id: EscrowId) -> Result<RawEscrow> {
        self.ledger.read(escrow_id).await
    }

    /// Events matching `filter`, in ledger order
    pub async fn events(&self, filter: &EventFilter) -> Result<Vec<LogEntry>> {
        self.ledger.query_events(filter).await
    }

    async fn submit(&self, request: LedgerRequest) -> Result<TxReceipt> {
        tracing::debug!(
            caller = %self.identity,
            event = %request.event_kind(),
            "Submitting transaction"
        );
        self.ledger.submit(&self.identity, request).await
    }
}

impl std::fmt::Debug for EscrowClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EscrowClient")
            .field("identity", &self.identity)
            .field("chain", self.ledger.chain())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentpay_types::{keccak256, EscrowState};

    fn setup() -> (Arc<InMemoryLedger>, EscrowClient, EscrowClient) {
        let ledger = Arc::new(InMemoryLedger::default());
        let payer = Address::from_label("payer");
        ledger.fund(payer, Amount(1_000)).unwrap();

        let payer_client = EscrowClient::new(ledger.clone(), payer);
        let agent_client = payer_client.with_identity(Address::from_label("agent"));
        (ledger, payer_client, agent_client)
    }

    #[tokio::test]
    async fn test_create_then_read() {
        let (_, payer, agent) = setup();
        let created = payer
            .create(agent.identity(), keccak256(b"task"), Amount(100))
            .await
            .unwrap();

        let record = payer.read(created.escrow_id).await.unwrap();
        assert_eq!(record.payer, payer.identity());
        assert_eq!(record.agent, agent.identity());
        assert_eq!(record.state, EscrowState::Pending);
        assert!(!created.tx_hash.is_zero());
    }

    #[tokio::test]
    async fn test_read_unknown_escrow() {
        let (_, payer, _) = setup();
        assert_eq!(payer.try_read(EscrowId(5)).await.unwrap(), None);
        assert_eq!(
            payer.read(EscrowId(5)).await.unwrap_err(),
            EscrowError::NotFound {
                escrow_id: EscrowId(5)
            }
        );
        assert!(!payer.read_raw(EscrowId(5)).await.unwrap().funded);
    }

    #[tokio::test]
    async fn test_each_transition_returns_its_tx_hash() {
        let (_, payer, agent) = setup();
        let created = payer
            .create(agent.identity(), keccak256(b"task"), Amount(100))
            .await
            .unwrap();
        let proof_tx = agent
            .submit_proof(created.escrow_id, keccak256(b"proof"))
            .await
            .unwrap();
        let settle_tx = payer.settle(created.escrow_id).await.unwrap();

        let log = payer
            .events(&EventFilter::all().with_escrow(created.escrow_id))
            .await
            .unwrap();
        let hashes: Vec<_> = log.iter().map(|e| e.tx_hash).collect();
        assert_eq!(hashes, vec![created.tx_hash, proof_tx, settle_tx]);
    }

    #[test]
    fn test_debug_shows_identity() {
        let (_, payer, _) = setup();
        assert!(format!("{:?}", payer).contains(&format!("{:?}", payer.identity())));
    }
}
