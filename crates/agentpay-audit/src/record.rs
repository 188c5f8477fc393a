//! Audit record schema
//!
//! The persisted artifact consumers rely on. Field names and order are
//! stable; nothing in the record depends on wall-clock time, so two
//! reconciliations of the same ledger state serialise to identical bytes.

use agentpay_types::{Address, ChainInfo, EscrowId, EscrowStatus, Hash32, TxHash};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// A reconstructed, replayable view of one escrow's lifecycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub intent: IntentSummary,
    pub trigger: TriggerSummary,
    pub escrow: EscrowSummary,
    pub proof: ProofReference,
    pub tx: Transactions,
    pub chain: ChainInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentSummary {
    pub intent_id: Value,
    pub ap2_version: Value,
    pub hash: Hash32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerSummary {
    pub x402_version: Value,
    pub payment_id: Value,
    pub hash: Hash32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscrowSummary {
    pub escrow_id: EscrowId,
    pub payer: Address,
    pub agent: Address,
    /// Decimal amount in whole units
    pub amount: String,
    pub status: EscrowStatus,
}

/// Where the proof lives; the content itself is never fetched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProofReference {
    /// Zero hash until proof is submitted
    pub proof_hash: Hash32,
    pub uri: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transactions {
    pub create_tx: TxHash,
    pub proof_tx: Option<TxHash>,
    /// Release transaction; `None` while pending and after a refund
    pub settle_tx: Option<TxHash>,
}

impl AuditRecord {
    pub fn escrow_id(&self) -> EscrowId {
        self.escrow.escrow_id
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
