//! Ledger events
//!
//! The ledger emits exactly one event per accepted transition and keeps them
//! in an append-only log. Events are the only record of *when* (in which
//! transaction) a transition happened.

use crate::{Address, Amount, EscrowId, Hash32, TxHash};
use serde::{Deserialize, Serialize};
use std::fmt;

/// An event emitted by an accepted escrow transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum EscrowEvent {
    EscrowCreated {
        escrow_id: EscrowId,
        payer: Address,
        agent: Address,
        amount: Amount,
        task_id: Hash32,
    },
    ProofSubmitted {
        escrow_id: EscrowId,
        agent: Address,
        proof_hash: Hash32,
    },
    PaymentReleased {
        escrow_id: EscrowId,
        payer: Address,
        agent: Address,
        amount: Amount,
    },
    PaymentRefunded {
        escrow_id: EscrowId,
        payer: Address,
        amount: Amount,
    },
}

impl EscrowEvent {
    /// The escrow this event belongs to
    pub fn escrow_id(&self) -> EscrowId {
        match self {
            Self::EscrowCreated { escrow_id, .. }
            | Self::ProofSubmitted { escrow_id, .. }
            | Self::PaymentReleased { escrow_id, .. }
            | Self::PaymentRefunded { escrow_id, .. } => *escrow_id,
        }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Self::EscrowCreated { .. } => EventKind::Created,
            Self::ProofSubmitted { .. } => EventKind::ProofSubmitted,
            Self::PaymentReleased { .. } => EventKind::Released,
            Self::PaymentRefunded { .. } => EventKind::Refunded,
        }
    }
}

/// Event discriminant used for filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    Created,
    ProofSubmitted,
    Released,
    Refunded,
}

impl EventKind {
    /// Name of the event as emitted by the ledger
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "EscrowCreated",
            Self::ProofSubmitted => "ProofSubmitted",
            Self::Released => "PaymentReleased",
            Self::Refunded => "PaymentRefunded",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An event together with its position in the log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Transaction that emitted the event
    pub tx_hash: TxHash,
    /// Ledger position of that transaction
    pub block_number: u64,
    /// Position within the transaction
    pub log_index: u32,
    pub event: EscrowEvent,
}

/// Filter over the event log
///
/// `None` fields match everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EventFilter {
    pub kind: Option<EventKind>,
    pub escrow_id: Option<EscrowId>,
}

impl EventFilter {
    /// Match every event
    pub fn all() -> Self {
        Self::default()
    }

    /// Events of one kind for one escrow
    pub fn for_escrow(kind: EventKind, escrow_id: EscrowId) -> Self {
        Self {
            kind: Some(kind),
            escrow_id: Some(escrow_id),
        }
    }

    pub fn with_kind(mut self, kind: EventKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn with_escrow(mut self, escrow_id: EscrowId) -> Self {
        self.escrow_id = Some(escrow_id);
        self
    }

    pub fn matches(&self, entry: &LogEntry) -> bool {
        self.kind.map_or(true, |k| k == entry.event.kind())
            && self.escrow_id.map_or(true, |id| id == entry.event.escrow_id())
    }
}
