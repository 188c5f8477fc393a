//! Error types for AgentPay
//!
//! Every precondition violation is detected before any mutation, so a failed
//! call never leaves a partial effect behind. Each variant carries the
//! offending escrow id and/or identity for diagnostics.

use crate::{Address, EscrowId, Role, TransitionRejection};
use thiserror::Error;

/// Result type for AgentPay escrow operations
pub type Result<T> = std::result::Result<T, EscrowError>;

/// AgentPay escrow error taxonomy
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EscrowError {
    /// Malformed request (zero agent, non-positive amount, zero proof)
    ///
    /// `escrow_id` is `None` only for a create.
    #[error("Invalid input: {field} - {reason}")]
    InvalidInput {
        escrow_id: Option<EscrowId>,
        field: String,
        reason: String,
    },

    /// Unknown or unfunded escrow
    #[error("Escrow {escrow_id} not found")]
    NotFound { escrow_id: EscrowId },

    /// Caller does not match the recorded identity
    #[error("Unauthorized: {caller} is not the {role} of escrow {escrow_id}")]
    Unauthorized {
        escrow_id: EscrowId,
        caller: Address,
        role: Role,
    },

    /// The escrow's state forbids the transition
    #[error("Escrow {escrow_id} cannot transition: {rejection}")]
    InvalidStateTransition {
        escrow_id: EscrowId,
        rejection: TransitionRejection,
    },

    /// Value movement rejected by the ledger
    #[error("Transfer from {from} to {to} failed: {reason}")]
    TransferFailed {
        escrow_id: Option<EscrowId>,
        from: Address,
        to: Address,
        reason: String,
    },

    /// Ledger transport or infrastructure failure
    #[error("Ledger unavailable: {reason}")]
    LedgerUnavailable {
        escrow_id: Option<EscrowId>,
        reason: String,
    },

    /// Ledger state or log contradicts the escrow invariants
    #[error("Consistency violation on escrow {escrow_id}: {detail}")]
    ConsistencyViolation { escrow_id: EscrowId, detail: String },
}

impl EscrowError {
    /// Create an invalid input error
    pub fn invalid_input(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            escrow_id: None,
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a ledger unavailable error
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::LedgerUnavailable {
            escrow_id: None,
            reason: reason.into(),
        }
    }

    /// Attach the escrow a request targeted
    ///
    /// Fills the id of variants that may be raised before the escrow is
    /// known; an id that is already set is kept.
    pub fn with_escrow(mut self, id: EscrowId) -> Self {
        if let Self::InvalidInput { escrow_id, .. }
        | Self::TransferFailed { escrow_id, .. }
        | Self::LedgerUnavailable { escrow_id, .. } = &mut self
        {
            escrow_id.get_or_insert(id);
        }
        self
    }

    /// Create a state transition error
    pub fn rejected(escrow_id: EscrowId, rejection: TransitionRejection) -> Self {
        Self::InvalidStateTransition {
            escrow_id,
            rejection,
        }
    }

    /// Check whether a caller may retry after re-reading state
    ///
    /// The core itself never retries.
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::LedgerUnavailable { .. })
    }

    /// Get a stable error code
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidInput { .. } => "INVALID_INPUT",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Unauthorized { .. } => "UNAUTHORIZED",
            Self::InvalidStateTransition { .. } => "INVALID_STATE_TRANSITION",
            Self::TransferFailed { .. } => "TRANSFER_FAILED",
            Self::LedgerUnavailable { .. } => "LEDGER_UNAVAILABLE",
            Self::ConsistencyViolation { .. } => "CONSISTENCY_VIOLATION",
        }
    }

    /// The escrow the error refers to, if any
    pub fn escrow_id(&self) -> Option<EscrowId> {
        match self {
            Self::NotFound { escrow_id }
            | Self::Unauthorized { escrow_id, .. }
            | Self::InvalidStateTransition { escrow_id, .. }
            | Self::ConsistencyViolation { escrow_id, .. } => Some(*escrow_id),
            Self::InvalidInput { escrow_id, .. }
            | Self::TransferFailed { escrow_id, .. }
            | Self::LedgerUnavailable { escrow_id, .. } => *escrow_id,
        }
    }
}
