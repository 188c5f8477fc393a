//! Audit errors

use agentpay_types::{EscrowError, EscrowId, Hash32};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AuditError>;

/// Errors raised while reconciling or persisting audit records
///
/// `LedgerUnavailable` and `ConsistencyViolation` end the call: the
/// reconciler never falls back to partial data.
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("Escrow {escrow_id} does not exist")]
    EscrowUnknown { escrow_id: EscrowId },

    #[error("Ledger unavailable: {reason}")]
    LedgerUnavailable {
        escrow_id: Option<EscrowId>,
        reason: String,
    },

    #[error("Consistency violation on escrow {escrow_id}: {detail}")]
    ConsistencyViolation { escrow_id: EscrowId, detail: String },

    #[error("Escrow {escrow_id} is bound to task {task_id}, but the intent hashes to {intent_hash}")]
    TaskMismatch {
        escrow_id: EscrowId,
        task_id: Hash32,
        intent_hash: Hash32,
    },

    #[error("Invalid document: {reason}")]
    InvalidDocument { reason: String },

    #[error(transparent)]
    Ledger(EscrowError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AuditError {
    pub(crate) fn violation(escrow_id: EscrowId, detail: impl Into<String>) -> Self {
        Self::ConsistencyViolation {
            escrow_id,
            detail: detail.into(),
        }
    }

    /// Check whether re-running the reconciliation may succeed
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::LedgerUnavailable { .. })
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::EscrowUnknown { .. } => "ESCROW_UNKNOWN",
            Self::LedgerUnavailable { .. } => "LEDGER_UNAVAILABLE",
            Self::ConsistencyViolation { .. } => "CONSISTENCY_VIOLATION",
            Self::TaskMismatch { .. } => "TASK_MISMATCH",
            Self::InvalidDocument { .. } => "INVALID_DOCUMENT",
            Self::Ledger(err) => err.error_code(),
            Self::Io(_) => "IO_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }
}

impl From<EscrowError> for AuditError {
    fn from(err: EscrowError) -> Self {
        match err {
            EscrowError::NotFound { escrow_id } => Self::EscrowUnknown { escrow_id },
            EscrowError::LedgerUnavailable { escrow_id, reason } => {
                Self::LedgerUnavailable { escrow_id, reason }
            }
            EscrowError::ConsistencyViolation { escrow_id, detail } => {
                Self::ConsistencyViolation { escrow_id, detail }
            }
            other => Self::Ledger(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escrow_errors_map_to_audit_kinds() {
        let err: AuditError = EscrowError::unavailable("timeout")
            .with_escrow(EscrowId(2))
            .into();
        assert!(err.is_retriable());
        assert_eq!(err.error_code(), "LEDGER_UNAVAILABLE");
        assert!(matches!(
            err,
            AuditError::LedgerUnavailable { escrow_id: Some(id), .. } if id == EscrowId(2)
        ));

        let err: AuditError = EscrowError::NotFound {
            escrow_id: EscrowId(4),
        }
        .into();
        assert!(matches!(err, AuditError::EscrowUnknown { escrow_id } if escrow_id == EscrowId(4)));

        let err: AuditError = EscrowError::invalid_input("agent", "zero").into();
        assert_eq!(err.error_code(), "INVALID_INPUT");
        assert!(!err.is_retriable());
    }
}
