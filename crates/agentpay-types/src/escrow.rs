//! Escrow types for AgentPay
//!
//! An escrow locks a payer's funds for one task until the agent proves
//! completion and the payer releases, or until the payer refunds an escrow
//! that was never completed.
//!
//! The ledger stores an escrow as four independent flags. Inside AgentPay the
//! lifecycle is an [`EscrowState`] tagged union, so combinations such as
//! "released and refunded" cannot be constructed. [`RawEscrow`] is the
//! ledger-native view and [`EscrowRecord::from_raw`] is the only way back in.

use crate::{Address, Amount, EscrowError, EscrowId, Hash32};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of an existing escrow
///
/// A state only exists once the escrow is funded; "does not exist" is
/// represented by the absence of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum EscrowState {
    /// Funded, awaiting proof
    Pending,
    /// Proof submitted, awaiting release
    Completed { proof_hash: Hash32 },
    /// Funds paid to the agent
    Released { proof_hash: Hash32 },
    /// Funds returned to the payer
    Refunded,
}

impl EscrowState {
    /// Check if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Released { .. } | Self::Refunded)
    }

    /// Proof handle, or the zero hash if none was submitted
    pub fn proof_hash(&self) -> Hash32 {
        match self {
            Self::Completed { proof_hash } | Self::Released { proof_hash } => *proof_hash,
            Self::Pending | Self::Refunded => Hash32::ZERO,
        }
    }

    /// Display status label
    pub fn status(&self) -> EscrowStatus {
        match self {
            Self::Pending => EscrowStatus::Pending,
            Self::Completed { .. } => EscrowStatus::Completed,
            Self::Released { .. } => EscrowStatus::Settled,
            Self::Refunded => EscrowStatus::Refunded,
        }
    }

    /// Ledger-native flag view of this state
    pub fn flags(&self) -> EscrowFlags {
        EscrowFlags {
            funded: true,
            completed: matches!(self, Self::Completed { .. } | Self::Released { .. }),
            released: matches!(self, Self::Released { .. }),
            refunded: matches!(self, Self::Refunded),
        }
    }
}

/// Status label reported in audit records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EscrowStatus {
    Pending,
    Completed,
    Settled,
    Refunded,
}

impl EscrowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Settled => "settled",
            Self::Refunded => "refunded",
        }
    }
}

impl fmt::Display for EscrowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The four storage flags kept by the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct EscrowFlags {
    pub funded: bool,
    pub completed: bool,
    pub released: bool,
    pub refunded: bool,
}

impl EscrowFlags {
    /// Status label by precedence: refunded > released > completed > pending
    pub fn status(&self) -> EscrowStatus {
        if self.refunded {
            EscrowStatus::Refunded
        } else if self.released {
            EscrowStatus::Settled
        } else if self.completed {
            EscrowStatus::Completed
        } else {
            EscrowStatus::Pending
        }
    }
}

/// Which recorded identity a caller was checked against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Payer,
    Agent,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Payer => f.write_str("payer"),
            Self::Agent => f.write_str("agent"),
        }
    }
}

/// Why a transition was refused by the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransitionRejection {
    AlreadyCompleted,
    AlreadyReleased,
    AlreadyRefunded,
    NotCompleted,
}

impl fmt::Display for TransitionRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::AlreadyCompleted => "proof already submitted",
            Self::AlreadyReleased => "payment already released",
            Self::AlreadyRefunded => "payment already refunded",
            Self::NotCompleted => "no proof submitted",
        };
        f.write_str(text)
    }
}

/// Ledger-native escrow record
///
/// Reading an id that was never allocated yields the zero-valued record
/// (`funded == false`). Callers must check `funded` before trusting any other
/// field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RawEscrow {
    pub payer: Address,
    pub agent: Address,
    pub amount: Amount,
    pub task_id: Hash32,
    pub proof_hash: Hash32,
    pub funded: bool,
    pub completed: bool,
    pub released: bool,
    pub refunded: bool,
}

impl RawEscrow {
    pub fn flags(&self) -> EscrowFlags {
        EscrowFlags {
            funded: self.funded,
            completed: self.completed,
            released: self.released,
            refunded: self.refunded,
        }
    }
}

/// An escrow in AgentPay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowRecord {
    /// Ledger-assigned identifier
    pub id: EscrowId,
    /// Identity that funded the escrow
    pub payer: Address,
    /// Identity paid on release
    pub agent: Address,
    /// Locked amount
    pub amount: Amount,
    /// Content hash of the off-chain negotiation
    pub task_id: Hash32,
    /// Lifecycle state
    pub state: EscrowState,
}

impl EscrowRecord {
    /// Create a freshly funded escrow
    pub fn new(id: EscrowId, payer: Address, agent: Address, amount: Amount, task_id: Hash32) -> Self {
        Self {
            id,
            payer,
            agent,
            amount,
            task_id,
            state: EscrowState::Pending,
        }
    }

    /// Proof handle, or the zero hash if none was submitted
    pub fn proof_hash(&self) -> Hash32 {
        self.state.proof_hash()
    }

    pub fn status(&self) -> EscrowStatus {
        self.state.status()
    }

    /// Convert to the ledger-native representation
    pub fn to_raw(&self) -> RawEscrow {
        let flags = self.state.flags();
        RawEscrow {
            payer: self.payer,
            agent: self.agent,
            amount: self.amount,
            task_id: self.task_id,
            proof_hash: self.proof_hash(),
            funded: flags.funded,
            completed: flags.completed,
            released: flags.released,
            refunded: flags.refunded,
        }
    }

    /// Decode a ledger-native record
    ///
    /// Returns `Ok(None)` for an unfunded (never allocated) id. Flag
    /// combinations no transition sequence can produce are reported as a
    /// [`EscrowError::ConsistencyViolation`].
    pub fn from_raw(id: EscrowId, raw: &RawEscrow) -> Result<Option<Self>, EscrowError> {
        if !raw.funded {
            return Ok(None);
        }

        let violation = |detail: &str| EscrowError::ConsistencyViolation {
            escrow_id: id,
            detail: detail.to_string(),
        };

        let state = match (raw.completed, raw.released, raw.refunded) {
            (false, false, false) => EscrowState::Pending,
            (true, false, false) => EscrowState::Completed {
                proof_hash: raw.proof_hash,
            },
            (true, true, false) => EscrowState::Released {
                proof_hash: raw.proof_hash,
            },
            (false, false, true) => EscrowState::Refunded,
            (_, true, true) => return Err(violation("escrow is both released and refunded")),
            (false, true, false) => return Err(violation("escrow released without completion")),
            (true, false, true) => return Err(violation("escrow refunded after completion")),
        };

        if raw.completed && raw.proof_hash.is_zero() {
            return Err(violation("completed escrow has a zero proof hash"));
        }
        if !raw.completed && !raw.proof_hash.is_zero() {
            return Err(violation("proof hash set on an escrow that is not completed"));
        }

        Ok(Some(Self {
            id,
            payer: raw.payer,
            agent: raw.agent,
            amount: raw.amount,
            task_id: raw.task_id,
            state,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keccak256;

    fn sample(state: EscrowState) -> EscrowRecord {
        EscrowRecord {
            state,
            ..EscrowRecord::new(
                EscrowId(3),
                Address::from_label("payer"),
                Address::from_label("agent"),
                Amount(500),
                keccak256(b"task"),
            )
        }
    }

    #[test]
    fn test_status_precedence() {
        let mut flags = EscrowFlags {
            funded: true,
            ..Default::default()
        };
        assert_eq!(flags.status(), EscrowStatus::Pending);
        flags.completed = true;
        assert_eq!(flags.status(), EscrowStatus::Completed);
        flags.released = true;
        assert_eq!(flags.status(), EscrowStatus::Settled);
        flags.refunded = true;
        assert_eq!(flags.status(), EscrowStatus::Refunded);
    }

    #[test]
    fn test_terminal_states() {
        assert!(!EscrowState::Pending.is_terminal());
        assert!(EscrowState::Refunded.is_terminal());
        assert!(EscrowState::Released {
            proof_hash: keccak256(b"p")
        }
        .is_terminal());
    }

    #[test]
    fn test_raw_roundtrip_for_every_state() {
        let proof = keccak256(b"proof");
        for state in [
            EscrowState::Pending,
            EscrowState::Completed { proof_hash: proof },
            EscrowState::Released { proof_hash: proof },
            EscrowState::Refunded,
        ] {
            let record = sample(state);
            let raw = record.to_raw();
            assert_eq!(raw.flags().status(), record.status());
            let decoded = EscrowRecord::from_raw(record.id, &raw).unwrap().unwrap();
            assert_eq!(decoded, record);
        }
    }

    #[test]
    fn test_unfunded_raw_decodes_to_none() {
        assert_eq!(EscrowRecord::from_raw(EscrowId(0), &RawEscrow::default()).unwrap(), None);
    }

    #[test]
    fn test_illegal_flag_combinations_rejected() {
        let mut raw = sample(EscrowState::Released {
            proof_hash: keccak256(b"p"),
        })
        .to_raw();
        raw.refunded = true;
        assert!(matches!(
            EscrowRecord::from_raw(EscrowId(3), &raw),
            Err(EscrowError::ConsistencyViolation { .. })
        ));

        let mut raw = sample(EscrowState::Pending).to_raw();
        raw.completed = true;
        assert!(matches!(
            EscrowRecord::from_raw(EscrowId(3), &raw),
            Err(EscrowError::ConsistencyViolation { .. })
        ));
    }

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&EscrowStatus::Settled).unwrap(),
            "\"settled\""
        );
    }
}
