//! Escrow state machine
//!
//! ```text
//! Pending ──submit_proof──▶ Completed ──release──▶ Released
//!    │
//!    └──────refund─────────▶ Refunded
//! ```
//!
//! Every transition checks, in order: input well-formedness, the caller's
//! capability (plain equality against the recorded payer or agent), then the
//! current state. Nothing is mutated here.

use agentpay_types::{
    Address, Amount, EscrowError, EscrowEvent, EscrowRecord, EscrowState, Hash32, Result, Role,
    TransitionRejection,
};

/// A requested transition on an existing escrow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Agent records the proof handle
    SubmitProof { proof_hash: Hash32 },
    /// Payer pays the agent
    Release,
    /// Payer takes the funds back
    Refund,
}

impl Transition {
    /// Identity the caller must match
    pub fn required_role(&self) -> Role {
        match self {
            Self::SubmitProof { .. } => Role::Agent,
            Self::Release | Self::Refund => Role::Payer,
        }
    }
}

/// Value movement implied by a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Payout {
    pub to: Address,
    pub amount: Amount,
}

/// Result of an accepted transition, not yet committed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionOutcome {
    pub next: EscrowState,
    pub payout: Option<Payout>,
    pub event: EscrowEvent,
}

/// Validate the inputs of a create request
///
/// Runs before any state is touched, so a rejected create consumes no id.
pub fn validate_create(agent: &Address, amount: Amount) -> Result<()> {
    if agent.is_zero() {
        return Err(EscrowError::invalid_input(
            "agent",
            "agent must be a non-zero address",
        ));
    }
    if amount.is_zero() {
        return Err(EscrowError::invalid_input(
            "amount",
            "escrow must be funded with a positive amount",
        ));
    }
    Ok(())
}

/// Evaluate a transition against the current record
pub fn apply(record: &EscrowRecord, caller: &Address, transition: Transition) -> Result<TransitionOutcome> {
    if let Transition::SubmitProof { proof_hash } = transition {
        if proof_hash.is_zero() {
            return Err(
                EscrowError::invalid_input("proof_hash", "proof hash must be non-zero")
                    .with_escrow(record.id),
            );
        }
    }

    authorize(record, caller, transition.required_role())?;

    let reject = |rejection| Err(EscrowError::rejected(record.id, rejection));

    match transition {
        Transition::SubmitProof { proof_hash } => match record.state {
            EscrowState::Pending => Ok(TransitionOutcome {
                next: EscrowState::Completed { proof_hash },
                payout: None,
                event: EscrowEvent::ProofSubmitted {
                    escrow_id: record.id,
                    agent: record.agent,
                    proof_hash,
                },
            }),
            EscrowState::Completed { .. } | EscrowState::Released { .. } => {
                reject(TransitionRejection::AlreadyCompleted)
            }
            EscrowState::Refunded => reject(TransitionRejection::AlreadyRefunded),
        },
        Transition::Release => match record.state {
            EscrowState::Completed { proof_hash } => Ok(TransitionOutcome {
                next: EscrowState::Released { proof_hash },
                payout: Some(Payout {
                    to: record.agent,
                    amount: record.amount,
                }),
                event: EscrowEvent::PaymentReleased {
                    escrow_id: record.id,
                    payer: record.payer,
                    agent: record.agent,
                    amount: record.amount,
                },
            }),
            EscrowState::Pending => reject(TransitionRejection::NotCompleted),
            EscrowState::Released { .. } => reject(TransitionRejection::AlreadyReleased),
            EscrowState::Refunded => reject(TransitionRejection::AlreadyRefunded),
        },
        Transition::Refund => match record.state {
            EscrowState::Pending => Ok(TransitionOutcome {
                next: EscrowState::Refunded,
                payout: Some(Payout {
                    to: record.payer,
                    amount: record.amount,
                }),
                event: EscrowEvent::PaymentRefunded {
                    escrow_id: record.id,
                    payer: record.payer,
                    amount: record.amount,
                },
            }),
            EscrowState::Completed { .. } => reject(TransitionRejection::AlreadyCompleted),
            EscrowState::Released { .. } => reject(TransitionRejection::AlreadyReleased),
            EscrowState::Refunded => reject(TransitionRejection::AlreadyRefunded),
        },
    }
}

fn authorize(record: &EscrowRecord, caller: &Address, role: Role) -> Result<()> {
    let expected = match role {
        Role::Payer => &record.payer,
        Role::Agent => &record.agent,
    };
    if caller != expected {
        return Err(EscrowError::Unauthorized {
            escrow_id: record.id,
            caller: *caller,
            role,
        });
    }
    Ok(())
}
