//! Audit projection
//!
//! A pure function from (escrow snapshot, event list, negotiation documents)
//! to an [`AuditRecord`]. No ledger access happens here, so the projection
//! can be driven by fabricated event lists.
//!
//! The record describes the escrow as of the snapshot. The snapshot is read
//! before the log is queried, so the log may run ahead of it by transitions
//! committed in between; such events are left out of the record. Events the
//! snapshot could never reach, duplicate events and missing events the
//! snapshot implies are consistency violations.

use agentpay_types::{
    ChainInfo, EscrowEvent, EscrowId, EscrowRecord, EscrowState, EventKind, Hash32, LogEntry,
};

use crate::document::{task_id_for, Negotiation};
use crate::error::{AuditError, Result};
use crate::record::{
    AuditRecord, EscrowSummary, IntentSummary, ProofReference, Transactions, TriggerSummary,
};

/// Reconciliation settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileOptions {
    /// Prepended to the hex proof hash to form the proof URI
    pub proof_uri_prefix: String,
    /// Fail instead of warning when the intent does not hash to the task id
    pub verify_task_binding: bool,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            proof_uri_prefix: "proof://".to_string(),
            verify_task_binding: false,
        }
    }
}

/// The events of one escrow, at most one per kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EscrowLog {
    pub created: Option<LogEntry>,
    pub proof: Option<LogEntry>,
    pub released: Option<LogEntry>,
    pub refunded: Option<LogEntry>,
}

impl EscrowLog {
    /// Group a filtered event list by kind
    ///
    /// Fails if an event belongs to another escrow or a kind occurs more
    /// than once.
    pub fn from_entries(escrow_id: EscrowId, entries: &[LogEntry]) -> Result<Self> {
        let mut log = Self::default();
        for entry in entries {
            let owner = entry.event.escrow_id();
            if owner != escrow_id {
                return Err(AuditError::violation(
                    escrow_id,
                    format!("log query returned an event of escrow {}", owner),
                ));
            }

            let kind = entry.event.kind();
            let slot = match kind {
                EventKind::Created => &mut log.created,
                EventKind::ProofSubmitted => &mut log.proof,
                EventKind::Released => &mut log.released,
                EventKind::Refunded => &mut log.refunded,
            };
            if slot.replace(*entry).is_some() {
                let count = entries.iter().filter(|e| e.event.kind() == kind).count();
                return Err(AuditError::violation(
                    escrow_id,
                    format!("{} {} events", count, kind),
                ));
            }
        }
        Ok(log)
    }
}

/// Project an escrow snapshot and its log into an audit record
pub fn reconcile(
    escrow_id: EscrowId,
    snapshot: Option<&EscrowRecord>,
    entries: &[LogEntry],
    negotiation: &Negotiation,
    chain: &ChainInfo,
    options: &ReconcileOptions,
) -> Result<AuditRecord> {
    let escrow = snapshot.ok_or(AuditError::EscrowUnknown { escrow_id })?;
    let log = EscrowLog::from_entries(escrow_id, entries)?;
    let created = log.created.ok_or_else(|| {
        AuditError::violation(escrow_id, "funded escrow has no EscrowCreated event")
    })?;
    check_coherence(escrow, &log)?;
    check_task_binding(escrow, negotiation, options)?;

    // Only report transitions the snapshot reflects
    let (proof_tx, settle_tx) = match escrow.state {
        EscrowState::Pending | EscrowState::Refunded => (None, None),
        EscrowState::Completed { .. } => (log.proof.map(|e| e.tx_hash), None),
        EscrowState::Released { .. } => (
            log.proof.map(|e| e.tx_hash),
            log.released.map(|e| e.tx_hash),
        ),
    };

    let proof_hash = escrow.proof_hash();
    let uri = (!proof_hash.is_zero()).then(|| format!("{}{}", options.proof_uri_prefix, proof_hash));

    Ok(AuditRecord {
        intent: IntentSummary {
            intent_id: negotiation.intent.field("intent_id"),
            ap2_version: negotiation.intent.field("ap2_version"),
            hash: negotiation.intent.content_hash(),
        },
        trigger: TriggerSummary {
            x402_version: negotiation.trigger.field("x402_version"),
            payment_id: negotiation.trigger.field("payment_id"),
            hash: negotiation.trigger.content_hash(),
        },
        escrow: EscrowSummary {
            escrow_id,
            payer: escrow.payer,
            agent: escrow.agent,
            amount: escrow.amount.to_string(),
            status: escrow.status(),
        },
        proof: ProofReference { proof_hash, uri },
        tx: Transactions {
            create_tx: created.tx_hash,
            proof_tx,
            settle_tx,
        },
        chain: chain.clone(),
    })
}

fn check_coherence(escrow: &EscrowRecord, log: &EscrowLog) -> Result<()> {
    let id = escrow.id;
    let violation = |detail: &str| Err(AuditError::violation(id, detail));

    if log.released.is_some() && log.refunded.is_some() {
        return violation("both PaymentReleased and PaymentRefunded events");
    }
    if log.proof.is_some() && log.refunded.is_some() {
        return violation("PaymentRefunded event after ProofSubmitted");
    }

    match escrow.state {
        // Any later event may have been committed after the snapshot
        EscrowState::Pending => {}
        EscrowState::Completed { proof_hash } | EscrowState::Released { proof_hash } => {
            match log.proof {
                None => return violation("completed escrow has no ProofSubmitted event"),
                Some(entry) => check_proof_hash(id, &entry, proof_hash)?,
            }
            if log.refunded.is_some() {
                return violation("PaymentRefunded event on a completed escrow");
            }
            if matches!(escrow.state, EscrowState::Released { .. }) && log.released.is_none() {
                return violation("released escrow has no PaymentReleased event");
            }
        }
        EscrowState::Refunded => {
            if log.refunded.is_none() {
                return violation("refunded escrow has no PaymentRefunded event");
            }
            if log.proof.is_some() || log.released.is_some() {
                return violation("refunded escrow has proof or release events");
            }
        }
    }
    Ok(())
}

fn check_proof_hash(escrow_id: EscrowId, entry: &LogEntry, expected: Hash32) -> Result<()> {
    if let EscrowEvent::ProofSubmitted { proof_hash, .. } = entry.event {
        if proof_hash != expected {
            return Err(AuditError::violation(
                escrow_id,
                format!(
                    "ProofSubmitted event carries {} but the escrow holds {}",
                    proof_hash, expected
                ),
            ));
        }
    }
    Ok(())
}

fn check_task_binding(
    escrow: &EscrowRecord,
    negotiation: &Negotiation,
    options: &ReconcileOptions,
) -> Result<()> {
    let intent_hash = task_id_for(&negotiation.intent);
    if intent_hash == escrow.task_id {
        return Ok(());
    }
    if options.verify_task_binding {
        return Err(AuditError::TaskMismatch {
            escrow_id: escrow.id,
            task_id: escrow.task_id,
            intent_hash,
        });
    }
    tracing::warn!(
        escrow_id = %escrow.id,
        task_id = %escrow.task_id,
        intent_hash = %intent_hash,
        "Intent does not hash to the escrow's task id"
    );
    Ok(())
}
