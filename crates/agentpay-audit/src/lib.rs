//! AgentPay Audit - Replayable escrow records
//!
//! An audit record is derived, never authoritative. It is recomputed on
//! demand from three sources:
//!
//! - the escrow's current state, read once
//! - the escrow's events in the ledger log (at most one per kind)
//! - the off-chain intent and trigger documents
//!
//! [`reconcile`](reconcile::reconcile) is the pure projection;
//! [`AuditReconciler`] feeds it from a ledger and [`AuditStore`] persists
//! the result, one new file per run.

pub mod document;
pub mod error;
pub mod reconcile;
pub mod reconciler;
pub mod record;
pub mod store;

pub use document::{canonical_json, task_id_for, Negotiation, NegotiationDocument};
pub use error::{AuditError, Result};
pub use reconcile::{reconcile, EscrowLog, ReconcileOptions};
pub use reconciler::AuditReconciler;
pub use record::*;
pub use store::AuditStore;
