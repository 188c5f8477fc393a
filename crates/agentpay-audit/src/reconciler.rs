//! Ledger-backed reconciler

use agentpay_client::EscrowClient;
use agentpay_types::{EscrowId, EventFilter, EventKind};

use crate::document::Negotiation;
use crate::error::Result;
use crate::reconcile::{reconcile, ReconcileOptions};
use crate::record::AuditRecord;

/// Rebuilds audit records from a live ledger
///
/// Reads the escrow once, then queries the log for each event kind filtered
/// to that escrow. Never submits a transaction. Ledger failures are returned
/// as-is; there is no retry.
#[derive(Debug, Clone)]
pub struct AuditReconciler {
    client: EscrowClient,
    options: ReconcileOptions,
}

impl AuditReconciler {
    pub fn new(client: EscrowClient, options: ReconcileOptions) -> Self {
        Self { client, options }
    }

    /// Reconstruct the audit record of one escrow
    pub async fn reconcile(&self, escrow_id: EscrowId, negotiation: &Negotiation) -> Result<AuditRecord> {
        let snapshot = self.client.try_read(escrow_id).await?;

        let created = EventFilter::for_escrow(EventKind::Created, escrow_id);
        let proofs = EventFilter::for_escrow(EventKind::ProofSubmitted, escrow_id);
        let releases = EventFilter::for_escrow(EventKind::Released, escrow_id);
        let refunds = EventFilter::for_escrow(EventKind::Refunded, escrow_id);

        let (created, proofs, releases, refunds) = tokio::try_join!(
            self.client.events(&created),
            self.client.events(&proofs),
            self.client.events(&releases),
            self.client.events(&refunds),
        )?;

        let entries: Vec<_> = created
            .into_iter()
            .chain(proofs)
            .chain(releases)
            .chain(refunds)
            .collect();

        let record = reconcile(
            escrow_id,
            snapshot.as_ref(),
            &entries,
            negotiation,
            self.client.chain(),
            &self.options,
        )?;

        tracing::info!(
            escrow_id = %escrow_id,
            status = %record.escrow.status,
            create_tx = %record.tx.create_tx,
            "Escrow reconciled"
        );
        Ok(record)
    }
}
