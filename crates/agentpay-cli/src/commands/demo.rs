//! Demo command - one escrow lifecycle, end to end
//!
//! Runs against an in-memory ledger: funds a payer, creates an escrow bound
//! to the intent's content hash, then either settles it (agent proves,
//! payer releases) or refunds it. The escrow is then reconciled and the
//! audit record written through the store.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use agentpay_audit::{task_id_for, AuditReconciler, AuditStore, Negotiation, NegotiationDocument};
use agentpay_client::{EscrowClient, InMemoryLedger};
use agentpay_types::{keccak256, Address};
use anyhow::Context;
use clap::ValueEnum;
use serde_json::json;

use crate::config::AppConfig;
use crate::display;

/// Which way the escrow ends
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Scenario {
    /// Agent submits proof, payer releases
    Settle,
    /// Payer takes the funds back before any proof
    Refund,
}

/// Options of one demo run
#[derive(Debug, Clone, Default)]
pub struct DemoOptions {
    pub intent: Option<PathBuf>,
    pub trigger: Option<PathBuf>,
    /// Overrides `audit.output_dir`
    pub output_dir: Option<PathBuf>,
}

pub async fn run(config: &AppConfig, scenario: Scenario, options: DemoOptions) -> anyhow::Result<PathBuf> {
    let negotiation = load_negotiation(&options).await?;
    let amount = config.demo.escrow_amount()?;
    tracing::info!(
        scenario = ?scenario,
        amount = %amount,
        intent_hash = %negotiation.intent.content_hash(),
        "Starting escrow demo"
    );

    display::section("Setup");
    let ledger = Arc::new(InMemoryLedger::new(config.chain.info()));
    let payer_address = Address::from_label("agentpay-demo-payer");
    let agent_address = Address::from_label("agentpay-demo-agent");
    ledger
        .fund(payer_address, config.demo.payer_funding()?)
        .context("failed to fund the demo payer")?;

    let payer = EscrowClient::new(ledger.clone(), payer_address);
    let agent = payer.with_identity(agent_address);
    display::info(&format!(
        "Ledger {} ({})",
        config.chain.name, config.chain.chain_id
    ));
    display::kv("payer", &payer_address.to_string());
    display::kv("agent", &agent_address.to_string());
    display::kv("balance", &ledger.balance_of(&payer_address).to_string());

    display::section("Escrow");
    let task_id = task_id_for(&negotiation.intent);
    let created = payer.create(agent_address, task_id, amount).await?;
    display::success(&format!(
        "Created escrow {} locking {}",
        created.escrow_id, amount
    ));
    display::kv("task id", &task_id.to_string());
    display::kv("tx", &created.tx_hash.to_string());

    match scenario {
        Scenario::Settle => {
            let proof_hash = keccak256(
                format!("{}:{}", task_id, negotiation.trigger.field("payment_id")).as_bytes(),
            );
            let proof_tx = agent.submit_proof(created.escrow_id, proof_hash).await?;
            display::success("Agent submitted proof");
            display::kv("proof hash", &proof_hash.to_string());
            display::kv("tx", &proof_tx.to_string());

            let settle_tx = payer.settle(created.escrow_id).await?;
            display::success(&format!("Payer released {} to the agent", amount));
            display::kv("tx", &settle_tx.to_string());
        }
        Scenario::Refund => {
            let refund_tx = payer.refund(created.escrow_id).await?;
            display::success(&format!("Payer refunded {}", amount));
            display::kv("tx", &refund_tx.to_string());
        }
    }
    display::kv("agent balance", &ledger.balance_of(&agent_address).to_string());
    display::kv("payer balance", &ledger.balance_of(&payer_address).to_string());

    let reconciler = AuditReconciler::new(
        payer.with_identity(Address::from_label("agentpay-demo-auditor")),
        config.audit.reconcile_options(),
    );
    let record = reconciler.reconcile(created.escrow_id, &negotiation).await?;
    tracing::info!(
        escrow_id = %created.escrow_id,
        status = record.escrow.status.as_str(),
        "Escrow reconciled"
    );
    display::audit_summary(&record);

    let output_dir = options
        .output_dir
        .clone()
        .unwrap_or_else(|| config.audit.output_dir.clone());
    let path = AuditStore::new(output_dir)
        .write(&record)
        .await
        .context("failed to write the audit record")?;
    println!();
    display::success(&format!("Audit record written to {}", path.display()));

    Ok(path)
}

async fn load_negotiation(options: &DemoOptions) -> anyhow::Result<Negotiation> {
    let intent = match &options.intent {
        Some(path) => load_document(path).await?,
        None => NegotiationDocument::new(sample_intent())?,
    };
    let trigger = match &options.trigger {
        Some(path) => load_document(path).await?,
        None => NegotiationDocument::new(sample_trigger())?,
    };
    Ok(Negotiation { intent, trigger })
}

pub async fn load_document(path: &Path) -> anyhow::Result<NegotiationDocument> {
    NegotiationDocument::load(path)
        .await
        .with_context(|| format!("failed to load negotiation document {}", path.display()))
}

fn sample_intent() -> serde_json::Value {
    json!({
        "ap2_version": "0.1",
        "intent_id": "intent-demo-0001",
        "buyer": "agentpay-demo-payer",
        "task": {
            "kind": "compute",
            "description": "Render 120 frames of the demo scene",
            "max_price": "0.05"
        }
    })
}

fn sample_trigger() -> serde_json::Value {
    json!({
        "x402_version": 1,
        "payment_id": "pay-demo-0001",
        "scheme": "escrow",
        "amount": "0.05",
        "resource": "/jobs/render"
    })
}
