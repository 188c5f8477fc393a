//! Reconciliation against a live in-memory ledger

use std::sync::Arc;

use agentpay_audit::{
    task_id_for, AuditError, AuditReconciler, AuditStore, Negotiation, NegotiationDocument,
    ReconcileOptions,
};
use agentpay_client::{EscrowClient, InMemoryLedger};
use agentpay_types::{keccak256, Address, Amount, EscrowId, EscrowStatus, Hash32};
use serde_json::json;

struct World {
    ledger: Arc<InMemoryLedger>,
    payer: EscrowClient,
    agent: EscrowClient,
    reconciler: AuditReconciler,
    negotiation: Negotiation,
}

fn world() -> World {
    let ledger = Arc::new(InMemoryLedger::default());
    let payer_address = Address::from_label("buyer");
    ledger
        .fund(payer_address, Amount::parse_decimal("1").unwrap())
        .unwrap();

    let payer = EscrowClient::new(ledger.clone(), payer_address);
    let agent = payer.with_identity(Address::from_label("compute-agent"));
    let reconciler = AuditReconciler::new(
        payer.with_identity(Address::from_label("auditor")),
        ReconcileOptions::default(),
    );

    let negotiation = Negotiation {
        intent: NegotiationDocument::new(json!({
            "intent_id": "intent-42",
            "ap2_version": "0.1",
            "task": { "kind": "render", "frames": 120 }
        }))
        .unwrap(),
        trigger: NegotiationDocument::new(json!({
            "x402_version": 1,
            "payment_id": "pay-42",
            "amount": "0.05"
        }))
        .unwrap(),
    };

    World {
        ledger,
        payer,
        agent,
        reconciler,
        negotiation,
    }
}

async fn create(world: &World) -> EscrowId {
    world
        .payer
        .create(
            world.agent.identity(),
            task_id_for(&world.negotiation.intent),
            Amount::parse_decimal("0.05").unwrap(),
        )
        .await
        .unwrap()
        .escrow_id
}

#[tokio::test]
async fn settled_escrow_reconciles() {
    let w = world();
    let proof = keccak256(b"rendered frames");

    let id = create(&w).await;
    assert_eq!(id, EscrowId(0));
    let proof_tx = w.agent.submit_proof(id, proof).await.unwrap();
    let settle_tx = w.payer.settle(id).await.unwrap();

    let record = w.reconciler.reconcile(id, &w.negotiation).await.unwrap();
    assert_eq!(record.escrow.status, EscrowStatus::Settled);
    assert_eq!(record.escrow.amount, "0.05");
    assert_eq!(record.escrow.payer, w.payer.identity());
    assert_eq!(record.proof.proof_hash, proof);
    assert_eq!(record.tx.proof_tx, Some(proof_tx));
    assert_eq!(record.tx.settle_tx, Some(settle_tx));
    assert_eq!(record.intent.hash, task_id_for(&w.negotiation.intent));
    assert_eq!(record.intent.intent_id, json!("intent-42"));
    assert_eq!(record.trigger.payment_id, json!("pay-42"));
    assert_eq!(record.chain.chain_id, 31337);
    assert_eq!(
        w.ledger.balance_of(&w.agent.identity()),
        Amount::parse_decimal("0.05").unwrap()
    );
}

#[tokio::test]
async fn refunded_escrow_reconciles() {
    let w = world();
    let id = create(&w).await;
    w.payer.refund(id).await.unwrap();

    let record = w.reconciler.reconcile(id, &w.negotiation).await.unwrap();
    assert_eq!(record.escrow.status, EscrowStatus::Refunded);
    assert_eq!(record.tx.settle_tx, None);
    assert_eq!(record.tx.proof_tx, None);
    assert_eq!(record.proof.proof_hash, Hash32::ZERO);
    assert_eq!(record.proof.uri, None);
}

#[tokio::test]
async fn reconciliation_is_idempotent() {
    let w = world();
    let id = create(&w).await;
    w.agent.submit_proof(id, keccak256(b"proof")).await.unwrap();
    let height = w.ledger.height();

    let first = w.reconciler.reconcile(id, &w.negotiation).await.unwrap();
    let second = w.reconciler.reconcile(id, &w.negotiation).await.unwrap();

    assert_eq!(first.escrow.status, EscrowStatus::Completed);
    assert_eq!(
        serde_json::to_vec(&first).unwrap(),
        serde_json::to_vec(&second).unwrap()
    );
    // reconciling never commits anything
    assert_eq!(w.ledger.height(), height);
}

#[tokio::test]
async fn unknown_escrow_is_an_error() {
    let w = world();
    let err = w
        .reconciler
        .reconcile(EscrowId(3), &w.negotiation)
        .await
        .unwrap_err();
    assert!(matches!(err, AuditError::EscrowUnknown { escrow_id } if escrow_id == EscrowId(3)));
}

#[tokio::test]
async fn unavailable_ledger_fails_fast() {
    let w = world();
    let id = create(&w).await;
    w.ledger.set_available(false);

    let err = w.reconciler.reconcile(id, &w.negotiation).await.unwrap_err();
    assert!(matches!(err, AuditError::LedgerUnavailable { .. }));
    assert!(err.is_retriable());
}

#[tokio::test]
async fn strict_binding_rejects_foreign_intent() {
    let w = world();
    let id = create(&w).await;

    let strict = AuditReconciler::new(
        w.payer.clone(),
        ReconcileOptions {
            verify_task_binding: true,
            ..ReconcileOptions::default()
        },
    );
    assert!(strict.reconcile(id, &w.negotiation).await.is_ok());

    let other = Negotiation {
        intent: NegotiationDocument::new(json!({ "intent_id": "someone-else" })).unwrap(),
        trigger: w.negotiation.trigger.clone(),
    };
    let err = strict.reconcile(id, &other).await.unwrap_err();
    assert_eq!(err.error_code(), "TASK_MISMATCH");

    // null for fields the intent does not declare
    let lenient = w.reconciler.reconcile(id, &other).await.unwrap();
    assert!(lenient.intent.ap2_version.is_null());
}

#[tokio::test]
async fn store_never_overwrites() {
    let w = world();
    let id = create(&w).await;
    let dir = tempfile::tempdir().unwrap();
    let store = AuditStore::new(dir.path().join("audit"));

    let record = w.reconciler.reconcile(id, &w.negotiation).await.unwrap();
    let first = store.write(&record).await.unwrap();

    w.payer.refund(id).await.unwrap();
    let rerun = w.reconciler.reconcile(id, &w.negotiation).await.unwrap();
    let second = store.write(&rerun).await.unwrap();

    assert_ne!(first, second);
    assert!(first.ends_with("escrow-0-0.json"));
    assert!(second.ends_with("escrow-0-1.json"));
    assert_eq!(AuditStore::load(&first).await.unwrap(), record);
    assert_eq!(
        AuditStore::load(&second).await.unwrap().escrow.status,
        EscrowStatus::Refunded
    );
}

#[tokio::test]
async fn stored_record_uses_the_published_schema() {
    let w = world();
    let id = create(&w).await;
    let dir = tempfile::tempdir().unwrap();

    let record = w.reconciler.reconcile(id, &w.negotiation).await.unwrap();
    let path = AuditStore::new(dir.path()).write(&record).await.unwrap();
    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();

    let keys = |v: &serde_json::Value| {
        let mut keys: Vec<String> = v.as_object().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    };
    assert_eq!(keys(&json), ["chain", "escrow", "intent", "proof", "trigger", "tx"]);
    assert_eq!(keys(&json["intent"]), ["ap2_version", "hash", "intent_id"]);
    assert_eq!(keys(&json["trigger"]), ["hash", "payment_id", "x402_version"]);
    assert_eq!(
        keys(&json["escrow"]),
        ["agent", "amount", "escrow_id", "payer", "status"]
    );
    assert_eq!(keys(&json["proof"]), ["proof_hash", "uri"]);
    assert_eq!(keys(&json["tx"]), ["create_tx", "proof_tx", "settle_tx"]);
    assert_eq!(keys(&json["chain"]), ["chain_id", "name"]);

    assert_eq!(json["escrow"]["status"], "pending");
    assert_eq!(json["escrow"]["escrow_id"], 0);
    assert!(json["tx"]["proof_tx"].is_null());
    assert!(json["tx"]["create_tx"].as_str().unwrap().starts_with("0x"));
}
