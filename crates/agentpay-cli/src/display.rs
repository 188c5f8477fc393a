//! Display utilities for the CLI

use agentpay_audit::AuditRecord;
use agentpay_types::EscrowStatus;
use colored::*;

/// Print a section header
pub fn section(title: &str) {
    println!();
    println!("{}", "━".repeat(60).bright_black());
    println!(" {}", title.bright_white().bold());
    println!("{}", "━".repeat(60).bright_black());
}

pub fn success(message: &str) {
    println!("  {} {}", "✓".bright_green(), message);
}

pub fn info(message: &str) {
    println!("  {} {}", "→".bright_blue(), message);
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("      {}: {}", key, value.bright_cyan());
}

fn status_label(status: EscrowStatus) -> ColoredString {
    match status {
        EscrowStatus::Pending => status.as_str().yellow(),
        EscrowStatus::Completed => status.as_str().bright_blue(),
        EscrowStatus::Settled => status.as_str().bright_green(),
        EscrowStatus::Refunded => status.as_str().bright_magenta(),
    }
}

fn or_none<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

/// Print the human-readable summary of an audit record
pub fn audit_summary(record: &AuditRecord) {
    section("Audit Record");
    println!(
        "  Escrow {} on {} ({}): {}",
        record.escrow.escrow_id.to_string().bright_white().bold(),
        record.chain.name,
        record.chain.chain_id,
        status_label(record.escrow.status)
    );
    kv("payer", &record.escrow.payer.to_string());
    kv("agent", &record.escrow.agent.to_string());
    kv("amount", &record.escrow.amount);
    kv("intent hash", &record.intent.hash.to_string());
    kv("trigger hash", &record.trigger.hash.to_string());
    kv("proof", &or_none(record.proof.uri.as_ref()));
    kv("create tx", &record.tx.create_tx.to_string());
    kv("proof tx", &or_none(record.tx.proof_tx));
    kv("settle tx", &or_none(record.tx.settle_tx));
}
