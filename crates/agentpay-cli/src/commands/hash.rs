//! Hash command - the task id a negotiation document binds to

use std::path::Path;

use agentpay_audit::task_id_for;
use agentpay_types::Hash32;
use colored::*;

use super::demo::load_document;

pub async fn run(path: &Path, canonical: bool) -> anyhow::Result<Hash32> {
    let document = load_document(path).await?;
    let task_id = task_id_for(&document);

    if canonical {
        println!("{}", document.canonical_json());
    }
    println!("{}", task_id.to_string().bright_cyan());
    Ok(task_id)
}
