//! Write-once audit storage
//!
//! Each reconciliation is written to a new file
//! `<dir>/escrow-<id>-<n>.json`. The record is staged in a temporary file
//! in the same directory and then linked into place without clobbering, so
//! a record file only ever appears complete and an existing one is never
//! overwritten; a re-run takes the next free `n`.

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use agentpay_types::EscrowId;

use crate::error::Result;
use crate::record::AuditRecord;

#[derive(Debug, Clone)]
pub struct AuditStore {
    dir: PathBuf,
}

impl AuditStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Persist a record and return its path
    pub async fn write(&self, record: &AuditRecord) -> Result<PathBuf> {
        let mut json = record.to_json_pretty()?;
        json.push('\n');

        let dir = self.dir.clone();
        let escrow_id = record.escrow_id();
        let path = tokio::task::spawn_blocking(move || publish(&dir, escrow_id, json.as_bytes()))
            .await
            .map_err(|err| std::io::Error::new(ErrorKind::Other, err))??;

        tracing::info!(
            escrow_id = %escrow_id,
            path = %path.display(),
            "Audit record written"
        );
        Ok(path)
    }

    /// Read a stored record back
    pub async fn load(path: impl AsRef<Path>) -> Result<AuditRecord> {
        let json = tokio::fs::read_to_string(path.as_ref()).await?;
        Ok(serde_json::from_str(&json)?)
    }
}

/// Stage `contents` and link it to the first free record name
///
/// The staging file is removed when it is dropped, so a failure at any step
/// leaves no record and no leftover behind.
fn publish(dir: &Path, escrow_id: EscrowId, contents: &[u8]) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;

    let mut staged = tempfile::Builder::new()
        .prefix(".escrow-")
        .suffix(".staging")
        .tempfile_in(dir)?;
    staged.write_all(contents)?;
    staged.as_file().sync_all()?;

    let mut n = 0u32;
    loop {
        let path = dir.join(format!("escrow-{}-{}.json", escrow_id, n));
        match staged.persist_noclobber(&path) {
            Ok(_) => return Ok(path),
            Err(err) if err.error.kind() == ErrorKind::AlreadyExists => {
                staged = err.file;
                n += 1;
            }
            Err(err) => return Err(err.error),
        }
    }
}
