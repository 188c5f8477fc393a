//! Chain identity

use serde::{Deserialize, Serialize};

/// Name and numeric id of the ledger an escrow lives on
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChainInfo {
    pub name: String,
    pub chain_id: u64,
}

impl ChainInfo {
    pub fn new(name: impl Into<String>, chain_id: u64) -> Self {
        Self {
            name: name.into(),
            chain_id,
        }
    }

    /// A local development ledger
    pub fn local() -> Self {
        Self::new("local", 31337)
    }
}

impl Default for ChainInfo {
    fn default() -> Self {
        Self::local()
    }
}
