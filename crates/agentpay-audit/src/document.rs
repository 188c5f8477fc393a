//! Negotiation documents
//!
//! Intent and trigger documents are produced off-chain and never mutated
//! here. The reconciler only needs their content hash and a few declared
//! fields. The hash is Keccak-256 over the canonical serialisation: object
//! keys sorted, no insignificant whitespace, so two producers that emit the
//! same content in a different key order bind to the same task id.

use std::path::Path;

use agentpay_types::{keccak256, Hash32};
use serde_json::Value;

use crate::error::{AuditError, Result};

/// An immutable off-chain negotiation document
#[derive(Debug, Clone, PartialEq)]
pub struct NegotiationDocument {
    value: Value,
    hash: Hash32,
}

impl NegotiationDocument {
    /// Wrap a JSON object
    pub fn new(value: Value) -> Result<Self> {
        if !value.is_object() {
            return Err(AuditError::InvalidDocument {
                reason: "negotiation document must be a JSON object".to_string(),
            });
        }
        let hash = keccak256(canonical_json(&value).as_bytes());
        Ok(Self { value, hash })
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Self::new(serde_json::from_str(json)?)
    }

    /// Read a document from disk
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = tokio::fs::read_to_string(path.as_ref()).await?;
        Self::from_json_str(&json)
    }

    /// Keccak-256 of the canonical serialisation
    pub fn content_hash(&self) -> Hash32 {
        self.hash
    }

    pub fn canonical_json(&self) -> String {
        canonical_json(&self.value)
    }

    /// A top-level field, unchanged; `Null` if absent
    pub fn field(&self, name: &str) -> Value {
        self.value.get(name).cloned().unwrap_or(Value::Null)
    }

    pub fn value(&self) -> &Value {
        &self.value
    }
}

/// The intent and payment-trigger documents behind one escrow
#[derive(Debug, Clone, PartialEq)]
pub struct Negotiation {
    pub intent: NegotiationDocument,
    pub trigger: NegotiationDocument,
}

/// Task id an escrow for this intent should be created with
pub fn task_id_for(intent: &NegotiationDocument) -> Hash32 {
    intent.content_hash()
}

/// Serialise with sorted object keys and no whitespace
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}
