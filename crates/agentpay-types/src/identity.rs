//! Identity types for AgentPay
//!
//! Addresses and hashes are fixed-width byte arrays rendered as `0x`-prefixed
//! lowercase hex, so they can never be confused with one another or with
//! free-form strings.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha3::{Digest, Keccak256};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error parsing a hex-encoded identity
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HexParseError {
    #[error("Invalid {type_name} hex: {reason}")]
    InvalidHex {
        type_name: &'static str,
        reason: String,
    },

    #[error("Invalid {type_name} length: expected {expected} bytes, got {actual}")]
    InvalidLength {
        type_name: &'static str,
        expected: usize,
        actual: usize,
    },
}

/// Macro to generate fixed-width hex types with common implementations
macro_rules! define_hex_type {
    ($name:ident, $len:literal, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        pub struct $name(pub [u8; $len]);

        impl $name {
            /// The all-zero value
            pub const ZERO: Self = Self([0u8; $len]);

            /// Width in bytes
            pub const LEN: usize = $len;

            /// Create from raw bytes
            pub fn from_bytes(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }

            /// Create from a slice of exactly the right width
            pub fn from_slice(bytes: &[u8]) -> Option<Self> {
                <[u8; $len]>::try_from(bytes).ok().map(Self)
            }

            /// Get the raw bytes
            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            /// Check if every byte is zero
            pub fn is_zero(&self) -> bool {
                self.0.iter().all(|b| *b == 0)
            }

            /// Parse from hex (with or without `0x` prefix)
            pub fn parse(s: &str) -> Result<Self, HexParseError> {
                let digits = s
                    .strip_prefix("0x")
                    .or_else(|| s.strip_prefix("0X"))
                    .unwrap_or(s);
                let bytes = hex::decode(digits).map_err(|e| HexParseError::InvalidHex {
                    type_name: stringify!($name),
                    reason: e.to_string(),
                })?;
                Self::from_slice(&bytes).ok_or(HexParseError::InvalidLength {
                    type_name: stringify!($name),
                    expected: $len,
                    actual: bytes.len(),
                })
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "0x{}", hex::encode(self.0))
            }
        }

        impl FromStr for $name {
            type Err = HexParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                Self::parse(&s).map_err(serde::de::Error::custom)
            }
        }
    };
}

define_hex_type!(Address, 20, "A ledger identity (payer, agent, or contract account)");
define_hex_type!(Hash32, 32, "An opaque 32-byte handle (task id, proof hash, content hash)");
define_hex_type!(TxHash, 32, "Identifier of a committed ledger transaction");

impl Address {
    /// Derive a deterministic address from a label
    ///
    /// Takes the last 20 bytes of the label's Keccak-256 digest. Used for
    /// well-known accounts and for demo identities.
    pub fn from_label(label: &str) -> Self {
        let digest = keccak256(label.as_bytes());
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&digest.0[12..]);
        Self(bytes)
    }
}

/// Keccak-256 digest of arbitrary bytes
pub fn keccak256(data: &[u8]) -> Hash32 {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    Hash32(hasher.finalize().into())
}

/// Identifier of an escrow, assigned monotonically by the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EscrowId(pub u64);

impl EscrowId {
    /// Get the numeric value
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for EscrowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for EscrowId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}
