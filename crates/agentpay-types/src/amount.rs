//! Amount type in ledger base units
//!
//! Values are held as `u128` base units with 18 implied decimals (the
//! "wei" convention). Escrow amounts are never negative, so there is no sign.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Number of implied decimals
pub const DECIMALS: u32 = 18;

/// Base units per whole unit
pub const UNIT: u128 = 1_000_000_000_000_000_000;

/// Error parsing a decimal amount
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountParseError {
    #[error("Empty amount")]
    Empty,

    #[error("Invalid digit in amount: {input}")]
    InvalidDigit { input: String },

    #[error("Amount {input} has more than 18 decimal places")]
    TooManyDecimals { input: String },

    #[error("Amount {input} overflows")]
    Overflow { input: String },
}

/// A quantity of value in base units
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount(pub u128);

impl Amount {
    /// Create from base units
    pub fn from_base_units(value: u128) -> Self {
        Self(value)
    }

    /// Create a zero amount
    pub fn zero() -> Self {
        Self(0)
    }

    /// Get the raw base units
    pub fn base_units(&self) -> u128 {
        self.0
    }

    /// Check if the amount is zero
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checked addition
    pub fn checked_add(&self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    /// Checked subtraction
    pub fn checked_sub(&self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Amount)
    }

    /// Parse a decimal string in whole units (e.g. `"0.05"`)
    pub fn parse_decimal(input: &str) -> Result<Self, AmountParseError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(AmountParseError::Empty);
        }

        let (whole, frac) = match trimmed.split_once('.') {
            Some((w, f)) => (w, f),
            None => (trimmed, ""),
        };
        if whole.is_empty() && frac.is_empty() {
            return Err(AmountParseError::InvalidDigit {
                input: input.to_string(),
            });
        }
        if !whole.chars().chain(frac.chars()).all(|c| c.is_ascii_digit()) {
            return Err(AmountParseError::InvalidDigit {
                input: input.to_string(),
            });
        }
        if frac.len() > DECIMALS as usize {
            return Err(AmountParseError::TooManyDecimals {
                input: input.to_string(),
            });
        }

        let overflow = || AmountParseError::Overflow {
            input: input.to_string(),
        };

        let whole_units: u128 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| overflow())?
        };
        let frac_units: u128 = if frac.is_empty() {
            0
        } else {
            let scale = 10u128.pow(DECIMALS - frac.len() as u32);
            frac.parse::<u128>().map_err(|_| overflow())? * scale
        };

        whole_units
            .checked_mul(UNIT)
            .and_then(|w| w.checked_add(frac_units))
            .map(Amount)
            .ok_or_else(overflow)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / UNIT;
        let frac = self.0 % UNIT;
        if frac == 0 {
            return write!(f, "{}", whole);
        }
        let digits = format!("{:018}", frac);
        write!(f, "{}.{}", whole, digits.trim_end_matches('0'))
    }
}

impl FromStr for Amount {
    type Err = AmountParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_decimal(s)
    }
}
