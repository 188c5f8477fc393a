//! AgentPay Types - Canonical domain types for task escrows
//!
//! This crate contains the foundational types shared by every AgentPay crate,
//! with zero dependencies on other agentpay crates:
//!
//! - Identity types (`Address`, `Hash32`, `TxHash`, `EscrowId`)
//! - Base-unit amounts with 18-decimal display
//! - The escrow state machine's tagged union and its ledger-native flag view
//! - Ledger events and event filters
//! - The error taxonomy
//!
//! # Escrow Lifecycle
//!
//! ```text
//! (absent) → Pending → Completed → Released
//!               └────→ Refunded
//! ```
//!
//! `Released` and `Refunded` are terminal. A completed escrow can never be
//! refunded.

pub mod identity;
pub mod amount;
pub mod escrow;
pub mod event;
pub mod chain;
pub mod error;

pub use identity::*;
pub use amount::*;
pub use escrow::*;
pub use event::*;
pub use chain::*;
pub use error::*;

/// Version of the AgentPay types schema
pub const TYPES_VERSION: &str = "0.1.0";
