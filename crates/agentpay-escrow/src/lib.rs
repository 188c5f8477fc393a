//! AgentPay Escrow - Guarded state machine and escrow store
//!
//! The state machine ([`machine`]) is a set of pure functions from the
//! current record, the caller, and a requested transition to either the next
//! state (plus the value movement and event it implies) or a rejection.
//!
//! The store ([`store`]) applies those functions atomically. Each escrow has
//! its own lock; calls against different escrows never contend. A caller's
//! side effects (moving funds, appending the event) run inside the escrow's
//! critical section and abort the whole transition on failure.
//!
//! # Invariants
//!
//! 1. An escrow exists only once funded; ids are never reused
//! 2. Proof is submitted at most once and is never the zero hash
//! 3. At most one of release/refund ever succeeds, and either is terminal
//! 4. Release requires proof; refund is foreclosed by proof

pub mod machine;
pub mod store;

pub use machine::*;
pub use store::*;
