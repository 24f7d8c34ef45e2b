//! # Tithe Vesting - Linear Time-Vesting Engine
//!
//! Locks a principal against a matching reward pool and releases the reward
//! continuously over a fixed duration, with forfeiture of unclaimed reward
//! on early exit.
//!
//! ## Position Lifecycle
//!
//! ```text
//! Unregistered ──register──▶ Active ──withdraw──▶ Closed
//!                              │ ▲
//!                              └─┘ claim (releases newly vested reward)
//! ```
//!
//! The administrator funds the engine's ledger account with `2 × principal`
//! per position (principal reserve plus the matched reward), registers each
//! beneficiary, then starts the global vesting clock. Beneficiaries claim
//! vested reward as time advances, or withdraw the principal early and
//! forfeit whatever reward remains unclaimed.
//!
//! Time is an external monotonically non-decreasing tick (e.g. block
//! height) supplied by the caller's execution environment.

pub mod engine;
pub mod error;

// Re-exports
pub use engine::{Position, VestingEngine, VestingEvent};
pub use error::{Result, VestingError};
