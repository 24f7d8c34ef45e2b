//! Error types for vesting operations

use thiserror::Error;
use tithe_ledger::LedgerError;

/// Result type alias for vesting operations
pub type Result<T> = std::result::Result<T, VestingError>;

/// Errors that can occur in vesting operations
///
/// The two zero-delta claim outcomes are deliberately distinct:
/// [`VestingError::AlreadyClaimed`] means no time has elapsed since the
/// last successful claim, while [`VestingError::ZeroAmount`] means there is
/// simply nothing to pay (no position, zero principal, zero start
/// reference). Callers assert on this distinction.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VestingError {
    /// Caller is not the administrator
    #[error("Only the administrator may call this function")]
    NotAdmin,

    /// The zero address was supplied where a real address is required
    #[error("Zero address is not a valid beneficiary")]
    ZeroAddress,

    /// Zero amount where a nonzero value is required, or nothing to pay
    #[error("Zero amount")]
    ZeroAmount,

    /// The vesting clock has not started, or the current tick precedes it
    #[error("Vesting has not started yet")]
    NotStarted,

    /// The beneficiary has no active position
    #[error("No active position for beneficiary")]
    NoPosition,

    /// Nothing newly vested since the last successful claim this tick
    #[error("Already claimed this period")]
    AlreadyClaimed,

    /// The beneficiary already holds a position (live or closed)
    #[error("Beneficiary already registered")]
    AlreadyRegistered,

    /// The vesting clock has already been started
    #[error("Vesting clock already started")]
    AlreadyStarted,

    /// Registration would commit more than the engine's custody covers
    #[error("Insufficient custody: required {required}, available {available}")]
    InsufficientCustody { required: u128, available: u128 },

    /// An underlying ledger transfer failed
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger_error_wrapping() {
        let err: VestingError = LedgerError::ZeroAddress.into();
        assert_eq!(err, VestingError::Ledger(LedgerError::ZeroAddress));
    }

    #[test]
    fn test_zero_delta_errors_are_distinct() {
        assert_ne!(VestingError::AlreadyClaimed, VestingError::ZeroAmount);
    }
}
