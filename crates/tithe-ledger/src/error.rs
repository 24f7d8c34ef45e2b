//! Error types for ledger operations

use thiserror::Error;

/// Result type alias for ledger operations
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Errors that can occur in ledger operations
///
/// Every failure is synchronous and leaves ledger state unchanged.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Caller is not the treasury (configuration mutators)
    #[error("Only the treasury may call this function")]
    NotTreasury,

    /// The zero address was supplied where a real address is required
    #[error("Zero address is not a valid account")]
    ZeroAddress,

    /// Proposed tax rate exceeds the cap
    #[error("Tax rate {proposed} bps exceeds maximum of {max} bps")]
    TaxTooHigh { proposed: u16, max: u16 },

    /// Transfer or burn beyond available balance
    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: u128, available: u128 },
}
