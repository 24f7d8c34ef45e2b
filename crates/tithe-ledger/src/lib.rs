//! # Tithe Ledger - Taxed Fungible-Value Accounting
//!
//! Single-asset ledger with a configurable, treasury-gated transfer tax.
//!
//! ## Key Features
//!
//! - **Fixed supply**: the full supply is minted once at construction and
//!   only ever decreases through explicit burns
//! - **Basis-point tax**: transfers touching a classified taxable address
//!   pay a fee (capped at 5%) routed to the treasury
//! - **Untaxable override**: exempted addresses pay no fee regardless of
//!   counterparty classification
//! - **Transactional semantics**: every operation either commits in full or
//!   fails leaving state untouched
//!
//! ## Tax Determination
//!
//! | Sender | Recipient | Fee |
//! |--------|-----------|-----|
//! | untaxable | any | 0 |
//! | any | untaxable | 0 |
//! | any | taxable | `amount * tax_in / 10000` |
//! | taxable | any | `amount * tax_out / 10000` |
//! | other | other | 0 |
//!
//! Recipient-side classification is evaluated first, so when both parties
//! are taxable the `tax_in` rate applies.

pub mod error;
pub mod ledger;
pub mod types;

// Re-exports
pub use error::{LedgerError, Result};
pub use ledger::{Ledger, LedgerEvent};
pub use types::{Address, Amount};

/// Token constants
pub mod constants {
    use super::types::Amount;

    /// Token symbol
    pub const SYMBOL: &str = "TTH";

    /// Token name
    pub const NAME: &str = "Tithe";

    /// Decimal places (same as ETH)
    pub const DECIMALS: u8 = 18;

    /// One token in smallest units
    pub const ONE_TOKEN: Amount = 1_000_000_000_000_000_000; // 10^18

    /// Fixed total supply: 10 million tokens
    pub const TOTAL_SUPPLY: Amount = 10_000_000 * ONE_TOKEN;

    /// Basis-point denominator: rates are expressed in 1/10000 units
    pub const BPS_DENOMINATOR: Amount = 10_000;

    /// Maximum tax rate: 500 bps = 5%
    pub const MAX_TAX_BPS: u16 = 500;

    /// Tax rate applied at construction, both directions
    pub const DEFAULT_TAX_BPS: u16 = 500;
}

pub use constants::*;
