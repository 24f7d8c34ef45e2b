//! # Ledger State Machine
//!
//! Account balances, total supply, and the tax/classification configuration.
//! Every value transfer in the system passes through [`Ledger::transfer`].
//!
//! All mutating operations validate their preconditions before touching any
//! state, so a failed call leaves the ledger exactly as it was.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::constants::*;
use crate::error::{LedgerError, Result};
use crate::types::{Address, Amount};

/// Observable ledger events, accumulated per instance and drained by the
/// integration layer
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEvent {
    /// Value moved between accounts; `amount` is the credited amount
    /// (transfer amount minus any fee)
    Transfer {
        from: Address,
        to: Address,
        amount: Amount,
    },

    /// Supply reduced by an explicit burn
    Burn { from: Address, amount: Amount },

    /// Tax rates changed by the treasury
    TaxesChanged { tax_in: u16, tax_out: u16 },
}

/// Taxed fungible-value ledger
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Ledger {
    /// Account balances; absent entries hold zero
    balances: HashMap<Address, Amount>,

    /// Current total supply (decreases on burn, never increases)
    total_supply: Amount,

    /// Tax applied when the recipient is taxable, in basis points
    tax_in: u16,

    /// Tax applied when the sender is taxable, in basis points
    tax_out: u16,

    /// Sole authority over tax configuration; receives collected fees
    treasury: Address,

    /// External value-exchange venues; transfers touching them are taxed
    taxable: HashSet<Address>,

    /// Addresses exempt from tax regardless of counterparty
    untaxable: HashSet<Address>,

    /// Pending events since the last drain
    events: Vec<LedgerEvent>,
}

impl Ledger {
    /// Create a new ledger, minting the full supply to `deployer`.
    ///
    /// The treasury defaults to the deployer when none is given; the
    /// deployer starts out untaxable so initial distribution is fee-free.
    pub fn new(deployer: Address, treasury: Option<Address>) -> Self {
        let treasury = treasury.unwrap_or(deployer);

        let mut balances = HashMap::new();
        balances.insert(deployer, TOTAL_SUPPLY);

        let mut untaxable = HashSet::new();
        untaxable.insert(deployer);

        info!(%deployer, %treasury, "ledger created");

        Self {
            balances,
            total_supply: TOTAL_SUPPLY,
            tax_in: DEFAULT_TAX_BPS,
            tax_out: DEFAULT_TAX_BPS,
            treasury,
            taxable: HashSet::new(),
            untaxable,
            events: Vec::new(),
        }
    }

    // === Queries ===

    /// Balance of an account (zero for unknown accounts)
    pub fn balance_of(&self, account: Address) -> Amount {
        self.balances.get(&account).copied().unwrap_or(0)
    }

    /// Current total supply
    pub fn total_supply(&self) -> Amount {
        self.total_supply
    }

    /// Current treasury address
    pub fn treasury(&self) -> Address {
        self.treasury
    }

    /// Recipient-side tax rate in basis points
    pub fn tax_in(&self) -> u16 {
        self.tax_in
    }

    /// Sender-side tax rate in basis points
    pub fn tax_out(&self) -> u16 {
        self.tax_out
    }

    /// Whether an address is classified as a taxable venue
    pub fn is_taxable(&self, account: Address) -> bool {
        self.taxable.contains(&account)
    }

    /// Whether an address is exempt from tax
    pub fn is_untaxable(&self, account: Address) -> bool {
        self.untaxable.contains(&account)
    }

    /// Take all events accumulated since the last drain
    pub fn drain_events(&mut self) -> Vec<LedgerEvent> {
        std::mem::take(&mut self.events)
    }

    /// Fee charged for a transfer, given current classification and rates.
    ///
    /// Untaxable status on either side overrides everything; otherwise the
    /// recipient-side rate is evaluated before the sender-side rate, so
    /// `tax_in` wins when both parties are taxable.
    fn fee_for(&self, sender: Address, recipient: Address, amount: Amount) -> Amount {
        if self.untaxable.contains(&sender) || self.untaxable.contains(&recipient) {
            0
        } else if self.taxable.contains(&recipient) {
            amount * self.tax_in as Amount / BPS_DENOMINATOR
        } else if self.taxable.contains(&sender) {
            amount * self.tax_out as Amount / BPS_DENOMINATOR
        } else {
            0
        }
    }

    // === Transfers ===

    /// Move `amount` from `sender` to `recipient`, routing any fee to the
    /// treasury. Returns the amount credited to the recipient.
    ///
    /// The sender is always debited the full `amount`; the fee comes out of
    /// what the recipient receives.
    pub fn transfer(
        &mut self,
        sender: Address,
        recipient: Address,
        amount: Amount,
    ) -> Result<Amount> {
        if recipient.is_zero() {
            return Err(LedgerError::ZeroAddress);
        }

        let available = self.balance_of(sender);
        if available < amount {
            return Err(LedgerError::InsufficientBalance {
                required: amount,
                available,
            });
        }

        let fee = self.fee_for(sender, recipient, amount);
        let credited = amount - fee;

        *self.balances.entry(sender).or_insert(0) -= amount;
        *self.balances.entry(recipient).or_insert(0) += credited;
        if fee > 0 {
            *self.balances.entry(self.treasury).or_insert(0) += fee;
        }

        debug!(%sender, %recipient, amount, fee, "transfer");
        self.events.push(LedgerEvent::Transfer {
            from: sender,
            to: recipient,
            amount: credited,
        });

        Ok(credited)
    }

    /// Destroy `amount` from the caller's balance, reducing total supply
    pub fn burn(&mut self, caller: Address, amount: Amount) -> Result<()> {
        let available = self.balance_of(caller);
        if available < amount {
            return Err(LedgerError::InsufficientBalance {
                required: amount,
                available,
            });
        }

        *self.balances.entry(caller).or_insert(0) -= amount;
        self.total_supply -= amount;

        debug!(%caller, amount, "burn");
        self.events.push(LedgerEvent::Burn {
            from: caller,
            amount,
        });

        Ok(())
    }

    // === Treasury-gated configuration ===

    fn require_treasury(&self, caller: Address) -> Result<()> {
        if caller != self.treasury {
            return Err(LedgerError::NotTreasury);
        }
        Ok(())
    }

    /// Hand the treasury role to a new address
    pub fn set_treasury(&mut self, caller: Address, new_treasury: Address) -> Result<()> {
        self.require_treasury(caller)?;
        if new_treasury.is_zero() {
            return Err(LedgerError::ZeroAddress);
        }

        info!(old = %self.treasury, new = %new_treasury, "treasury changed");
        self.treasury = new_treasury;
        Ok(())
    }

    /// Set both tax rates, each capped at [`MAX_TAX_BPS`]
    pub fn set_tax_rates(&mut self, caller: Address, tax_in: u16, tax_out: u16) -> Result<()> {
        self.require_treasury(caller)?;
        for proposed in [tax_in, tax_out] {
            if proposed > MAX_TAX_BPS {
                return Err(LedgerError::TaxTooHigh {
                    proposed,
                    max: MAX_TAX_BPS,
                });
            }
        }

        self.tax_in = tax_in;
        self.tax_out = tax_out;

        info!(tax_in, tax_out, "tax rates changed");
        self.events.push(LedgerEvent::TaxesChanged { tax_in, tax_out });
        Ok(())
    }

    /// Classify or declassify an address as a taxable venue
    pub fn set_taxable(&mut self, caller: Address, account: Address, flag: bool) -> Result<()> {
        self.require_treasury(caller)?;
        if account.is_zero() {
            return Err(LedgerError::ZeroAddress);
        }

        if flag {
            self.taxable.insert(account);
        } else {
            self.taxable.remove(&account);
        }
        Ok(())
    }

    /// Grant or revoke tax exemption for an address
    pub fn set_untaxable(&mut self, caller: Address, account: Address, flag: bool) -> Result<()> {
        self.require_treasury(caller)?;
        if account.is_zero() {
            return Err(LedgerError::ZeroAddress);
        }

        if flag {
            self.untaxable.insert(account);
        } else {
            self.untaxable.remove(&account);
        }
        Ok(())
    }
}
