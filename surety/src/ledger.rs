//! Fee and balance ledger.
//!
//! Tracks withdrawable credit per account and the total of fees and premiums
//! collected by the instance. Balances never go negative.

use std::collections::HashMap;

use crate::error::{Result, SuretyError};
use crate::types::{AccountId, Amount};

/// Per-account withdrawable credit.
#[derive(Debug, Default)]
pub struct Ledger {
    /// Credit by account
    balances: HashMap<AccountId, Amount>,
    /// Fees and premiums collected
    collected: Amount,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current credit of an account.
    pub fn balance(&self, account: &AccountId) -> Amount {
        self.balances.get(account).copied().unwrap_or_default()
    }

    /// Total fees and premiums collected.
    pub fn collected(&self) -> Amount {
        self.collected
    }

    /// Check that a payment can be collected without overflow.
    pub fn ensure_collectable(&self, amount: Amount) -> Result<()> {
        self.collected
            .checked_add(amount)
            .map(|_| ())
            .ok_or_else(|| SuretyError::Overflow("collected funds".to_string()))
    }

    /// Record an incoming fee or premium.
    pub fn collect(&mut self, amount: Amount) -> Result<()> {
        self.collected = self
            .collected
            .checked_add(amount)
            .ok_or_else(|| SuretyError::Overflow("collected funds".to_string()))?;
        Ok(())
    }

    /// Check that crediting `amount` to `account` cannot overflow.
    pub fn ensure_creditable(&self, account: &AccountId, amount: Amount) -> Result<()> {
        self.balance(account)
            .checked_add(amount)
            .map(|_| ())
            .ok_or_else(|| SuretyError::Overflow(format!("balance of {account}")))
    }

    /// Add credit to an account. Leaves the balance untouched on overflow.
    ///
    /// Settlement runs [`Ledger::ensure_creditable`] for every policyholder
    /// before crediting any of them.
    pub fn credit(&mut self, account: AccountId, amount: Amount) -> Result<Amount> {
        let balance = self
            .balance(&account)
            .checked_add(amount)
            .ok_or_else(|| SuretyError::Overflow(format!("balance of {account}")))?;
        self.balances.insert(account, balance);
        Ok(balance)
    }

    /// Remove credit ahead of an external payout. Returns the remaining credit.
    pub fn debit(&mut self, account: &AccountId, amount: Amount) -> Result<Amount> {
        if amount.is_zero() {
            return Err(SuretyError::InvalidInput("withdrawal amount must be positive".to_string()));
        }
        let available = self.balance(account);
        let remaining = available
            .checked_sub(amount)
            .ok_or(SuretyError::InsufficientBalance {
                requested: amount,
                available,
            })?;

        if remaining.is_zero() {
            self.balances.remove(account);
        } else {
            self.balances.insert(*account, remaining);
        }
        Ok(remaining)
    }
}
