/*
 * Wallets and portfolios: per-user balances keyed by currency code
 */

use crate::currency;
use crate::models::{FxError, Result};
use crate::rates::RateLookup;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Wallet {
    #[serde(default)]
    pub balance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Portfolio {
    pub user_id: u64,
    #[serde(default)]
    wallets: BTreeMap<String, Wallet>,
}

/// Balance of one wallet before and after an operation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BalanceChange {
    pub old: f64,
    pub new: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WalletValue {
    pub code: String,
    pub balance: f64,
    pub value_in_base: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioValuation {
    pub base: String,
    pub wallets: Vec<WalletValue>,
    pub total: f64,
}

pub fn validate_amount(amount: f64) -> Result<f64> {
    if amount.is_finite() && amount > 0.0 {
        Ok(amount)
    } else {
        Err(FxError::Validation("'amount' must be a positive number".to_string()))
    }
}

impl Portfolio {
    #[must_use]
    pub fn new(user_id: u64) -> Self {
        Self {
            user_id,
            wallets: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.wallets.is_empty()
    }

    #[must_use]
    pub fn balance(&self, code: &str) -> Option<f64> {
        self.wallets.get(code).map(|w| w.balance)
    }

    /// Credits `code`, opening the wallet on first use.
    pub fn deposit(&mut self, code: &str, amount: f64) -> Result<BalanceChange> {
        let amount = validate_amount(amount)?;
        let wallet = self.wallets.entry(code.to_string()).or_default();
        let old = wallet.balance;
        wallet.balance += amount;
        Ok(BalanceChange { old, new: wallet.balance })
    }

    pub fn withdraw(&mut self, code: &str, amount: f64) -> Result<BalanceChange> {
        let amount = validate_amount(amount)?;
        let wallet = self.wallets.get_mut(code).ok_or_else(|| {
            FxError::Validation(format!(
                "You have no '{code}' wallet; it is opened automatically on the first buy"
            ))
        })?;

        if wallet.balance < amount {
            return Err(FxError::InsufficientFunds {
                available: currency::format_amount(code, wallet.balance),
                required: currency::format_amount(code, amount),
                code: code.to_string(),
            });
        }

        let old = wallet.balance;
        wallet.balance = (wallet.balance - amount).max(0.0);
        Ok(BalanceChange { old, new: wallet.balance })
    }

    /// Values every wallet in `base`, base wallet first and the rest by code.
    pub fn valuate(&self, base: &str, lookup: &RateLookup<'_>) -> Result<PortfolioValuation> {
        let base = currency::get_currency(base)?.code;

        // Keys arrive sorted; the stable sort only lifts the base wallet.
        let mut codes: Vec<&String> = self.wallets.keys().collect();
        codes.sort_by_key(|code| code.as_str() != base);

        let mut wallets = Vec::with_capacity(codes.len());
        let mut total = 0.0;
        for code in codes {
            let balance = self.wallets[code].balance;
            let rate = lookup.get_rate(code, base)?.rate;
            let value_in_base = balance * rate;
            total += value_in_base;
            wallets.push(WalletValue {
                code: code.clone(),
                balance,
                value_in_base,
            });
        }

        Ok(PortfolioValuation {
            base: base.to_string(),
            wallets,
            total,
        })
    }
}
