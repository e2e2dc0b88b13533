/*
 * Static registry of the currencies the desk can trade
 */

use crate::models::{FxError, Result};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CurrencyKind {
    Fiat {
        issuing_country: &'static str,
    },
    Crypto {
        algorithm: &'static str,
        market_cap: f64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Currency {
    pub name: &'static str,
    pub code: &'static str,
    pub kind: CurrencyKind,
}

const REGISTRY: &[Currency] = &[
    Currency {
        name: "US Dollar",
        code: "USD",
        kind: CurrencyKind::Fiat { issuing_country: "United States" },
    },
    Currency {
        name: "Euro",
        code: "EUR",
        kind: CurrencyKind::Fiat { issuing_country: "Eurozone" },
    },
    Currency {
        name: "British Pound",
        code: "GBP",
        kind: CurrencyKind::Fiat { issuing_country: "United Kingdom" },
    },
    Currency {
        name: "Russian Ruble",
        code: "RUB",
        kind: CurrencyKind::Fiat { issuing_country: "Russia" },
    },
    Currency {
        name: "Bitcoin",
        code: "BTC",
        kind: CurrencyKind::Crypto { algorithm: "SHA-256", market_cap: 1.12e12 },
    },
    Currency {
        name: "Ethereum",
        code: "ETH",
        kind: CurrencyKind::Crypto { algorithm: "Ethash", market_cap: 4.50e11 },
    },
    Currency {
        name: "Solana",
        code: "SOL",
        kind: CurrencyKind::Crypto { algorithm: "Proof of History", market_cap: 6.5e10 },
    },
];

impl Currency {
    #[must_use]
    pub fn is_crypto(&self) -> bool {
        matches!(self.kind, CurrencyKind::Crypto { .. })
    }

    /// Decimal places used when showing balances of this currency.
    #[must_use]
    pub fn precision(&self) -> usize {
        if self.is_crypto() {
            4
        } else {
            2
        }
    }

    #[must_use]
    pub fn format_amount(&self, amount: f64) -> String {
        format!("{amount:.prec$}", prec = self.precision())
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            CurrencyKind::Fiat { issuing_country } => {
                write!(f, "[FIAT] {} - {} (Issuing: {})", self.code, self.name, issuing_country)
            }
            CurrencyKind::Crypto { algorithm, market_cap } => write!(
                f,
                "[CRYPTO] {} - {} (Algo: {}, MCAP: {:.2e})",
                self.code, self.name, algorithm, market_cap
            ),
        }
    }
}

/// Upper-cases and trims user input, rejecting anything that cannot be a code.
pub fn normalize_code(code: &str) -> Result<String> {
    let code = code.trim().to_uppercase();
    if code.len() < 2 || code.len() > 5 || code.chars().any(char::is_whitespace) {
        return Err(FxError::UnknownCurrency(code));
    }
    Ok(code)
}

pub fn get_currency(code: &str) -> Result<&'static Currency> {
    let code = normalize_code(code)?;
    REGISTRY
        .iter()
        .find(|c| c.code == code)
        .ok_or(FxError::UnknownCurrency(code))
}

#[must_use]
pub fn all() -> &'static [Currency] {
    REGISTRY
}

/// Formats an amount with the precision of `code`, falling back to two
/// decimals for codes outside the registry.
#[must_use]
pub fn format_amount(code: &str, amount: f64) -> String {
    match get_currency(code) {
        Ok(currency) => currency.format_amount(amount),
        Err(_) => format!("{amount:.2}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_and_whitespace_insensitive() {
        let btc = get_currency(" btc ").unwrap();
        assert_eq!(btc.code, "BTC");
        assert!(btc.is_crypto());
    }

    #[test]
    fn unknown_code_fails() {
        assert!(matches!(get_currency("XYZ"), Err(FxError::UnknownCurrency(c)) if c == "XYZ"));
        assert!(matches!(get_currency(""), Err(FxError::UnknownCurrency(_))));
        assert!(matches!(get_currency("TOOLONG"), Err(FxError::UnknownCurrency(_))));
    }

    #[test]
    fn precision_depends_on_kind() {
        assert_eq!(format_amount("BTC", 10.0), "10.0000");
        assert_eq!(format_amount("EUR", 10.0), "10.00");
        assert_eq!(format_amount("???", 1.5), "1.50");
    }

    #[test]
    fn display_includes_kind_specific_fields() {
        let usd = get_currency("USD").unwrap();
        assert_eq!(usd.to_string(), "[FIAT] USD - US Dollar (Issuing: United States)");

        let eth = get_currency("ETH").unwrap().to_string();
        assert!(eth.starts_with("[CRYPTO] ETH - Ethereum (Algo: Ethash"));
    }

    #[test]
    fn registry_codes_are_well_formed() {
        for currency in all() {
            assert_eq!(normalize_code(currency.code).unwrap(), currency.code);
        }
    }
}
