/*
 * Built-in fallback rates used when the cache has nothing fresh
 */

use crate::models::pair_key;

const FALLBACK_RATES: &[(&str, f64)] = &[
    ("EUR_USD", 1.0786),
    ("GBP_USD", 1.2650),
    ("RUB_USD", 0.01016),
    ("BTC_USD", 59337.21),
    ("ETH_USD", 3720.00),
    ("SOL_USD", 145.30),
];

fn lookup(pair: &str) -> Option<f64> {
    FALLBACK_RATES
        .iter()
        .find(|(key, _)| *key == pair)
        .map(|(_, rate)| *rate)
        .filter(|rate| *rate > 0.0)
}

/// Direct pair if listed, otherwise the inverse of the reverse pair.
#[must_use]
pub fn fallback_rate(from: &str, to: &str) -> Option<f64> {
    lookup(&pair_key(from, to)).or_else(|| lookup(&pair_key(to, from)).map(|rate| 1.0 / rate))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_pair_is_used_as_is() {
        assert_eq!(fallback_rate("BTC", "USD"), Some(59337.21));
    }

    #[test]
    fn reverse_pair_is_inverted() {
        let rate = fallback_rate("USD", "EUR").unwrap();
        assert!((rate - 1.0 / 1.0786).abs() < 1e-12);
    }

    #[test]
    fn unlisted_pair_has_no_fallback() {
        assert_eq!(fallback_rate("BTC", "EUR"), None);
    }
}
