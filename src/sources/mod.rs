/*
 * External rate sources for refreshing the snapshot
 */

mod coingecko;
mod exchangerate;

use crate::config::{ParserConfig, SourceKind};
use crate::models::{FxError, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt::Display;

pub use coingecko::CoinGeckoClient;
pub use exchangerate::ExchangeRateClient;

/// Rates keyed by `CODE_BASE`, every value positive.
pub type FetchedRates = BTreeMap<String, f64>;

const BODY_SNIPPET_CHARS: usize = 200;

#[async_trait]
pub trait RateSource: Send + Sync {
    fn name(&self) -> &str;

    /// Fails with [`FxError::SourceUnavailable`] instead of returning an empty map.
    async fn fetch_rates(&self) -> Result<FetchedRates>;
}

/// Builds the clients for a refresh, in the order they are merged. Later
/// sources win ties for the same pair.
pub fn create_sources(
    selection: Option<SourceKind>,
    config: &ParserConfig,
) -> Result<Vec<Box<dyn RateSource>>> {
    let client = Client::builder()
        .timeout(config.request_timeout())
        .build()
        .map_err(|e| FxError::ConfigError(format!("Failed to build HTTP client: {e}")))?;

    let kinds = match selection {
        Some(kind) => vec![kind],
        None => vec![SourceKind::CoinGecko, SourceKind::ExchangeRate],
    };

    Ok(kinds
        .into_iter()
        .map(|kind| -> Box<dyn RateSource> {
            match kind {
                SourceKind::CoinGecko => Box::new(CoinGeckoClient::new(client.clone(), config.clone())),
                SourceKind::ExchangeRate => {
                    Box::new(ExchangeRateClient::new(client.clone(), config.clone()))
                }
            }
        })
        .collect())
}

pub(crate) fn unavailable(provider: &str, reason: impl Display) -> FxError {
    FxError::SourceUnavailable(format!("{provider}: {reason}"))
}

/// Sends the request and insists on a 2xx response carrying a JSON object.
pub(crate) async fn get_json_object(request: RequestBuilder, provider: &str) -> Result<Map<String, Value>> {
    let response = request
        .send()
        .await
        .map_err(|e| unavailable(provider, format!("request failed: {e}")))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| unavailable(provider, format!("failed to read response body: {e}")))?;

    if !status.is_success() {
        return Err(unavailable(
            provider,
            format!("returned status {}: {}", status.as_u16(), snippet(&body)),
        ));
    }

    match serde_json::from_str::<Value>(&body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(unavailable(provider, "unexpected response shape, expected a JSON object")),
        Err(e) => Err(unavailable(provider, format!("failed to parse JSON response: {e}"))),
    }
}

pub(crate) fn positive_rate(value: &Value) -> Option<f64> {
    value.as_f64().filter(|rate| rate.is_finite() && *rate > 0.0)
}

fn snippet(body: &str) -> String {
    let body = body.trim();
    if body.chars().count() > BODY_SNIPPET_CHARS {
        let cut: String = body.chars().take(BODY_SNIPPET_CHARS).collect();
        format!("{cut}...")
    } else {
        body.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn default_selection_runs_both_sources_in_order() {
        let sources = create_sources(None, &ParserConfig::default()).unwrap();
        let names: Vec<_> = sources.iter().map(|s| s.name().to_string()).collect();

        assert_eq!(names, vec!["CoinGecko", "ExchangeRate-API"]);
    }

    #[test]
    fn explicit_selection_runs_one_source() {
        let sources = create_sources(Some(SourceKind::ExchangeRate), &ParserConfig::default()).unwrap();

        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].name(), "ExchangeRate-API");
    }

    #[test]
    fn only_positive_finite_numbers_are_rates() {
        assert_eq!(positive_rate(&json!(1.5)), Some(1.5));
        assert_eq!(positive_rate(&json!(3)), Some(3.0));
        assert_eq!(positive_rate(&json!(0)), None);
        assert_eq!(positive_rate(&json!(-2.0)), None);
        assert_eq!(positive_rate(&json!("1.5")), None);
        assert_eq!(positive_rate(&json!(null)), None);
    }

    #[test]
    fn long_bodies_are_truncated() {
        let body = "x".repeat(250);
        let cut = snippet(&body);

        assert_eq!(cut.len(), BODY_SNIPPET_CHARS + 3);
        assert!(cut.ends_with("..."));
        assert_eq!(snippet("  short  "), "short");
    }
}
