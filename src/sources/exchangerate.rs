/*
 * ExchangeRate-API client for fiat rates
 */

use crate::config::ParserConfig;
use crate::models::{pair_key, Result};
use crate::sources::{get_json_object, positive_rate, unavailable, FetchedRates, RateSource};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

const NAME: &str = "ExchangeRate-API";

/// Response fields that may hold the rate table, in lookup order.
const RATE_FIELDS: &[&str] = &["conversion_rates", "rates"];

pub struct ExchangeRateClient {
    client: Client,
    config: ParserConfig,
}

impl ExchangeRateClient {
    #[must_use]
    pub fn new(client: Client, config: ParserConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl RateSource for ExchangeRateClient {
    fn name(&self) -> &str {
        NAME
    }

    async fn fetch_rates(&self) -> Result<FetchedRates> {
        if self.config.exchangerate_api_key.trim().is_empty() {
            return Err(unavailable(
                NAME,
                "API key is not set (parser.exchangerate_api_key)",
            ));
        }

        let request = self.client.get(self.config.exchangerate_latest_url());
        let body = get_json_object(request, NAME).await?;

        if let Some(result) = body.get("result").and_then(Value::as_str) {
            if !result.eq_ignore_ascii_case("success") {
                let reason = body
                    .get("error-type")
                    .or_else(|| body.get("error"))
                    .and_then(Value::as_str)
                    .unwrap_or("unknown");
                return Err(unavailable(NAME, format!("result='{result}', reason='{reason}'")));
            }
        }

        let table = RATE_FIELDS
            .iter()
            .find_map(|field| body.get(*field).and_then(Value::as_object))
            .ok_or_else(|| unavailable(NAME, "response has no rates object"))?;

        // The table is quoted as units of X per one base unit.
        let base = self.config.base_currency.to_uppercase();
        let rates: FetchedRates = self
            .config
            .fiat_currencies
            .iter()
            .map(|code| code.trim().to_uppercase())
            .filter(|code| *code != base)
            .filter_map(|code| {
                let per_base = table.get(&code).and_then(positive_rate)?;
                Some((pair_key(&code, &base), 1.0 / per_base))
            })
            .collect();

        if rates.is_empty() {
            return Err(unavailable(NAME, "no rates could be extracted from the response"));
        }
        Ok(rates)
    }
}
