/*
 * CoinGecko client for crypto rates
 */

use crate::config::ParserConfig;
use crate::models::{pair_key, Result};
use crate::sources::{get_json_object, positive_rate, unavailable, FetchedRates, RateSource};
use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

const NAME: &str = "CoinGecko";

pub struct CoinGeckoClient {
    client: Client,
    config: ParserConfig,
}

impl CoinGeckoClient {
    #[must_use]
    pub fn new(client: Client, config: ParserConfig) -> Self {
        Self { client, config }
    }

    /// Pairs each configured crypto code with its CoinGecko id, skipping codes the id map lacks.
    fn coin_ids(&self) -> Vec<(String, &str)> {
        self.config
            .crypto_currencies
            .iter()
            .filter_map(|code| {
                let code = code.trim().to_uppercase();
                self.config
                    .crypto_id_map
                    .iter()
                    .find(|(known, _)| known.eq_ignore_ascii_case(&code))
                    .map(|(_, id)| (code, id.as_str()))
            })
            .collect()
    }
}

#[async_trait]
impl RateSource for CoinGeckoClient {
    fn name(&self) -> &str {
        NAME
    }

    async fn fetch_rates(&self) -> Result<FetchedRates> {
        let coins = self.coin_ids();
        if coins.is_empty() {
            return Err(unavailable(
                NAME,
                "no coin ids configured (check parser.crypto_currencies and parser.crypto_id_map)",
            ));
        }

        let base = self.config.base_currency.to_uppercase();
        let vs_currency = base.to_lowercase();
        let ids = coins.iter().map(|(_, id)| *id).collect::<Vec<_>>().join(",");
        debug!("Requesting CoinGecko prices for {ids} in {vs_currency}");

        let request = self
            .client
            .get(&self.config.coingecko_url)
            .query(&[("ids", ids.as_str()), ("vs_currencies", vs_currency.as_str())]);
        let body = get_json_object(request, NAME).await?;

        let rates: FetchedRates = coins
            .iter()
            .filter_map(|(code, id)| {
                let rate = body.get(*id)?.get(&vs_currency).and_then(positive_rate)?;
                Some((pair_key(code, &base), rate))
            })
            .collect();

        if rates.is_empty() {
            return Err(unavailable(NAME, "no rates could be extracted from the response"));
        }
        Ok(rates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FxError;
    use mockito::Matcher;

    fn client_for(url: &str) -> CoinGeckoClient {
        let config = ParserConfig {
            coingecko_url: format!("{url}/api/v3/simple/price"),
            ..ParserConfig::default()
        };
        CoinGeckoClient::new(Client::new(), config)
    }

    #[tokio::test]
    async fn extracts_configured_coins() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v3/simple/price")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("ids".into(), "bitcoin,ethereum,solana".into()),
                Matcher::UrlEncoded("vs_currencies".into(), "usd".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"bitcoin":{"usd":59337.21},"ethereum":{"usd":3720.5},"solana":{"usd":0}}"#)
            .create_async()
            .await;

        let rates = client_for(&server.url()).fetch_rates().await.unwrap();

        mock.assert_async().await;
        assert_eq!(rates.len(), 2);
        assert_eq!(rates["BTC_USD"], 59337.21);
        assert_eq!(rates["ETH_USD"], 3720.5);
    }

    #[tokio::test]
    async fn non_success_status_is_unavailable() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v3/simple/price")
            .match_query(Matcher::Any)
            .with_status(429)
            .with_body("rate limited")
            .create_async()
            .await;

        let err = client_for(&server.url()).fetch_rates().await.unwrap_err();

        match err {
            FxError::SourceUnavailable(reason) => {
                assert!(reason.starts_with("CoinGecko: returned status 429"));
                assert!(reason.contains("rate limited"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn response_without_usable_rates_is_unavailable() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v3/simple/price")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"bitcoin":{"eur":1.0},"ethereum":"n/a"}"#)
            .create_async()
            .await;

        let err = client_for(&server.url()).fetch_rates().await.unwrap_err();

        assert!(matches!(err, FxError::SourceUnavailable(_)));
    }

    #[tokio::test]
    async fn array_body_is_unexpected_shape() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v3/simple/price")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        let err = client_for(&server.url()).fetch_rates().await.unwrap_err();

        assert!(err.to_string().contains("unexpected response shape"));
    }

    #[tokio::test]
    async fn empty_id_map_fails_without_request() {
        let config = ParserConfig {
            coingecko_url: "http://127.0.0.1:9/unused".to_string(),
            crypto_id_map: Default::default(),
            ..ParserConfig::default()
        };

        let err = CoinGeckoClient::new(Client::new(), config).fetch_rates().await.unwrap_err();

        assert!(err.to_string().contains("no coin ids configured"));
    }
}
