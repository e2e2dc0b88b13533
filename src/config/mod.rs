/*
 * Configuration management for the trading desk
 */

use crate::currency;
use crate::models::{FxError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_CONFIG_NAME: &str = "fxdesk";
const ENV_PREFIX: &str = "FXDESK";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub data: DataConfig,
    pub rates: RatesConfig,
    pub parser: ParserConfig,
    pub logging: LoggingConfig,
}

/// Locations of the JSON documents. File names are joined onto `dir`,
/// so an absolute file name overrides the directory.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DataConfig {
    pub dir: PathBuf,
    pub users_file: PathBuf,
    pub portfolios_file: PathBuf,
    pub rates_file: PathBuf,
    pub history_file: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RatesConfig {
    pub ttl_seconds: u64,
    pub default_base: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ParserConfig {
    pub base_currency: String,
    pub coingecko_url: String,
    pub exchangerate_url: String,
    pub exchangerate_api_key: String,
    pub fiat_currencies: Vec<String>,
    pub crypto_currencies: Vec<String>,
    pub crypto_id_map: BTreeMap<String, String>,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub dir: PathBuf,
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    CoinGecko,
    ExchangeRate,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("data"),
            users_file: PathBuf::from("users.json"),
            portfolios_file: PathBuf::from("portfolios.json"),
            rates_file: PathBuf::from("rates.json"),
            history_file: PathBuf::from("exchange_rates.json"),
        }
    }
}

impl DataConfig {
    /// Puts every document under `dir`, keeping the default file names.
    #[must_use]
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn users_path(&self) -> PathBuf {
        self.dir.join(&self.users_file)
    }

    #[must_use]
    pub fn portfolios_path(&self) -> PathBuf {
        self.dir.join(&self.portfolios_file)
    }

    #[must_use]
    pub fn rates_path(&self) -> PathBuf {
        self.dir.join(&self.rates_file)
    }

    #[must_use]
    pub fn history_path(&self) -> PathBuf {
        self.dir.join(&self.history_file)
    }
}

impl Default for RatesConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: 300,
            default_base: "USD".to_string(),
        }
    }
}

impl RatesConfig {
    #[must_use]
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }
}

impl Default for ParserConfig {
    fn default() -> Self {
        let crypto_id_map = [("BTC", "bitcoin"), ("ETH", "ethereum"), ("SOL", "solana")]
            .into_iter()
            .map(|(code, id)| (code.to_string(), id.to_string()))
            .collect();

        Self {
            base_currency: "USD".to_string(),
            coingecko_url: "https://api.coingecko.com/api/v3/simple/price".to_string(),
            exchangerate_url: "https://v6.exchangerate-api.com/v6".to_string(),
            exchangerate_api_key: String::new(),
            fiat_currencies: vec!["EUR".to_string(), "GBP".to_string(), "RUB".to_string()],
            crypto_currencies: vec!["BTC".to_string(), "ETH".to_string(), "SOL".to_string()],
            crypto_id_map,
            request_timeout_secs: 10,
        }
    }
}

impl ParserConfig {
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    #[must_use]
    pub fn exchangerate_latest_url(&self) -> String {
        format!(
            "{}/{}/latest/{}",
            self.exchangerate_url.trim_end_matches('/'),
            self.exchangerate_api_key,
            self.base_currency.to_uppercase()
        )
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("logs"),
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

impl Config {
    /// Loads defaults, then `fxdesk.toml` (or the given file), then `FXDESK_*` variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenv::dotenv().ok();

        let file = match path {
            Some(path) => config::File::from(path.to_path_buf()).required(true),
            None => config::File::with_name(DEFAULT_CONFIG_NAME).required(false),
        };

        let config: Config = config::Config::builder()
            .add_source(file)
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("parser.fiat_currencies")
                    .with_list_parse_key("parser.crypto_currencies")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.rates.ttl_seconds == 0 {
            return Err(FxError::ConfigError("rates.ttl_seconds must be positive".to_string()));
        }
        if chrono::Duration::from_std(self.rates.ttl()).is_err() {
            return Err(FxError::ConfigError(format!(
                "rates.ttl_seconds is out of range: {}",
                self.rates.ttl_seconds
            )));
        }
        if self.parser.request_timeout_secs == 0 {
            return Err(FxError::ConfigError(
                "parser.request_timeout_secs must be positive".to_string(),
            ));
        }
        for code in [&self.rates.default_base, &self.parser.base_currency] {
            currency::get_currency(code).map_err(|_| {
                FxError::ConfigError(format!("Unknown base currency: {code}"))
            })?;
        }
        Ok(())
    }
}

impl std::str::FromStr for SourceKind {
    type Err = FxError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "coingecko" => Ok(SourceKind::CoinGecko),
            "exchangerate" => Ok(SourceKind::ExchangeRate),
            _ => Err(FxError::Validation(format!(
                "Unknown rate source: {s} (expected coingecko or exchangerate)"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();

        assert!(config.validate().is_ok());
        assert_eq!(config.rates.ttl(), Duration::from_secs(300));
        assert_eq!(config.data.rates_path(), PathBuf::from("data/rates.json"));
    }

    #[test]
    fn exchangerate_url_embeds_key_and_base() {
        let parser = ParserConfig {
            exchangerate_url: "https://example.test/v6/".to_string(),
            exchangerate_api_key: "KEY".to_string(),
            ..ParserConfig::default()
        };

        assert_eq!(parser.exchangerate_latest_url(), "https://example.test/v6/KEY/latest/USD");
    }

    #[test]
    fn file_values_override_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[rates]\nttl_seconds = 60\n\n[parser]\nfiat_currencies = [\"EUR\"]").unwrap();

        let config = Config::load(Some(file.path())).unwrap();

        assert_eq!(config.rates.ttl_seconds, 60);
        assert_eq!(config.rates.default_base, "USD");
        assert_eq!(config.parser.fiat_currencies, vec!["EUR".to_string()]);
    }

    #[test]
    fn zero_ttl_is_rejected() {
        let mut config = Config::default();
        config.rates.ttl_seconds = 0;

        assert!(matches!(config.validate(), Err(FxError::ConfigError(_))));
    }

    #[test]
    fn oversized_ttl_is_rejected() {
        let mut config = Config::default();
        config.rates.ttl_seconds = u64::MAX;

        assert!(matches!(config.validate(), Err(FxError::ConfigError(_))));
    }

    #[test]
    fn unknown_base_is_rejected() {
        let mut config = Config::default();
        config.rates.default_base = "XYZ".to_string();

        assert!(config.validate().is_err());
    }

    #[test]
    fn source_kind_parses_case_insensitively() {
        assert_eq!("CoinGecko".parse::<SourceKind>().unwrap(), SourceKind::CoinGecko);
        assert_eq!("exchangerate".parse::<SourceKind>().unwrap(), SourceKind::ExchangeRate);
        assert!("binance".parse::<SourceKind>().is_err());
    }
}
