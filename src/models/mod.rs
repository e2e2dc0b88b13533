/*
 * Data models and error types shared across the trading desk
 */

use crate::utils::format_timestamp;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Source tag written for rates synthesized from the built-in fallback table.
pub const STUB_SOURCE: &str = "Stub";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateEntry {
    pub rate: f64,
    pub updated_at: String,
    pub source: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RatesSnapshot {
    #[serde(default)]
    pub pairs: BTreeMap<String, RateEntry>,
    #[serde(default)]
    pub last_refresh: Option<String>,
    /// Stored pairs that are not well-typed entries. They are never served
    /// but are written back verbatim unless a typed entry replaces them.
    #[serde(skip)]
    pub unserved: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: String,
    pub from_currency: String,
    pub to_currency: String,
    pub rate: f64,
    pub timestamp: String,
    pub source: String,
    #[serde(default)]
    pub meta: serde_json::Map<String, serde_json::Value>,
}

impl HistoryRecord {
    /// The id carries microseconds so refreshes within the same second stay distinct.
    #[must_use]
    pub fn observation(pair: &str, rate: f64, observed_at: DateTime<Utc>, source: &str) -> Self {
        let (from, to) = split_pair(pair);
        let stamp = observed_at.to_rfc3339_opts(SecondsFormat::Micros, true);
        Self {
            id: format!("{pair}_{source}_{stamp}"),
            from_currency: from.to_string(),
            to_currency: to.to_string(),
            rate,
            timestamp: format_timestamp(observed_at),
            source: source.to_string(),
            meta: serde_json::Map::new(),
        }
    }
}

/// A rate served to a caller together with the moment it was observed.
#[derive(Debug, Clone, PartialEq)]
pub struct RateQuote {
    pub rate: f64,
    pub updated_at: String,
}

#[must_use]
pub fn pair_key(from: &str, to: &str) -> String {
    format!("{from}_{to}")
}

/// Splits `FROM_TO` on the first underscore. A key without one yields an empty quote side.
#[must_use]
pub fn split_pair(pair: &str) -> (&str, &str) {
    pair.split_once('_').unwrap_or((pair, ""))
}

#[derive(Debug, Error)]
pub enum FxError {
    #[error("Unknown currency '{0}'")]
    UnknownCurrency(String),

    #[error("Rate {from}->{to} is unavailable, try again later")]
    RateUnavailable { from: String, to: String },

    #[error("Rate source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Failed to fetch rates from any source")]
    NoDataFromAnySource,

    #[error("Insufficient funds: available {available} {code}, required {required} {code}")]
    InsufficientFunds {
        available: String,
        required: String,
        code: String,
    },

    #[error("{0}")]
    Validation(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Storage error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl FxError {
    /// Stable name used in structured action logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            FxError::UnknownCurrency(_) => "UnknownCurrency",
            FxError::RateUnavailable { .. } => "RateUnavailable",
            FxError::SourceUnavailable(_) => "SourceUnavailable",
            FxError::NoDataFromAnySource => "NoDataFromAnySource",
            FxError::InsufficientFunds { .. } => "InsufficientFunds",
            FxError::Validation(_) => "ValidationError",
            FxError::AuthenticationFailed(_) => "AuthenticationFailed",
            FxError::ConfigError(_) => "ConfigError",
            FxError::Io(_) => "IoError",
            FxError::Serialization(_) => "SerializationError",
        }
    }
}

impl From<config::ConfigError> for FxError {
    fn from(e: config::ConfigError) -> Self {
        FxError::ConfigError(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, FxError>;
