/*
 * Rate lookup over the cached snapshot, with TTL freshness and stub fallback
 */

pub mod stub;
pub mod updater;

use crate::currency;
use crate::models::{pair_key, split_pair, FxError, RateEntry, RateQuote, RatesSnapshot, Result, STUB_SOURCE};
use crate::storage::RatesStorage;
use crate::utils::{format_timestamp, is_fresh};
use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::{debug, info};

pub use updater::{RatesUpdater, SourceOutcome, UpdatePhase, UpdateReport};

pub struct RateLookup<'a> {
    storage: &'a dyn RatesStorage,
    ttl: Duration,
}

impl<'a> RateLookup<'a> {
    #[must_use]
    pub fn new(storage: &'a dyn RatesStorage, ttl: Duration) -> Self {
        Self { storage, ttl }
    }

    pub fn get_rate(&self, from: &str, to: &str) -> Result<RateQuote> {
        self.get_rate_at(from, to, Utc::now())
    }

    /// Serves a fresh cached rate, or synthesizes one from the fallback
    /// table and writes it back into the snapshot.
    pub fn get_rate_at(&self, from: &str, to: &str, now: DateTime<Utc>) -> Result<RateQuote> {
        let from = currency::get_currency(from)?.code;
        let to = currency::get_currency(to)?.code;

        if from == to {
            return Ok(RateQuote {
                rate: 1.0,
                updated_at: format_timestamp(now),
            });
        }

        let key = pair_key(from, to);
        let mut snapshot = self.storage.load_snapshot()?;

        if let Some(entry) = snapshot.pairs.get(&key) {
            if is_fresh(&entry.updated_at, now, self.ttl) {
                debug!("Serving cached {} from {} ({})", key, entry.source, entry.updated_at);
                return Ok(RateQuote {
                    rate: entry.rate,
                    updated_at: entry.updated_at.clone(),
                });
            }
        }

        let rate = stub::fallback_rate(from, to).ok_or_else(|| FxError::RateUnavailable {
            from: from.to_string(),
            to: to.to_string(),
        })?;
        let updated_at = format_timestamp(now);

        snapshot.pairs.insert(
            key.clone(),
            RateEntry {
                rate,
                updated_at: updated_at.clone(),
                source: STUB_SOURCE.to_string(),
            },
        );
        snapshot.last_refresh = Some(updated_at.clone());
        self.storage.save_snapshot(&snapshot)?;

        info!("Synthesized {} = {} from fallback table", key, rate);
        Ok(RateQuote { rate, updated_at })
    }
}

/// Narrows the cached rates listing.
#[derive(Debug, Clone, Default)]
pub struct RatesFilter {
    /// Keep pairs with this code on either side.
    pub currency: Option<String>,
    /// Keep pairs quoted in this code.
    pub base: Option<String>,
    /// Keep the N highest rates instead of sorting by pair.
    pub top: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RateRow {
    pub pair: String,
    pub rate: f64,
    pub updated_at: String,
    pub source: String,
}

#[must_use]
pub fn filter_rates(snapshot: &RatesSnapshot, filter: &RatesFilter) -> Vec<RateRow> {
    let currency = filter.currency.as_deref().map(str::to_uppercase);
    let base = filter.base.as_deref().map(str::to_uppercase);

    let mut rows: Vec<RateRow> = snapshot
        .pairs
        .iter()
        .filter(|(pair, _)| {
            let (from, to) = split_pair(pair);
            base.as_deref().map_or(true, |base| to == base)
                && currency.as_deref().map_or(true, |code| from == code || to == code)
        })
        .map(|(pair, entry)| RateRow {
            pair: pair.clone(),
            rate: entry.rate,
            updated_at: entry.updated_at.clone(),
            source: entry.source.clone(),
        })
        .collect();

    match filter.top {
        Some(top) => {
            rows.sort_by(|a, b| b.rate.total_cmp(&a.rate));
            rows.truncate(top);
        }
        None => rows.sort_by(|a, b| a.pair.cmp(&b.pair)),
    }
    rows
}
