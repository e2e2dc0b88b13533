/*
 * Rates updater: fetches every source, merges into the snapshot, persists snapshot and history
 */

use crate::models::{FxError, HistoryRecord, RateEntry, RatesSnapshot, Result};
use crate::sources::{FetchedRates, RateSource};
use crate::storage::RatesStorage;
use crate::utils::{format_timestamp, parse_timestamp, utc_now_iso};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdatePhase {
    NotStarted,
    Fetching(usize),
    Merging,
    Persisting,
    Done,
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceOutcome {
    pub source: String,
    /// Number of rates received, or why the source was skipped.
    pub result: std::result::Result<usize, String>,
}

#[derive(Debug, Clone)]
pub struct UpdateReport {
    pub snapshot: RatesSnapshot,
    pub last_refresh: String,
    /// Distinct pairs written by this run. Zero when every observation
    /// lost to a newer stored entry.
    pub updated_pairs: usize,
    pub history_records: usize,
    pub outcomes: Vec<SourceOutcome>,
}

struct Observation {
    source: String,
    observed_at: DateTime<Utc>,
    rates: FetchedRates,
}

pub struct RatesUpdater<'a> {
    sources: Vec<Box<dyn RateSource>>,
    storage: &'a dyn RatesStorage,
    phase: UpdatePhase,
}

impl<'a> RatesUpdater<'a> {
    #[must_use]
    pub fn new(sources: Vec<Box<dyn RateSource>>, storage: &'a dyn RatesStorage) -> Self {
        Self {
            sources,
            storage,
            phase: UpdatePhase::NotStarted,
        }
    }

    #[must_use]
    pub fn phase(&self) -> UpdatePhase {
        self.phase
    }

    fn enter(&mut self, phase: UpdatePhase) {
        debug!("Rates update phase {:?} -> {:?}", self.phase, phase);
        self.phase = phase;
    }

    /// Runs every source in order. A failing source is logged and skipped;
    /// the run fails only when no source produced a single usable rate, and
    /// then nothing is written.
    pub async fn run_update(&mut self) -> Result<UpdateReport> {
        info!("Rates update started at {} (sources={})", utc_now_iso(), self.sources.len());

        let mut observations = Vec::new();
        let mut outcomes = Vec::new();

        for index in 0..self.sources.len() {
            self.enter(UpdatePhase::Fetching(index));
            let source = &self.sources[index];
            let name = source.name().to_string();
            info!("Fetching rates from {} ...", name);

            match source.fetch_rates().await {
                Ok(rates) => {
                    info!("Fetched {} rates from {} (OK)", rates.len(), name);
                    outcomes.push(SourceOutcome {
                        source: name.clone(),
                        result: Ok(rates.len()),
                    });
                    observations.push(Observation {
                        source: name,
                        observed_at: Utc::now(),
                        rates,
                    });
                }
                Err(e) => {
                    warn!("Fetching from {} failed: {}", name, e);
                    outcomes.push(SourceOutcome {
                        source: name,
                        result: Err(e.to_string()),
                    });
                }
            }
        }

        self.enter(UpdatePhase::Merging);
        let mut snapshot = match self.storage.load_snapshot() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                self.enter(UpdatePhase::Failed);
                return Err(e);
            }
        };
        let (updated_pairs, history) = merge(&mut snapshot, &observations);

        let finished_at = utc_now_iso();
        if history.is_empty() {
            self.enter(UpdatePhase::Failed);
            warn!("Rates update finished with no data (at {})", finished_at);
            return Err(FxError::NoDataFromAnySource);
        }
        snapshot.last_refresh = Some(finished_at.clone());

        self.enter(UpdatePhase::Persisting);
        info!("Saving snapshot (pairs={}) ...", snapshot.pairs.len());
        let persisted = self
            .storage
            .save_snapshot(&snapshot)
            .and_then(|()| {
                info!("Appending history records (count={}) ...", history.len());
                self.storage.append_history(&history)
            });
        if let Err(e) = persisted {
            self.enter(UpdatePhase::Failed);
            return Err(e);
        }

        self.enter(UpdatePhase::Done);
        info!("Rates update finished OK at {}", finished_at);

        Ok(UpdateReport {
            snapshot,
            last_refresh: finished_at,
            updated_pairs,
            history_records: history.len(),
            outcomes,
        })
    }
}

/// Folds observations into the snapshot in source order. A slot is replaced
/// when its current timestamp is not newer than the observation, so the later
/// source wins a tie. Every accepted observation yields one history record,
/// including those that lose to a newer stored entry.
fn merge(snapshot: &mut RatesSnapshot, observations: &[Observation]) -> (usize, Vec<HistoryRecord>) {
    let mut history = Vec::new();
    let mut touched = BTreeSet::new();

    for observation in observations {
        let updated_at = format_timestamp(observation.observed_at);
        let observed = parse_timestamp(&updated_at);
        let mut seen = BTreeSet::new();

        for (pair, &rate) in &observation.rates {
            let pair = pair.trim().to_uppercase();
            if pair.is_empty() || !rate.is_finite() || rate <= 0.0 || !seen.insert(pair.clone()) {
                continue;
            }

            let replace = snapshot
                .pairs
                .get(&pair)
                .map_or(true, |current| parse_timestamp(&current.updated_at) <= observed);
            if replace {
                snapshot.pairs.insert(
                    pair.clone(),
                    RateEntry {
                        rate,
                        updated_at: updated_at.clone(),
                        source: observation.source.clone(),
                    },
                );
                touched.insert(pair.clone());
            }

            history.push(HistoryRecord::observation(
                &pair,
                rate,
                observation.observed_at,
                &observation.source,
            ));
        }
    }

    (touched.len(), history)
}
