/*
 * JSON document storage for users, portfolios, the rate snapshot and rate history
 */

use crate::config::DataConfig;
use crate::models::{HistoryRecord, RateEntry, RatesSnapshot, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Document {
    Users,
    Portfolios,
    Rates,
    History,
}

/// Where refreshed rates go. The updater and the rate lookup only see this seam.
pub trait RatesStorage {
    fn load_snapshot(&self) -> Result<RatesSnapshot>;
    fn save_snapshot(&self, snapshot: &RatesSnapshot) -> Result<()>;
    fn append_history(&self, records: &[HistoryRecord]) -> Result<()>;
}

/// Reads and writes whole JSON documents. Every write replaces the file
/// through a temporary sibling and a rename.
#[derive(Debug, Clone)]
pub struct JsonStore {
    data: DataConfig,
}

impl JsonStore {
    #[must_use]
    pub fn new(data: DataConfig) -> Self {
        Self { data }
    }

    #[must_use]
    pub fn path(&self, document: Document) -> PathBuf {
        match document {
            Document::Users => self.data.users_path(),
            Document::Portfolios => self.data.portfolios_path(),
            Document::Rates => self.data.rates_path(),
            Document::History => self.data.history_path(),
        }
    }

    /// Missing and unreadable documents both read as `T::default()`.
    pub fn read<T: DeserializeOwned + Default>(&self, document: Document) -> Result<T> {
        let path = self.path(document);
        match read_value(&path)? {
            Some(value) => Ok(serde_json::from_value(value).unwrap_or_else(|e| {
                warn!("Ignoring malformed document {}: {}", path.display(), e);
                T::default()
            })),
            None => Ok(T::default()),
        }
    }

    pub fn write<T: Serialize>(&self, document: Document, value: &T) -> Result<()> {
        let path = self.path(document);
        atomic_write(&path, &serde_json::to_vec_pretty(value)?)?;
        debug!("Wrote {}", path.display());
        Ok(())
    }
}

impl RatesStorage for JsonStore {
    fn load_snapshot(&self) -> Result<RatesSnapshot> {
        let path = self.path(Document::Rates);
        Ok(read_value(&path)?.map(snapshot_from_value).unwrap_or_default())
    }

    fn save_snapshot(&self, snapshot: &RatesSnapshot) -> Result<()> {
        let mut document = serde_json::to_value(snapshot)?;
        if let Some(Value::Object(pairs)) = document.get_mut("pairs") {
            for (key, raw) in &snapshot.unserved {
                if !pairs.contains_key(key) {
                    pairs.insert(key.clone(), raw.clone());
                }
            }
        }
        self.write(Document::Rates, &document)
    }

    fn append_history(&self, records: &[HistoryRecord]) -> Result<()> {
        let mut history: Vec<Value> = self.read(Document::History)?;
        for record in records {
            history.push(serde_json::to_value(record)?);
        }
        self.write(Document::History, &history)
    }
}

fn read_value(path: &Path) -> Result<Option<Value>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    match serde_json::from_slice(&bytes) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            warn!("Ignoring unparseable document {}: {}", path.display(), e);
            Ok(None)
        }
    }
}

/// Accepts both `{"pairs": {...}, "last_refresh": ...}` and a flat map of
/// pair keys. Entries without a positive rate or a string timestamp are kept
/// aside in `unserved`.
fn snapshot_from_value(value: Value) -> RatesSnapshot {
    let Value::Object(mut root) = value else {
        return RatesSnapshot::default();
    };

    let last_refresh = root
        .get("last_refresh")
        .and_then(Value::as_str)
        .map(str::to_string);

    let raw_pairs = match root.remove("pairs") {
        Some(Value::Object(pairs)) => pairs,
        Some(_) => serde_json::Map::new(),
        None => root
            .into_iter()
            .filter(|(key, value)| key.contains('_') && value.is_object())
            .collect(),
    };

    let mut pairs = BTreeMap::new();
    let mut unserved = BTreeMap::new();
    for (key, value) in raw_pairs {
        match serde_json::from_value::<RateEntry>(value.clone()) {
            Ok(entry) if entry.rate.is_finite() && entry.rate > 0.0 => {
                pairs.insert(key.to_uppercase(), entry);
            }
            _ => {
                debug!("Keeping ill-typed rate entry {} unserved", key);
                unserved.insert(key, value);
            }
        }
    }

    RatesSnapshot {
        pairs,
        last_refresh,
        unserved,
    }
}

fn atomic_write(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn store(dir: &tempfile::TempDir) -> JsonStore {
        JsonStore::new(DataConfig::in_dir(dir.path()))
    }

    fn entry(rate: f64) -> RateEntry {
        RateEntry {
            rate,
            updated_at: "2025-01-01T00:00:00Z".to_string(),
            source: "CoinGecko".to_string(),
        }
    }

    #[test]
    fn missing_documents_read_as_default() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);

        let users: Vec<Value> = store.read(Document::Users).unwrap();
        assert!(users.is_empty());
        assert_eq!(store.load_snapshot().unwrap(), RatesSnapshot::default());
    }

    #[test]
    fn snapshot_round_trip_preserves_entries() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        let mut snapshot = RatesSnapshot::default();
        snapshot.pairs.insert("BTC_USD".to_string(), entry(59337.21));
        snapshot.pairs.insert("EUR_USD".to_string(), entry(1.0786));
        snapshot.last_refresh = Some("2025-01-01T00:00:00Z".to_string());

        store.save_snapshot(&snapshot).unwrap();
        let first = fs::read(store.path(Document::Rates)).unwrap();
        let loaded = store.load_snapshot().unwrap();
        store.save_snapshot(&loaded).unwrap();

        assert_eq!(loaded, snapshot);
        assert_eq!(fs::read(store.path(Document::Rates)).unwrap(), first);
    }

    #[test]
    fn ill_typed_pairs_are_not_served() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        let raw = json!({
            "pairs": {
                "BTC_USD": {"rate": 100.0, "updated_at": "2025-01-01T00:00:00Z", "source": "x"},
                "ETH_USD": {"rate": "oops", "updated_at": "2025-01-01T00:00:00Z", "source": "x"},
                "SOL_USD": {"rate": -1.0, "updated_at": "2025-01-01T00:00:00Z", "source": "x"},
                "EUR_USD": {"rate": 1.1, "updated_at": 12, "source": "x"}
            },
            "last_refresh": null
        });
        fs::write(store.path(Document::Rates), raw.to_string()).unwrap();

        let snapshot = store.load_snapshot().unwrap();

        assert_eq!(snapshot.pairs.keys().collect::<Vec<_>>(), vec!["BTC_USD"]);
        assert_eq!(
            snapshot.unserved.keys().collect::<Vec<_>>(),
            vec!["ETH_USD", "EUR_USD", "SOL_USD"]
        );
        assert_eq!(snapshot.last_refresh, None);
    }

    #[test]
    fn unserved_pairs_survive_a_save() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        let partial = json!({"rate": 3700, "updated_at": "2025-01-01T00:00:00Z"});
        let raw = json!({"pairs": {"ETH_USD": partial, "SOL_USD": {"rate": 0}}});
        fs::write(store.path(Document::Rates), raw.to_string()).unwrap();

        let mut snapshot = store.load_snapshot().unwrap();
        snapshot.pairs.insert("SOL_USD".to_string(), entry(145.3));
        store.save_snapshot(&snapshot).unwrap();

        let saved: Value = serde_json::from_slice(&fs::read(store.path(Document::Rates)).unwrap()).unwrap();
        assert_eq!(saved["pairs"]["ETH_USD"], partial);
        assert_eq!(saved["pairs"]["SOL_USD"]["rate"], json!(145.3));
    }

    #[test]
    fn legacy_flat_snapshot_is_read() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        let raw = json!({
            "EUR_USD": {"rate": 1.1, "updated_at": "2025-01-01T00:00:00Z", "source": "Stub"},
            "last_refresh": "2025-01-01T00:00:00Z"
        });
        fs::write(store.path(Document::Rates), raw.to_string()).unwrap();

        let snapshot = store.load_snapshot().unwrap();

        assert!(snapshot.pairs.contains_key("EUR_USD"));
        assert_eq!(snapshot.last_refresh.as_deref(), Some("2025-01-01T00:00:00Z"));
    }

    #[test]
    fn corrupt_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        fs::write(store.path(Document::Rates), "{not json").unwrap();

        assert!(store.load_snapshot().unwrap().pairs.is_empty());
    }

    #[test]
    fn history_is_appended_not_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        let at = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let first = HistoryRecord::observation("BTC_USD", 1.0, at, "A");
        let second = HistoryRecord::observation("BTC_USD", 2.0, at + chrono::Duration::minutes(1), "B");

        store.append_history(&[first.clone()]).unwrap();
        store.append_history(&[second.clone()]).unwrap();

        let history: Vec<HistoryRecord> = store.read(Document::History).unwrap();
        assert_eq!(history, vec![first, second]);
    }

    #[test]
    fn writes_create_the_data_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(DataConfig::in_dir(dir.path().join("nested/data")));

        store.write(Document::Users, &Vec::<Value>::new()).unwrap();

        assert!(store.path(Document::Users).exists());
    }
}
