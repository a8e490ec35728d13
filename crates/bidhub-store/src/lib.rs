//! Versioned state store for the BidHub document: key-value persistence,
//! legacy probing, v1 -> v2 migration and first-run seeding.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use bidhub_core::{bid_number_seq, format_bid_number, Bid, Document, Stage};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const CRATE_NAME: &str = "bidhub-store";

/// Key the canonical current-schema document is written under.
pub const CURRENT_KEY: &str = "bidhub.v2";

/// Read-only probe order for existing documents. The first non-empty,
/// parseable blob wins.
pub const PROBE_KEYS: [&str; 2] = ["bidhub.v1", "bidhub.v2"];

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("reading state key {key}: {source}")]
    Read {
        key: String,
        #[source]
        source: std::io::Error,
    },
    #[error("writing state key {key}: {source}")]
    Write {
        key: String,
        #[source]
        source: std::io::Error,
    },
    #[error("serializing document: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// External key-value byte-store collaborator the document is persisted
/// through.
pub trait StateStore {
    fn read(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn write(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

/// One file per key inside a data directory. Writes go through a temp file
/// and an atomic rename so readers never observe a partial document.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

impl StateStore for FileStore {
    fn read(&self, key: &str) -> Result<Option<String>, StoreError> {
        match std::fs::read_to_string(self.path_for(key)) {
            Ok(raw) => Ok(Some(raw)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(StoreError::Read {
                key: key.to_string(),
                source: err,
            }),
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let wrap = |source| StoreError::Write {
            key: key.to_string(),
            source,
        };
        std::fs::create_dir_all(&self.root).map_err(wrap)?;

        let temp_path = self.root.join(format!(".{}.tmp", Uuid::new_v4()));
        std::fs::write(&temp_path, value).map_err(wrap)?;
        if let Err(err) = std::fs::rename(&temp_path, self.path_for(key)) {
            let _ = std::fs::remove_file(&temp_path);
            return Err(wrap(err));
        }
        Ok(())
    }
}

/// In-memory store for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(key: &str, value: &str) -> Self {
        let store = Self::default();
        store
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        store
    }
}

impl StateStore for MemoryStore {
    fn read(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Load the canonical current-schema document, migrating or seeding as
/// needed, and persist the result so subsequent loads are pass-through.
/// When a legacy key supplied the document, it is blanked once the migrated
/// document is safely down; otherwise the stale blob would shadow every
/// later save.
///
/// Never fails: unreadable or corrupt blobs are treated as absent, and the
/// worst case is a silent re-seed.
pub fn load(store: &dyn StateStore, now: DateTime<Utc>, today: NaiveDate) -> Document {
    let (doc, legacy_key) = match probe(store) {
        Some((key, candidate)) => {
            let legacy = (key != CURRENT_KEY).then_some(key);
            (migrate(candidate, today), legacy)
        }
        None => {
            info!("no existing document found; seeding");
            (Document::seed(now, today), None)
        }
    };
    match save(store, &doc) {
        Ok(()) => {
            if let Some(key) = legacy_key {
                if let Err(err) = store.write(key, "") {
                    warn!(key, error = %err, "retiring legacy state key failed");
                }
            }
        }
        Err(err) => warn!(error = %err, "persisting loaded document failed"),
    }
    doc
}

/// Persist the whole document under the current key. Last writer wins.
pub fn save(store: &dyn StateStore, doc: &Document) -> Result<(), StoreError> {
    let raw = serde_json::to_string(doc)?;
    store.write(CURRENT_KEY, &raw)
}

fn probe(store: &dyn StateStore) -> Option<(&'static str, Value)> {
    for key in PROBE_KEYS {
        let raw = match store.read(key) {
            Ok(Some(raw)) if !raw.trim().is_empty() => raw,
            Ok(_) => continue,
            Err(err) => {
                warn!(key, error = %err, "state read failed; treating key as absent");
                continue;
            }
        };
        match serde_json::from_str::<Value>(&raw) {
            Ok(value) if value.is_object() => {
                debug!(key, "found candidate document");
                return Some((key, value));
            }
            _ => {
                debug!(key, "skipping unparseable state blob");
                continue;
            }
        }
    }
    None
}

/// Upgrade a candidate document to the current schema. Already-current
/// documents pass through unchanged.
fn migrate(candidate: Value, today: NaiveDate) -> Document {
    let is_current = candidate.get("version").and_then(Value::as_u64) == Some(2)
        && candidate.get("bids").map(Value::is_array).unwrap_or(false);
    if is_current {
        match serde_json::from_value::<Document>(candidate.clone()) {
            Ok(doc) => return doc,
            Err(err) => {
                warn!(error = %err, "current-version document failed strict parse; re-migrating");
            }
        }
    }

    let legacy_bids = candidate
        .get("bids")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    let mut bids: Vec<Bid> = legacy_bids.iter().map(migrate_bid).collect();

    // Missing bid numbers are assigned after the per-record pass, continuing
    // from the highest suffix already present, stamped with the current year.
    let max_seq = bids
        .iter()
        .filter_map(|b| bid_number_seq(&b.bid_number))
        .max()
        .unwrap_or(0);
    let mut seq = max_seq;
    for bid in &mut bids {
        if bid.bid_number.is_empty() {
            seq += 1;
            bid.bid_number = format_bid_number(today.year(), seq);
        }
    }

    let mut doc = Document::default();
    doc.meta.next_bid_seq = seq + 1;
    doc.ui.last_selected_bid_id = candidate
        .get("ui")
        .and_then(|ui| ui.get("lastSelectedBidId"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    info!(bids = bids.len(), assigned = seq - max_seq, "migrated legacy document");
    doc.bids = bids;
    doc
}

fn migrate_bid(value: &Value) -> Bid {
    let mut bid = Bid::from_json_value(value);

    // Legacy free-text tag list becomes the scope sequence, but only when
    // scope itself was not already one. The tag field is dropped either way.
    let scope_is_seq = value.get("scope").map(Value::is_array).unwrap_or(false);
    if !scope_is_seq {
        if let Some(tags_csv) = value.get("tagsCsv").and_then(Value::as_str) {
            bid.scope = tags_csv
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
    }

    // Blank summary fields take the joined list they summarize, comma
    // separated, after the scope coercion above has run.
    if bid.scope_summary.is_empty() {
        bid.scope_summary = bid.scope.join(",");
    }
    if bid.differentiators_other.is_empty() {
        bid.differentiators_other = bid.differentiators.join(",");
    }

    if bid.title.is_empty() {
        bid.title = "Untitled bid".to_string();
    }
    bid
}
