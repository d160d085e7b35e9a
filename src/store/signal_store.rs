use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::error::{StorageError, StoreError};
use crate::models::{Outcome, Signal, SignalSource, SignalStatus};
use crate::storage::Storage;
use crate::store::market::{Market, MarketClassifier, TickerListClassifier};
use crate::store::merge::{upsert, ConflictPolicy, UpsertOutcome};
use crate::store::retention::{keep_newest, RetentionPolicy, DEGRADED_KEEP};

pub const PRIMARY_KEY: &str = "permanent_trading_signals";
pub const BACKUP_KEY: &str = "permanent_trading_signals_backup";
pub const DEFAULT_BACKUP_SIZE: usize = 100;

pub type SharedStore = Arc<RwLock<SignalStore>>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub primary_key: String,
    pub backup_key: String,
    pub retention: RetentionPolicy,
    pub backup_size: usize,
    pub conflict_policy: ConflictPolicy,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            primary_key: PRIMARY_KEY.to_string(),
            backup_key: BACKUP_KEY.to_string(),
            retention: RetentionPolicy::default(),
            backup_size: DEFAULT_BACKUP_SIZE,
            conflict_policy: ConflictPolicy::default(),
        }
    }
}

/// Snapshot written to the backup slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupSnapshot {
    pub timestamp: DateTime<Utc>,
    pub count: usize,
    pub signals: Vec<Signal>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    pub signals: Vec<Signal>,
    pub total: usize,
    pub page: usize,
    pub limit: usize,
    pub total_pages: usize,
}

/// Durable, newest-first collection of signals, unique by `id`.
///
/// The primary slot is read once on open; afterwards the in-memory list
/// is authoritative and every mutation rewrites the slot.
pub struct SignalStore {
    storage: Box<dyn Storage>,
    config: StoreConfig,
    classifier: Box<dyn MarketClassifier>,
    records: Vec<Signal>,
}

impl SignalStore {
    pub fn open(storage: Box<dyn Storage>, config: StoreConfig) -> Self {
        let mut store = Self {
            storage,
            config,
            classifier: Box::new(TickerListClassifier::default()),
            records: Vec::new(),
        };
        store.records = store.load_primary();
        info!(
            "Signal store opened: {} records (retention: {:?}, conflicts: {})",
            store.records.len(),
            store.config.retention,
            store.config.conflict_policy
        );
        store
    }

    pub fn with_classifier(mut self, classifier: Box<dyn MarketClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn shared(self) -> SharedStore {
        Arc::new(RwLock::new(self))
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn storage(&self) -> &dyn Storage {
        self.storage.as_ref()
    }

    pub fn classifier(&self) -> &dyn MarketClassifier {
        self.classifier.as_ref()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.iter().any(|s| s.id == id)
    }

    /// Re-read the primary slot, picking up writes from other handles.
    pub fn reload(&mut self) {
        self.records = self.load_primary();
    }

    fn load_primary(&self) -> Vec<Signal> {
        let key = &self.config.primary_key;
        let content = match self.storage.read(key) {
            Ok(Some(c)) => c,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!("Reading signal store failed, starting empty: {}", e);
                return Vec::new();
            }
        };

        let values: Vec<serde_json::Value> = match serde_json::from_str(&content) {
            Ok(v) => v,
            Err(e) => {
                warn!("Signal store slot is malformed, treating as empty: {}", e);
                return Vec::new();
            }
        };

        let mut seen = HashSet::new();
        let mut records = Vec::with_capacity(values.len());
        for (i, value) in values.into_iter().enumerate() {
            match serde_json::from_value::<Signal>(value) {
                Ok(sig) if sig.id.is_empty() => warn!("Dropping stored record {} without id", i),
                Ok(sig) => {
                    if seen.insert(sig.id.clone()) {
                        records.push(sig);
                    } else {
                        warn!("Dropping duplicate stored record {}", sig.id);
                    }
                }
                Err(e) => warn!("Dropping unreadable stored record {}: {}", i, e),
            }
        }
        records
    }

    /// Upsert by `id`, apply retention, persist, refresh the backup.
    /// Storage failures are handled here and never reach the caller.
    pub fn store(&mut self, signal: Signal, source: SignalSource) -> UpsertOutcome {
        let outcome = self.upsert_in_memory(signal, source);
        if outcome.changed() {
            self.persist();
        }
        outcome
    }

    pub(crate) fn upsert_in_memory(&mut self, mut signal: Signal, source: SignalSource) -> UpsertOutcome {
        let id = signal.id.clone();
        signal.immutable = true;
        signal.source = Some(source);
        if !self.contains(&id) {
            signal.persisted_at.get_or_insert_with(Utc::now);
        }

        let outcome = upsert(&mut self.records, signal, self.config.conflict_policy);
        match outcome {
            UpsertOutcome::Inserted => debug!("Stored new signal {} from {}", id, source),
            UpsertOutcome::Merged => debug!("Merged signal {} from {}", id, source),
            UpsertOutcome::Stale => debug!("Ignored stale update for {} from {}", id, source),
            UpsertOutcome::Rejected => warn!("Rejected signal without id from {}", source),
        }

        let evicted = self.config.retention.apply(&mut self.records);
        if evicted > 0 {
            debug!("Retention evicted {} oldest signals", evicted);
        }
        outcome
    }

    /// Write the primary slot, degrading to the newest `DEGRADED_KEEP`
    /// records when the medium is full. Returns whether a write landed.
    pub(crate) fn persist(&mut self) -> bool {
        let written = match self.write_records() {
            Ok(()) => true,
            Err(StorageError::QuotaExceeded { bytes, .. }) => {
                let dropped = keep_newest(&mut self.records, DEGRADED_KEEP);
                warn!(
                    "Storage full writing {} bytes; keeping newest {} signals ({} dropped)",
                    bytes, DEGRADED_KEEP, dropped
                );
                match self.write_records() {
                    Ok(()) => true,
                    Err(e) => {
                        error!("Reduced signal store write failed, keeping in-memory view: {}", e);
                        false
                    }
                }
            }
            Err(e) => {
                error!("Signal store write failed, keeping in-memory view: {}", e);
                false
            }
        };

        if written {
            self.write_backup();
        }
        written
    }

    fn write_records(&mut self) -> Result<(), StorageError> {
        let json = encode(&self.config.primary_key, &self.records)?;
        self.storage.write(&self.config.primary_key, &json)
    }

    /// Refresh the backup slot with the newest `backup_size` records.
    pub fn write_backup(&mut self) -> bool {
        if self.config.backup_size == 0 {
            return false;
        }
        let signals: Vec<Signal> = self
            .records
            .iter()
            .take(self.config.backup_size)
            .cloned()
            .collect();
        let snapshot = BackupSnapshot {
            timestamp: Utc::now(),
            count: signals.len(),
            signals,
        };
        let json = match encode(&self.config.backup_key, &snapshot) {
            Ok(j) => j,
            Err(e) => {
                warn!("Failed to serialize backup: {}", e);
                return false;
            }
        };
        match self.storage.write(&self.config.backup_key, &json) {
            Ok(()) => true,
            Err(e) => {
                warn!("Backup write failed: {}", e);
                false
            }
        }
    }

    pub(crate) fn read_backup(&self) -> Result<BackupSnapshot, StoreError> {
        let content = self
            .storage
            .read(&self.config.backup_key)?
            .ok_or(StoreError::NoBackup)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn get_all(&self) -> &[Signal] {
        &self.records
    }

    pub fn get_by_id(&self, id: &str) -> Option<&Signal> {
        self.records.iter().find(|s| s.id == id)
    }

    pub fn get_page(&self, page: usize, limit: usize) -> Page {
        let total = self.records.len();
        let total_pages = if limit == 0 { 0 } else { total.div_ceil(limit) };
        let signals = if page == 0 || limit == 0 {
            Vec::new()
        } else {
            self.records
                .iter()
                .skip((page - 1).saturating_mul(limit))
                .take(limit)
                .cloned()
                .collect()
        };
        Page {
            signals,
            total,
            page,
            limit,
            total_pages,
        }
    }

    /// Inclusive on both ends.
    pub fn get_by_date_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<&Signal> {
        self.records
            .iter()
            .filter(|s| match s.timestamp() {
                Some(t) => t >= start && t <= end,
                None => false,
            })
            .collect()
    }

    pub fn get_by_market(&self, market: Market) -> Vec<&Signal> {
        self.records
            .iter()
            .filter(|s| self.classifier.classify(&s.symbol) == market)
            .collect()
    }

    /// Merge lifecycle fields into an existing record. Unknown ids are a
    /// silent no-op and return `false`.
    pub fn update_status(
        &mut self,
        id: &str,
        status: SignalStatus,
        outcome: Option<Outcome>,
        pnl: Option<f64>,
    ) -> bool {
        let record = match self.records.iter_mut().find(|s| s.id == id) {
            Some(r) => r,
            None => {
                debug!("Status update for unknown signal {} ignored", id);
                return false;
            }
        };

        record.set_status(status);
        if outcome.is_some() {
            record.outcome = outcome;
        }
        if pnl.is_some() {
            record.pnl = pnl;
        }
        record.updated_at = Some(Utc::now());

        self.persist();
        true
    }

    /// Operator-only wipe of both slots. Never used on a normal path.
    pub fn clear_all_emergency(&mut self) -> Result<usize, StoreError> {
        let count = self.records.len();
        error!("EMERGENCY: clearing {} stored signals and the backup slot", count);
        self.storage.remove(&self.config.primary_key)?;
        self.storage.remove(&self.config.backup_key)?;
        self.records.clear();
        Ok(count)
    }
}

fn encode<T: Serialize>(key: &str, value: &T) -> Result<String, StorageError> {
    serde_json::to_string(value).map_err(|source| StorageError::Encode {
        key: key.to_string(),
        source,
    })
}
