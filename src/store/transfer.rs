use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{info, warn};

use crate::error::StoreError;
use crate::models::{Signal, SignalSource};
use crate::store::SignalStore;

/// Result of a bulk import. Partial success is normal: bad records are
/// listed in `errors` and the rest still land.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportReport {
    pub success: bool,
    pub imported: usize,
    /// Already present ids.
    pub skipped: usize,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupInfo {
    pub timestamp: DateTime<Utc>,
    pub count: usize,
}

impl SignalStore {
    /// Pretty-printed JSON array of every record, newest first.
    pub fn export(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self.get_all())
    }

    pub fn import(&mut self, json_text: &str) -> ImportReport {
        let values: Vec<serde_json::Value> = match serde_json::from_str::<serde_json::Value>(json_text) {
            Ok(serde_json::Value::Array(v)) => v,
            Ok(_) => {
                return ImportReport {
                    errors: vec!["Import data must be a JSON array".to_string()],
                    ..ImportReport::default()
                }
            }
            Err(e) => {
                return ImportReport {
                    errors: vec![format!("Invalid JSON: {}", e)],
                    ..ImportReport::default()
                }
            }
        };

        let mut report = ImportReport {
            success: true,
            ..ImportReport::default()
        };
        let mut batch_ids = HashSet::new();
        let mut accepted = Vec::new();

        for (i, value) in values.into_iter().enumerate() {
            let id = value
                .get("id")
                .and_then(|v| v.as_str())
                .filter(|s| !s.is_empty())
                .map(|s| s.to_string());
            let id = match id {
                Some(id) => id,
                None => {
                    report.errors.push(format!("Signal at index {} missing ID", i));
                    continue;
                }
            };

            if self.contains(&id) || !batch_ids.insert(id) {
                report.skipped += 1;
                continue;
            }

            match serde_json::from_value::<Signal>(value) {
                Ok(sig) => accepted.push(sig),
                Err(e) => report
                    .errors
                    .push(format!("Signal at index {} invalid: {}", i, e)),
            }
        }

        // Oldest first so the store ends up in the same order as the input.
        let landed = self.apply_batch(accepted.into_iter().rev());
        report.imported = landed;

        info!(
            "Import finished: {} imported, {} skipped, {} errors",
            report.imported,
            report.skipped,
            report.errors.len()
        );
        report
    }

    /// Re-import every backed-up record that is not already present.
    pub fn restore_from_backup(&mut self) -> Result<usize, StoreError> {
        let snapshot = self.read_backup()?;
        let missing: Vec<Signal> = snapshot
            .signals
            .into_iter()
            .rev()
            .filter(|sig| !sig.id.is_empty() && !self.contains(&sig.id))
            .collect();
        let restored = self.apply_batch(missing.into_iter());
        info!(
            "Restored {} signals from backup taken {}",
            restored, snapshot.timestamp
        );
        Ok(restored)
    }

    /// Upsert every record, persist once, and count the ones still held
    /// after retention has run.
    fn apply_batch(&mut self, signals: impl Iterator<Item = Signal>) -> usize {
        let mut changed = Vec::new();
        for sig in signals {
            let id = sig.id.clone();
            let source = sig.source.unwrap_or(SignalSource::Api);
            if self.upsert_in_memory(sig, source).changed() {
                changed.push(id);
            }
        }
        if changed.is_empty() {
            return 0;
        }
        self.persist();
        changed.iter().filter(|id| self.contains(id)).count()
    }

    pub fn backup_info(&self) -> Option<BackupInfo> {
        match self.read_backup() {
            Ok(b) => Some(BackupInfo {
                timestamp: b.timestamp,
                count: b.count,
            }),
            Err(StoreError::NoBackup) => None,
            Err(e) => {
                warn!("Backup slot unreadable: {}", e);
                None
            }
        }
    }
}
