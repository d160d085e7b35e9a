pub mod fingerprint;
pub mod market;
pub mod merge;
pub mod retention;
pub mod signal_store;
pub mod stats;
pub mod transfer;

pub use market::{Market, MarketClassifier, TickerListClassifier};
pub use merge::{ConflictPolicy, UpsertOutcome};
pub use retention::RetentionPolicy;
pub use signal_store::{
    BackupSnapshot, Page, SharedStore, SignalStore, StoreConfig, BACKUP_KEY, PRIMARY_KEY,
};
pub use stats::SignalStats;
pub use transfer::{BackupInfo, ImportReport};
