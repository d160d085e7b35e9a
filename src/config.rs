use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::store::signal_store::DEFAULT_BACKUP_SIZE;
use crate::store::{ConflictPolicy, RetentionPolicy, StoreConfig};
use crate::transport::RealtimeConfig;

pub type SharedConfig = Arc<RwLock<Config>>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Endpoints
    pub ws_url: String,
    pub api_url: String,
    pub auth_token: String,

    // Local store
    pub data_dir: String,
    /// 0 keeps everything.
    pub retention_max: usize,
    pub backup_size: usize,
    pub conflict_policy: ConflictPolicy,
    pub storage_quota_bytes: Option<usize>,

    // Transport
    pub ws_connect_timeout_secs: u64,
    pub ws_reconnect_base_ms: u64,
    pub ws_reconnect_max_ms: u64,
    pub ws_reconnect_attempts: u32,

    // Relay
    pub poll_interval_secs: u64,
    pub status_interval_secs: u64,

    // Logging
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let env = |key: &str, default: &str| -> String {
            std::env::var(key).unwrap_or_else(|_| default.to_string())
        };

        Config {
            ws_url: env("SIGNAL_WS_URL", "ws://localhost:8080/ws/signals"),
            api_url: env("SIGNAL_API_URL", "http://localhost:8080"),
            auth_token: env("SIGNAL_AUTH_TOKEN", ""),
            data_dir: env("SIGNAL_DATA_DIR", "data"),
            retention_max: env("SIGNAL_RETENTION_MAX", "1000").parse().unwrap_or(1000),
            backup_size: env("SIGNAL_BACKUP_SIZE", "100")
                .parse()
                .unwrap_or(DEFAULT_BACKUP_SIZE),
            conflict_policy: ConflictPolicy::from_str_loose(&env(
                "SIGNAL_CONFLICT_POLICY",
                "newer_wins",
            ))
            .unwrap_or_default(),
            storage_quota_bytes: env("STORAGE_QUOTA_BYTES", "")
                .parse::<usize>()
                .ok()
                .filter(|b| *b > 0),
            ws_connect_timeout_secs: env("WS_CONNECT_TIMEOUT_SECS", "20").parse().unwrap_or(20),
            ws_reconnect_base_ms: env("WS_RECONNECT_BASE_MS", "1000").parse().unwrap_or(1000),
            ws_reconnect_max_ms: env("WS_RECONNECT_MAX_MS", "30000").parse().unwrap_or(30000),
            ws_reconnect_attempts: env("WS_RECONNECT_ATTEMPTS", "10").parse().unwrap_or(10),
            poll_interval_secs: env("POLL_INTERVAL_SECS", "30").parse().unwrap_or(30),
            status_interval_secs: env("STATUS_INTERVAL_SECS", "300").parse().unwrap_or(300),
            log_level: env("LOG_LEVEL", "INFO"),
        }
    }

    pub fn shared(self) -> SharedConfig {
        Arc::new(RwLock::new(self))
    }

    pub fn auth_token(&self) -> Option<String> {
        let token = self.auth_token.trim();
        if token.is_empty() {
            None
        } else {
            Some(token.to_string())
        }
    }

    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            retention: RetentionPolicy::from_max(self.retention_max),
            backup_size: self.backup_size,
            conflict_policy: self.conflict_policy,
            ..StoreConfig::default()
        }
    }

    pub fn realtime_config(&self) -> RealtimeConfig {
        RealtimeConfig {
            url: self.ws_url.clone(),
            connect_timeout: Duration::from_secs(self.ws_connect_timeout_secs),
            reconnect_base: Duration::from_millis(self.ws_reconnect_base_ms),
            reconnect_max_delay: Duration::from_millis(self.ws_reconnect_max_ms),
            max_reconnect_attempts: self.ws_reconnect_attempts,
            ..RealtimeConfig::default()
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn status_interval(&self) -> Duration {
        Duration::from_secs(self.status_interval_secs.max(1))
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            ws_url: "ws://localhost:8080/ws/signals".to_string(),
            api_url: "http://localhost:8080".to_string(),
            auth_token: String::new(),
            data_dir: "data".to_string(),
            retention_max: 1000,
            backup_size: DEFAULT_BACKUP_SIZE,
            conflict_policy: ConflictPolicy::default(),
            storage_quota_bytes: None,
            ws_connect_timeout_secs: 20,
            ws_reconnect_base_ms: 1000,
            ws_reconnect_max_ms: 30000,
            ws_reconnect_attempts: 10,
            poll_interval_secs: 30,
            status_interval_secs: 300,
            log_level: "INFO".to_string(),
        }
    }
}
