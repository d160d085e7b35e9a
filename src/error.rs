use thiserror::Error;

/// Failures of the keyed local medium.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("storage quota exceeded writing '{key}' ({bytes} bytes)")]
    QuotaExceeded { key: String, bytes: usize },
    #[error("storage io error on '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode '{key}': {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("no backup found")]
    NoBackup,
    #[error("backup slot is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("no auth token available")]
    MissingToken,
    #[error("connection attempt timed out after {0:?}")]
    ConnectTimeout(std::time::Duration),
    #[error("connect error: {0}")]
    Connect(String),
    #[error("not connected")]
    NotConnected,
    #[error("failed to encode frame: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("signal with fingerprint {0} was already submitted")]
    DuplicateSubmission(String),
    #[error("api returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}
