use std::path::{Path, PathBuf};

use lendlog_crypto::CryptoError;

/// Errors from the catalog, account and collateral stores.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The JSON file exists but does not hold the expected map.
    #[error("corrupt JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("missing field: {0}")]
    MissingField(&'static str),

    #[error("invalid email: {0}")]
    InvalidEmail(String),

    #[error("account not found: {0}")]
    UnknownAccount(String),

    #[error("incorrect password")]
    WrongPassword,

    /// No encryption secret is configured, so collateral cannot be sealed.
    #[error("collateral sealing is not configured")]
    SealingDisabled,

    #[error("store lock poisoned")]
    LockPoisoned,
}

impl StoreError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
