use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the tracker library.
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Settings(#[from] ::config::ConfigError),

    #[error("unknown timezone {0:?}")]
    Timezone(String),

    /// Credentials rejected or missing. Fatal, never retried.
    #[error("authorization failed: {0}")]
    Auth(String),

    /// Transient availability problem; the scheduler retries on its next tick.
    #[error("network error: {0}")]
    Network(String),

    #[error("unexpected API response: {0}")]
    Api(String),

    #[error("ledger error: {0}")]
    Ledger(#[from] rusqlite::Error),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed history file {}: {source}", path.display())]
    HistoryFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("publish failed: {0}")]
    Publish(String),
}

impl TrackerError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, TrackerError>;
