//! Error types for the jelly-dl library.

use thiserror::Error;

/// Errors that can occur while talking to the server or downloading.
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed JSON from the server or the credential cache.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The requested item does not exist on the server.
    #[error("item not found: {id}")]
    ItemNotFound {
        /// The id that was looked up.
        id: String,
    },

    /// Destination file already exists and `--force` was not given.
    #[error("destination file already exists: {path}")]
    DestinationExists {
        /// Path to the existing file.
        path: String,
    },

    /// An item has no downloadable media source.
    #[error("no media sources available for {name}")]
    NoMediaSource {
        /// Display name of the item.
        name: String,
    },

    /// A single transfer failed while streaming bytes.
    #[error("transfer failed for {name}: {reason}")]
    Transfer {
        /// Display name of the item being transferred.
        name: String,
        /// Human-readable failure reason.
        reason: String,
    },

    /// Server validation failed before authentication.
    #[error("error connecting to server: {0}")]
    Connect(String),

    /// Authentication was rejected by the server.
    #[error("error authenticating: {0}")]
    Auth(String),

    /// One or more downloads in a batch failed.
    #[error("{failed} download(s) failed")]
    DownloadsFailed {
        /// Number of tasks that did not complete.
        failed: usize,
    },
}

impl Error {
    /// Maps an error to the process exit code the CLI contract promises.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::ItemNotFound { .. } => 404,
            Self::Connect(_) | Self::Auth(_) => 2,
            _ => 1,
        }
    }
}

/// A specialized `Result` type for jelly-dl operations.
pub type Result<T> = std::result::Result<T, Error>;
