//! jelly-dl - a command-line client for Jellyfin-compatible media servers.
//!
//! The library half carries everything the `jelly` binary needs: the HTTP
//! client, destination planning, and the concurrent, throttled,
//! progress-tracked download engine.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use jelly_dl::{
//!     Downloader, JellyfinClient, MediaServer, ProgressTracker, ServerConfig,
//! };
//!
//! # async fn example() -> jelly_dl::Result<()> {
//! let config = ServerConfig::load(&ServerConfig::default_path())?;
//! let client = JellyfinClient::new(jelly_dl::api::build_http_client()?, config);
//! client.connect().await?;
//! client.authenticate().await?;
//!
//! let client: Arc<dyn MediaServer> = Arc::new(client);
//! let tracker = Arc::new(ProgressTracker::new());
//! let downloader = Downloader::new(client, Arc::clone(&tracker), 4);
//! downloader.download_all(vec![]).await?;
//! # Ok(())
//! # }
//! ```

#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod api;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod download;
pub mod error;
pub mod format;
pub mod fs;
pub mod model;
pub mod plan;
pub mod progress;
pub mod sanitize;

// Re-export main types for convenience
pub use api::{ByteStream, JellyfinClient, MediaServer, ServerInfo};
pub use config::{DownloadOptions, ServerConfig};
pub use download::Downloader;
pub use error::{Error, Result};
pub use fs::{FileSystem, TokioFileSystem};
pub use model::{DownloadTask, ItemPage, MediaItem, MediaSource};
pub use plan::{resolve_destination, resolve_tasks, Destination};
pub use progress::{EntryView, ProgressHandle, ProgressTracker};
