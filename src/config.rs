//! Configuration: cached server credentials and download options.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Cached server address and credentials.
///
/// Loaded once at startup and passed explicitly into the client; persisted
/// as a JSON record in the per-user config directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Base URL of the media server.
    pub address: Option<String>,
    /// Username to authenticate as.
    pub username: Option<String>,
    /// Password for the user.
    pub password: Option<String>,
}

impl ServerConfig {
    /// Default location of the credential cache file.
    #[must_use]
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("jelly-dl")
            .join("credentials.json")
    }

    /// Loads the cached credentials, or an empty record if the file does
    /// not exist yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Writes the credentials back to the cache file, creating its
    /// directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Deletes the credential cache file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be removed.
    pub fn clear(path: &Path) -> Result<()> {
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }

    /// True once every field has a value.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.address.is_some() && self.username.is_some() && self.password.is_some()
    }
}

/// Options for one download invocation.
#[derive(Debug, Clone)]
pub struct DownloadOptions {
    /// Maximum concurrent transfers.
    pub concurrency: usize,
    /// Whether an existing destination file may be overwritten.
    pub force: bool,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            force: false,
        }
    }
}

/// Default transfer concurrency: half the available processing units,
/// never less than one.
#[must_use]
pub fn default_concurrency() -> usize {
    std::thread::available_parallelism().map_or(1, |n| (n.get() / 2).max(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn round_trips_through_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sub").join("credentials.json");

        let config = ServerConfig {
            address: Some("http://media.local:8096".to_string()),
            username: Some("alice".to_string()),
            password: Some("hunter2".to_string()),
        };
        config.save(&path).unwrap();

        let loaded = ServerConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
        assert!(loaded.is_complete());
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        let loaded = ServerConfig::load(&dir.path().join("none.json")).unwrap();
        assert_eq!(loaded, ServerConfig::default());
        assert!(!loaded.is_complete());
    }

    #[test]
    fn clear_removes_the_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("credentials.json");
        ServerConfig::default().save(&path).unwrap();
        assert!(path.exists());

        ServerConfig::clear(&path).unwrap();
        assert!(!path.exists());
        // Clearing again is fine.
        ServerConfig::clear(&path).unwrap();
    }

    #[test]
    fn default_concurrency_is_at_least_one() {
        assert!(default_concurrency() >= 1);
        assert_eq!(DownloadOptions::default().concurrency, default_concurrency());
        assert!(!DownloadOptions::default().force);
    }
}
