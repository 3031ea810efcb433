//! Wire types for server items and the tasks built from them.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::sanitize::sanitize_file_name;

/// One downloadable source attached to an item.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MediaSource {
    /// Declared size in bytes, if the server knows it.
    #[serde(default)]
    pub size: Option<u64>,
    /// Server-side path of the source file.
    #[serde(default)]
    pub path: Option<String>,
}

/// A media-server entity: movie, episode, collection, library view, etc.
///
/// Fetched read-only from the server and never mutated locally. Field names
/// follow the server's PascalCase JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MediaItem {
    /// Opaque server-side identifier.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Item kind as reported by the server ("Movie", "Series", ...).
    #[serde(rename = "Type", default)]
    pub kind: Option<String>,
    /// Server-side path; only used to derive a default filename.
    #[serde(default)]
    pub path: Option<String>,
    /// Number of child items. Present and non-zero marks a collection.
    #[serde(default)]
    pub child_count: Option<u32>,
    /// Id of the parent item, when listed with the ParentId field.
    #[serde(default)]
    pub parent_id: Option<String>,
    /// Library grouping kind for user views ("movies", "tvshows", ...).
    #[serde(default)]
    pub collection_type: Option<String>,
    /// Downloadable sources, when listed with the MediaSources field.
    #[serde(default)]
    pub media_sources: Vec<MediaSource>,
}

impl MediaItem {
    /// Returns true if this item has one or more children.
    #[must_use]
    pub fn is_collection(&self) -> bool {
        self.child_count.unwrap_or(0) > 0
    }

    /// Returns true if the item has at least one downloadable source.
    #[must_use]
    pub fn has_media_source(&self) -> bool {
        !self.media_sources.is_empty()
    }

    /// Declared byte length of the first media source.
    ///
    /// Zero and absent both mean "unknown" and yield `None`.
    #[must_use]
    pub fn media_size(&self) -> Option<u64> {
        self.media_sources
            .first()
            .and_then(|s| s.size)
            .filter(|&s| s > 0)
    }

    /// Default filesystem-safe filename for this item.
    ///
    /// The basename of the server-side path when present, the sanitized
    /// display name otherwise.
    #[must_use]
    pub fn default_file_name(&self) -> String {
        self.path
            .as_deref()
            .and_then(|p| Path::new(p).file_name())
            .map_or_else(
                || sanitize_file_name(&self.name),
                |base| sanitize_file_name(&base.to_string_lossy()),
            )
    }
}

/// A page of items, as returned by the listing endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ItemPage {
    /// The items on this page.
    #[serde(default)]
    pub items: Vec<MediaItem>,
    /// Total matching records on the server.
    #[serde(default)]
    pub total_record_count: Option<u64>,
}

/// Binds one item to one destination file path.
///
/// Owned by the scheduler for its lifetime: created before scheduling,
/// discarded after completion or failure.
#[derive(Debug, Clone)]
pub struct DownloadTask {
    /// The item whose media will be fetched.
    pub item: MediaItem,
    /// Local path the bytes will be written to.
    pub dest: PathBuf,
}
