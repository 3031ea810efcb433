//! Destination planning and collection resolution.
//!
//! Both run entirely before any download starts: the planner turns the raw
//! destination argument into a target directory plus optional fixed
//! filename, and the resolver expands a root item into the final list of
//! download tasks.

use std::path::{Path, PathBuf};

use crate::api::MediaServer;
use crate::error::{Error, Result};
use crate::fs::FileSystem;
use crate::model::{DownloadTask, MediaItem};
use crate::sanitize::{sanitize_dir_name, sanitize_file_name};

/// A resolved destination: target directory plus optional fixed filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    /// Directory every file lands in. Exists once planning returns.
    pub dir: PathBuf,
    /// Fixed filename from the destination argument, when it named a file.
    pub file_name: Option<String>,
}

fn parent_dir(path: &Path) -> PathBuf {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(
            || PathBuf::from("."),
            |p| PathBuf::from(sanitize_dir_name(&p.to_string_lossy())),
        )
}

fn file_base(path: &Path) -> Option<String> {
    path.file_name()
        .map(|f| sanitize_file_name(&f.to_string_lossy()))
}

/// Interprets the destination argument.
///
/// In order: an existing file requires `force` (and is then overwritten in
/// place); an existing directory becomes the target directory; a path with
/// an extension is split into parent directory and fixed filename; anything
/// else is treated as a directory to create. The target directory is
/// created before returning. Purely local, no network.
///
/// # Errors
///
/// Returns [`Error::DestinationExists`] for an existing file without
/// `force` (before any directory is created), or an I/O error from
/// directory creation.
pub async fn resolve_destination<F: FileSystem>(
    fs: &F,
    raw: &str,
    force: bool,
) -> Result<Destination> {
    let path = Path::new(raw);
    let dest = if fs.is_file(path).await {
        if !force {
            return Err(Error::DestinationExists {
                path: raw.to_string(),
            });
        }
        Destination {
            dir: parent_dir(path),
            file_name: file_base(path),
        }
    } else if fs.is_dir(path).await {
        Destination {
            dir: PathBuf::from(sanitize_dir_name(raw)),
            file_name: None,
        }
    } else if path.extension().is_some() {
        Destination {
            dir: parent_dir(path),
            file_name: file_base(path),
        }
    } else {
        Destination {
            dir: PathBuf::from(sanitize_dir_name(raw)),
            file_name: None,
        }
    };
    fs.create_dir_all(&dest.dir).await?;
    Ok(dest)
}

/// Expands a root item into the list of download tasks.
///
/// A plain item yields exactly one task, named by the fixed filename when
/// the destination provided one. A collection gets a subdirectory named
/// after the root and one task per direct child that has a retrievable
/// media source; children without one are logged and skipped. The whole
/// list is built before any download begins, and a listing failure aborts
/// the operation.
///
/// # Errors
///
/// Returns [`Error::NoMediaSource`] for a plain item with nothing to
/// download, or any error from listing children or creating the
/// collection subdirectory.
pub async fn resolve_tasks<F: FileSystem>(
    server: &dyn MediaServer,
    fs: &F,
    root: &MediaItem,
    dest: &Destination,
) -> Result<Vec<DownloadTask>> {
    if !root.is_collection() {
        if !root.has_media_source() {
            return Err(Error::NoMediaSource {
                name: root.name.clone(),
            });
        }
        let name = dest
            .file_name
            .clone()
            .unwrap_or_else(|| root.default_file_name());
        return Ok(vec![DownloadTask {
            item: root.clone(),
            dest: dest.dir.join(name),
        }]);
    }

    let dir = dest.dir.join(sanitize_file_name(&root.name));
    fs.create_dir_all(&dir).await?;

    let children = server.children(&root.id, false).await?;
    let mut tasks = Vec::new();
    for child in children {
        // The listing can echo the root's own media back; only children count.
        if child.id == root.id {
            continue;
        }
        if !child.has_media_source() {
            log::warn!("no media sources available for {}, skipping", child.name);
            continue;
        }
        // Per-child names always come from the child itself; a fixed
        // filename from the destination argument only applies to a
        // single-item download.
        let name = child.default_file_name();
        tasks.push(DownloadTask {
            dest: dir.join(name),
            item: child,
        });
    }
    Ok(tasks)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tempfile::TempDir;

    use crate::api::ByteStream;
    use crate::fs::TokioFileSystem;
    use crate::model::MediaSource;

    // =========================================================================
    // Destination planner
    // =========================================================================

    #[tokio::test]
    async fn existing_directory_becomes_target() {
        let dir = TempDir::new().unwrap();
        let raw = dir.path().to_string_lossy().to_string();

        let dest = resolve_destination(&TokioFileSystem, &raw, false)
            .await
            .unwrap();
        assert_eq!(dest.dir, PathBuf::from(&raw));
        assert_eq!(dest.file_name, None);

        // Idempotent: planning again yields the same result.
        let again = resolve_destination(&TokioFileSystem, &raw, false)
            .await
            .unwrap();
        assert_eq!(again, dest);
    }

    #[tokio::test]
    async fn path_with_extension_splits_dir_and_name() {
        let dir = TempDir::new().unwrap();
        let raw = dir.path().join("sub").join("out.mkv");

        let dest = resolve_destination(&TokioFileSystem, &raw.to_string_lossy(), false)
            .await
            .unwrap();
        assert_eq!(dest.dir, dir.path().join("sub"));
        assert_eq!(dest.file_name.as_deref(), Some("out.mkv"));
        assert!(dest.dir.is_dir());
    }

    #[tokio::test]
    async fn bare_name_becomes_new_directory() {
        let dir = TempDir::new().unwrap();
        let raw = dir.path().join("downloads");

        let dest = resolve_destination(&TokioFileSystem, &raw.to_string_lossy(), false)
            .await
            .unwrap();
        assert_eq!(dest.dir, raw);
        assert_eq!(dest.file_name, None);
        assert!(raw.is_dir());
    }

    #[tokio::test]
    async fn existing_file_with_force_is_overwritable() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("out.mkv");
        std::fs::write(&file, b"old").unwrap();

        let dest = resolve_destination(&TokioFileSystem, &file.to_string_lossy(), true)
            .await
            .unwrap();
        assert_eq!(dest.dir, dir.path());
        assert_eq!(dest.file_name.as_deref(), Some("out.mkv"));
    }

    /// File system that records directory creation, for asserting the
    /// conflict path has no side effects.
    #[derive(Default)]
    struct RecordingFileSystem {
        files: HashSet<PathBuf>,
        created: Mutex<Vec<PathBuf>>,
    }

    #[async_trait]
    impl FileSystem for RecordingFileSystem {
        async fn is_file(&self, path: &Path) -> bool {
            self.files.contains(path)
        }

        async fn is_dir(&self, _path: &Path) -> bool {
            false
        }

        async fn create_dir_all(&self, path: &Path) -> std::io::Result<()> {
            self.created.lock().unwrap().push(path.to_path_buf());
            Ok(())
        }

        async fn create_file(&self, _path: &Path) -> std::io::Result<tokio::fs::File> {
            Err(std::io::Error::other("not used"))
        }
    }

    #[tokio::test]
    async fn existing_file_without_force_fails_with_no_side_effects() {
        let mut fs = RecordingFileSystem::default();
        fs.files.insert(PathBuf::from("/tmp/out.mkv"));

        let err = resolve_destination(&fs, "/tmp/out.mkv", false)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DestinationExists { .. }));
        assert!(fs.created.lock().unwrap().is_empty());
    }

    // =========================================================================
    // Collection resolver
    // =========================================================================

    fn media_item(id: &str, name: &str, path: Option<&str>, sourced: bool) -> MediaItem {
        MediaItem {
            id: id.to_string(),
            name: name.to_string(),
            kind: None,
            path: path.map(str::to_string),
            child_count: None,
            parent_id: None,
            collection_type: None,
            media_sources: if sourced {
                vec![MediaSource {
                    size: Some(1000),
                    path: path.map(str::to_string),
                }]
            } else {
                Vec::new()
            },
        }
    }

    struct StubServer {
        children: HashMap<String, Vec<MediaItem>>,
    }

    #[async_trait]
    impl MediaServer for StubServer {
        async fn item(&self, _id: &str) -> Result<Option<MediaItem>> {
            unimplemented!("not used by the resolver")
        }

        async fn children(&self, parent_id: &str, _recursive: bool) -> Result<Vec<MediaItem>> {
            Ok(self.children.get(parent_id).cloned().unwrap_or_default())
        }

        async fn open_stream(&self, _id: &str) -> Result<ByteStream> {
            unimplemented!("not used by the resolver")
        }
    }

    #[tokio::test]
    async fn single_item_uses_fixed_filename() {
        let dir = TempDir::new().unwrap();
        let dest = Destination {
            dir: dir.path().to_path_buf(),
            file_name: Some("renamed.mkv".to_string()),
        };
        let root = media_item("m1", "The Thing", Some("/media/movie.mkv"), true);
        let server = StubServer {
            children: HashMap::new(),
        };

        let tasks = resolve_tasks(&server, &TokioFileSystem, &root, &dest)
            .await
            .unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].dest, dir.path().join("renamed.mkv"));
    }

    #[tokio::test]
    async fn single_item_derives_name_from_source_path() {
        let dir = TempDir::new().unwrap();
        let dest = Destination {
            dir: dir.path().to_path_buf(),
            file_name: None,
        };
        let root = media_item("m1", "The Thing", Some("/media/movie.mkv"), true);
        let server = StubServer {
            children: HashMap::new(),
        };

        let tasks = resolve_tasks(&server, &TokioFileSystem, &root, &dest)
            .await
            .unwrap();
        assert_eq!(tasks[0].dest, dir.path().join("movie.mkv"));
    }

    #[tokio::test]
    async fn single_item_without_source_is_an_error() {
        let dir = TempDir::new().unwrap();
        let dest = Destination {
            dir: dir.path().to_path_buf(),
            file_name: None,
        };
        let root = media_item("m1", "Phantom", None, false);
        let server = StubServer {
            children: HashMap::new(),
        };

        let err = resolve_tasks(&server, &TokioFileSystem, &root, &dest)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NoMediaSource { .. }));
    }

    #[tokio::test]
    async fn collection_skips_unsourced_children() {
        let dir = TempDir::new().unwrap();
        let dest = Destination {
            dir: dir.path().to_path_buf(),
            file_name: Some("ignored.mkv".to_string()),
        };
        let mut root = media_item("c1", "Season: 1", None, false);
        root.child_count = Some(3);

        let mut children = HashMap::new();
        children.insert(
            "c1".to_string(),
            vec![
                media_item("e1", "Ep 1", Some("/tv/s01e01.mkv"), true),
                media_item("e2", "Ep 2", None, false),
                media_item("e3", "Ep 3", Some("/tv/s01e03.mkv"), true),
            ],
        );
        let server = StubServer { children };

        let tasks = resolve_tasks(&server, &TokioFileSystem, &root, &dest)
            .await
            .unwrap();
        let subdir = dir.path().join("Season_ 1");
        assert!(subdir.is_dir());
        assert_eq!(tasks.len(), 2);
        // Per-child names override the fixed filename.
        assert_eq!(tasks[0].dest, subdir.join("s01e01.mkv"));
        assert_eq!(tasks[1].dest, subdir.join("s01e03.mkv"));
    }

    #[tokio::test]
    async fn collection_filters_out_the_root_itself() {
        let dir = TempDir::new().unwrap();
        let dest = Destination {
            dir: dir.path().to_path_buf(),
            file_name: None,
        };
        let mut root = media_item("c1", "Album", Some("/music/album"), true);
        root.child_count = Some(1);

        let mut children = HashMap::new();
        children.insert(
            "c1".to_string(),
            vec![
                media_item("c1", "Album", Some("/music/album"), true),
                media_item("t1", "Track 1", Some("/music/album/01.flac"), true),
            ],
        );
        let server = StubServer { children };

        let tasks = resolve_tasks(&server, &TokioFileSystem, &root, &dest)
            .await
            .unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].item.id, "t1");
    }
}
