//! The throttled, progress-tracked download scheduler.

use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::Semaphore;
use tokio_util::io::StreamReader;

use crate::api::MediaServer;
use crate::error::{Error, Result};
use crate::fs::{FileSystem, TokioFileSystem};
use crate::model::DownloadTask;
use crate::progress::{ProgressHandle, ProgressTracker};

/// Copy granularity between the source stream and the destination file.
const CHUNK_SIZE: usize = 128 * 1024;

/// Runs a batch of download tasks under a fixed concurrency cap.
///
/// Every task gets its own tokio task and its own progress entry; at most
/// `concurrency` of them are transferring bytes at any instant. A failing
/// task does not cancel its siblings; the first failure is surfaced only
/// after the whole batch has settled.
pub struct Downloader<F: FileSystem = TokioFileSystem> {
    server: Arc<dyn MediaServer>,
    tracker: Arc<ProgressTracker>,
    fs: Arc<F>,
    concurrency: usize,
}

impl Downloader<TokioFileSystem> {
    /// Creates a downloader with the default file system.
    #[must_use]
    pub fn new(
        server: Arc<dyn MediaServer>,
        tracker: Arc<ProgressTracker>,
        concurrency: usize,
    ) -> Self {
        Self::with_fs(server, tracker, concurrency, TokioFileSystem)
    }
}

impl<F: FileSystem + 'static> Downloader<F> {
    /// Creates a downloader with a custom file system implementation.
    #[must_use]
    pub fn with_fs(
        server: Arc<dyn MediaServer>,
        tracker: Arc<ProgressTracker>,
        concurrency: usize,
        fs: F,
    ) -> Self {
        Self {
            server,
            tracker,
            fs: Arc::new(fs),
            concurrency: concurrency.max(1),
        }
    }

    /// Downloads every task in the batch and waits for all of them to settle.
    ///
    /// # Errors
    ///
    /// Returns the first per-task error when exactly one task failed, or
    /// [`Error::DownloadsFailed`] when several did. Sibling tasks always run
    /// to completion either way.
    pub async fn download_all(&self, tasks: Vec<DownloadTask>) -> Result<()> {
        let gate = Arc::new(Semaphore::new(self.concurrency));
        let mut handles = Vec::with_capacity(tasks.len());

        for task in tasks {
            let entry = self
                .tracker
                .register(format!("waiting: {}", task.item.name));
            let server = Arc::clone(&self.server);
            let fs = Arc::clone(&self.fs);
            let gate = Arc::clone(&gate);
            handles.push(tokio::spawn(async move {
                let name = task.item.name.clone();
                let result = transfer(&*server, &*fs, &gate, &entry, &task).await;
                if let Err(e) = &result {
                    entry.fail(&format!("{name}: {e}"));
                    log::error!("download failed for {name}: {e}");
                }
                result
            }));
        }

        let mut first_error = None;
        let mut failed = 0usize;
        for handle in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => Err(Error::Transfer {
                    name: "download task".to_string(),
                    reason: e.to_string(),
                }),
            };
            if let Err(e) = result {
                failed += 1;
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }

        match (failed, first_error) {
            (0, _) => Ok(()),
            (1, Some(e)) => Err(e),
            (failed, _) => Err(Error::DownloadsFailed { failed }),
        }
    }
}

/// Moves one item's bytes to disk.
///
/// The semaphore permit is held from just before the stream is opened until
/// this function returns, on every path; dropping it re-admits a queued
/// sibling even when the transfer fails mid-copy.
async fn transfer<F: FileSystem>(
    server: &dyn MediaServer,
    fs: &F,
    gate: &Semaphore,
    entry: &ProgressHandle,
    task: &DownloadTask,
) -> Result<()> {
    let name = &task.item.name;
    let _permit = gate.acquire().await.map_err(|e| Error::Transfer {
        name: name.clone(),
        reason: e.to_string(),
    })?;

    entry.set_description(format!("starting: {name}"));
    let stream = server.open_stream(&task.item.id).await?;
    entry.start(task.item.media_size().or(stream.len));

    let mut file = fs.create_file(&task.dest).await?;
    let mut reader = StreamReader::new(stream.inner);
    let mut buf = vec![0u8; CHUNK_SIZE];

    entry.set_description(format!("downloading: {name}"));
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        file.write_all(&buf[..n]).await?;
        // Update after the write so `completed` only counts bytes the file
        // handle has accepted.
        entry.inc(n as u64);
    }
    file.flush().await?;

    entry.set_description(format!("completed: {name}"));
    entry.finish();
    Ok(())
}
