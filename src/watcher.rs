//! Segment watcher: discovers completed segments and remuxes them.
//!
//! The watcher runs as a background task for the lifetime of one capture
//! session. The manifest is a single-writer (capture subprocess), append-only
//! file; the watcher is its single reader and re-reads it whole on every
//! pass, so no locking is needed. Entries that are listed but not yet flushed
//! to disk are tolerated and picked up on a later pass — that tolerance is a
//! contract, not an accident.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::remux::{RemuxStatus, Remuxer};

/// Counters reported when the watcher completes its drain pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatcherStats {
    pub remuxed: u32,
    pub failed: u32,
}

pub struct SegmentWatcher {
    manifest_path: PathBuf,
    remuxer: Remuxer,
    interval: Duration,
    processed: HashSet<PathBuf>,
    stats: WatcherStats,
}

impl SegmentWatcher {
    pub fn new(manifest_path: impl Into<PathBuf>, remuxer: Remuxer, interval: Duration) -> Self {
        Self {
            manifest_path: manifest_path.into(),
            remuxer,
            interval,
            processed: HashSet::new(),
            stats: WatcherStats::default(),
        }
    }

    /// Run until stopped, then perform exactly one terminal drain pass.
    pub async fn run(mut self, stop: CancellationToken) -> WatcherStats {
        loop {
            tokio::select! {
                _ = stop.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {
                    self.scan_once().await;
                }
            }
        }

        debug!("capture stopped, running drain pass");
        self.scan_once().await;
        info!(
            remuxed = self.stats.remuxed,
            failed = self.stats.failed,
            "segment watcher drained"
        );
        self.stats
    }

    /// One pass over the entire manifest.
    ///
    /// Never fails: a missing manifest is an empty pass, and a bad line or
    /// file check skips that entry only.
    pub async fn scan_once(&mut self) {
        let contents = match tokio::fs::read_to_string(&self.manifest_path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // No segment has closed yet.
                return;
            }
            Err(e) => {
                warn!(
                    manifest = %self.manifest_path.display(),
                    error = %e,
                    "failed to read segment manifest; retrying next pass"
                );
                return;
            }
        };

        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let path = PathBuf::from(line);
            if self.processed.contains(&path) {
                // Duplicate discovery of an already-handled segment is a no-op.
                continue;
            }

            match tokio::fs::try_exists(&path).await {
                Ok(true) => {}
                Ok(false) => {
                    debug!(path = %path.display(), "segment listed but not on disk yet");
                    continue;
                }
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "segment existence check failed");
                    continue;
                }
            }

            let Some(mut task) = self.remuxer.task_for(&path) else {
                warn!(path = %path.display(), "manifest entry without fragment marker, skipping");
                self.processed.insert(path);
                continue;
            };

            match self.remuxer.run(&mut task).await {
                Ok(()) => {
                    self.processed.insert(path);
                    match task.status {
                        RemuxStatus::Done => self.stats.remuxed += 1,
                        RemuxStatus::Failed => self.stats.failed += 1,
                        _ => {}
                    }
                }
                Err(e) => {
                    // The tool itself could not be run; leave the entry
                    // unprocessed so a later pass can pick it up.
                    error!(path = %path.display(), error = %e, "remux invocation failed");
                }
            }
        }
    }
}

/// Handle to a spawned watcher task.
pub struct WatcherHandle {
    stop: CancellationToken,
    task: JoinHandle<WatcherStats>,
}

impl WatcherHandle {
    /// Spawn a watcher bound to one session's manifest.
    pub fn spawn(
        manifest_path: impl Into<PathBuf>,
        remuxer: Remuxer,
        interval: Duration,
    ) -> Self {
        let stop = CancellationToken::new();
        let watcher = SegmentWatcher::new(manifest_path, remuxer, interval);
        let task = tokio::spawn(watcher.run(stop.clone()));
        Self { stop, task }
    }

    /// Stop the watcher, triggering the drain pass, and wait for completion.
    ///
    /// With a timeout (shutdown path) the wait is bounded: expiry is logged
    /// as an error and the call returns so the process can exit. The
    /// completed task is the drain acknowledgement.
    pub async fn stop_and_drain(self, timeout: Option<Duration>) -> Option<WatcherStats> {
        self.stop.cancel();

        let joined = match timeout {
            Some(limit) => match tokio::time::timeout(limit, self.task).await {
                Ok(joined) => joined,
                Err(_) => {
                    error!(
                        timeout_secs = limit.as_secs(),
                        "timed out waiting for segment watcher drain; exiting anyway"
                    );
                    return None;
                }
            },
            None => self.task.await,
        };

        match joined {
            Ok(stats) => Some(stats),
            Err(e) => {
                // A watcher panic loses the remaining drain work but must not
                // take the process down.
                error!(error = %e, "segment watcher task failed");
                None
            }
        }
    }
}
