//! Copy-only repackaging of fragmented segment files.
//!
//! A completed capture segment is fragmented MP4 carrying the `.frag` marker
//! in its name. Remuxing rewrites it into a plain MP4 (no re-encoding) at the
//! same path with the marker removed.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;
use tracing::{error, info, warn};

use crate::Result;
use crate::utils::fs;

/// Marker carried by fragmented-but-not-yet-remuxed files.
pub const FRAGMENT_MARKER: &str = ".frag";

/// Lifecycle of one remux invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemuxStatus {
    Pending,
    Running,
    Done,
    Failed,
}

/// One unit of repackaging work, created by the segment watcher.
#[derive(Debug, Clone)]
pub struct RemuxTask {
    pub source: PathBuf,
    pub dest: PathBuf,
    pub status: RemuxStatus,
}

/// Derive the final path by removing the fragment marker from the name.
///
/// Returns `None` for paths without the marker; remuxing those in place would
/// overwrite the source.
pub fn final_path_for(source: &Path) -> Option<PathBuf> {
    let name = source.file_name()?.to_str()?;
    if !name.contains(FRAGMENT_MARKER) {
        return None;
    }
    Some(source.with_file_name(name.replacen(FRAGMENT_MARKER, "", 1)))
}

/// Runs copy-only ffmpeg repackaging invocations, one at a time.
pub struct Remuxer {
    ffmpeg_path: String,
    remove_source: bool,
    diagnostic_log: Option<PathBuf>,
}

impl Remuxer {
    pub fn new(ffmpeg_path: impl Into<String>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            remove_source: false,
            diagnostic_log: None,
        }
    }

    /// Delete the fragmented source after a successful remux.
    pub fn with_remove_source(mut self, remove: bool) -> Self {
        self.remove_source = remove;
        self
    }

    /// Append each invocation's stderr to a delimited diagnostic log.
    pub fn with_diagnostic_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.diagnostic_log = Some(path.into());
        self
    }

    /// Build a task for a discovered segment, or `None` if the path carries
    /// no fragment marker.
    pub fn task_for(&self, source: &Path) -> Option<RemuxTask> {
        let dest = final_path_for(source)?;
        Some(RemuxTask {
            source: source.to_path_buf(),
            dest,
            status: RemuxStatus::Pending,
        })
    }

    fn build_args(source: &Path, dest: &Path) -> Vec<String> {
        vec![
            "-y".to_string(),
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
            "-i".to_string(),
            source.to_string_lossy().to_string(),
            "-c:v".to_string(),
            "copy".to_string(),
            "-c:a".to_string(),
            "copy".to_string(),
            "-movflags".to_string(),
            "+faststart".to_string(),
            dest.to_string_lossy().to_string(),
        ]
    }

    /// Run one task to completion.
    ///
    /// A nonzero ffmpeg exit marks the task `Failed` and retains the source
    /// for manual recovery; it is not an `Err`, so the caller continues with
    /// the next task. `Err` is reserved for failing to run the tool at all.
    pub async fn run(&self, task: &mut RemuxTask) -> Result<()> {
        task.status = RemuxStatus::Running;
        info!(
            source = %task.source.display(),
            dest = %task.dest.display(),
            "remuxing segment"
        );

        let output = Command::new(&self.ffmpeg_path)
            .args(Self::build_args(&task.source, &task.dest))
            .env("LC_ALL", "C")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| crate::Error::other(format!("failed to run ffmpeg for remux: {e}")))?;

        if let Some(log) = &self.diagnostic_log {
            let header = format!("remux {}", task.source.display());
            if let Err(e) = fs::append_delimited(log, &header, &output.stderr).await {
                warn!(error = %e, "failed to append remux diagnostics");
            }
        }

        if output.status.success() {
            task.status = RemuxStatus::Done;
            info!(dest = %task.dest.display(), "segment finalized");

            if self.remove_source {
                match tokio::fs::remove_file(&task.source).await {
                    Ok(()) => {
                        info!(path = %task.source.display(), "removed fragmented source after remux")
                    }
                    Err(e) => warn!(
                        path = %task.source.display(),
                        error = %e,
                        "failed to remove fragmented source"
                    ),
                }
            }
        } else {
            task.status = RemuxStatus::Failed;
            error!(
                source = %task.source.display(),
                exit_code = output.status.code().unwrap_or(-1),
                "remux failed; fragmented source retained"
            );
        }

        Ok(())
    }
}
