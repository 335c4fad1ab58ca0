//! Capture session: one ffmpeg subprocess segmenting a live stream.
//!
//! The subprocess copies the resolved media URL into consecutive
//! fixed-duration segments, each internally fragmented so it is partially
//! playable before it closes. The segment muxer appends each closed segment's
//! path to the session manifest, which the watcher reads concurrently.
//! ffmpeg's stdin is the graceful-stop control channel: one `q` byte asks it
//! to finish the current output and exit.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use chrono::{DateTime, Local, Utc};
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin, Command};
use tracing::{error, info, warn};

use crate::Result;
use crate::remux::FRAGMENT_MARKER;
use crate::shutdown::ShutdownToken;
use crate::utils::{filename, fs};

/// Filesystem layout for one capture session.
#[derive(Debug, Clone)]
pub struct SessionPaths {
    /// Date bucket, e.g. `<root>/aug_2026`.
    pub month_dir: PathBuf,
    /// Output path template with the sequence placeholder and fragment marker.
    pub output_template: PathBuf,
    /// Append-only manifest of completed segment paths.
    pub manifest: PathBuf,
    /// Prefix prepended to each manifest entry so lines are full paths.
    pub entry_prefix: String,
}

impl SessionPaths {
    /// Plan the paths for a session starting now.
    pub fn plan(output_root: &Path, sanitized_title: &str, now: DateTime<Local>) -> Self {
        let date = now.date_naive();
        let month_dir = output_root.join(filename::month_dir_name(date));
        let stem = filename::session_stem(date, sanitized_title, now.timestamp());

        let output_template = month_dir.join(format!("{stem}_%05d{FRAGMENT_MARKER}.mp4"));
        let manifest = month_dir.join(format!("{stem}.segments.txt"));

        let mut entry_prefix = month_dir.to_string_lossy().to_string();
        if !entry_prefix.ends_with(std::path::MAIN_SEPARATOR) {
            entry_prefix.push(std::path::MAIN_SEPARATOR);
        }

        Self {
            month_dir,
            output_template,
            manifest,
            entry_prefix,
        }
    }
}

/// One active capture subprocess. Owned exclusively by the control loop and
/// consumed when the subprocess exits.
pub struct CaptureSession {
    child: Child,
    stdin: Option<ChildStdin>,
    started_at: DateTime<Utc>,
    manifest_path: PathBuf,
}

impl CaptureSession {
    /// Build the ffmpeg argument list for a segmenting, copy-only capture.
    pub fn build_args(
        media_url: &str,
        paths: &SessionPaths,
        segment_duration_secs: u64,
        fragment_duration_secs: u64,
    ) -> Vec<String> {
        vec![
            "-y".to_string(),
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            "info".to_string(),
            "-i".to_string(),
            media_url.to_string(),
            "-c:v".to_string(),
            "copy".to_string(),
            "-c:a".to_string(),
            "copy".to_string(),
            "-f".to_string(),
            "segment".to_string(),
            "-segment_time".to_string(),
            segment_duration_secs.to_string(),
            "-reset_timestamps".to_string(),
            "1".to_string(),
            "-segment_format".to_string(),
            "mp4".to_string(),
            "-segment_format_options".to_string(),
            format!(
                "movflags=+frag_keyframe+empty_moov+default_base_moof:frag_duration={}",
                fragment_duration_secs * 1_000_000
            ),
            "-segment_list".to_string(),
            paths.manifest.to_string_lossy().to_string(),
            "-segment_list_type".to_string(),
            "flat".to_string(),
            "-segment_list_entry_prefix".to_string(),
            paths.entry_prefix.clone(),
            paths.output_template.to_string_lossy().to_string(),
        ]
    }

    /// Spawn the capture subprocess.
    ///
    /// stderr streams into the raw diagnostic log, opened in append mode with
    /// a per-session delimiter.
    pub fn spawn(
        ffmpeg_path: &str,
        media_url: &str,
        paths: &SessionPaths,
        segment_duration_secs: u64,
        fragment_duration_secs: u64,
        raw_log: &Path,
    ) -> Result<Self> {
        let started_at = Utc::now();
        let stderr_log = fs::open_delimited_log(
            raw_log,
            &format!("capture session {}", started_at.to_rfc3339()),
        )?;

        let mut child = Command::new(ffmpeg_path)
            .args(Self::build_args(
                media_url,
                paths,
                segment_duration_secs,
                fragment_duration_secs,
            ))
            .env("LC_ALL", "C")
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::from(stderr_log))
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| crate::Error::other(format!("failed to spawn ffmpeg capture: {e}")))?;

        let stdin = child.stdin.take();

        Ok(Self {
            child,
            stdin,
            started_at,
            manifest_path: paths.manifest.clone(),
        })
    }

    #[cfg(test)]
    pub(crate) fn from_child(mut child: Child, manifest_path: PathBuf) -> Self {
        let stdin = child.stdin.take();
        Self {
            child,
            stdin,
            started_at: Utc::now(),
            manifest_path,
        }
    }

    pub fn manifest_path(&self) -> &Path {
        &self.manifest_path
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Write the graceful-stop byte to the subprocess control channel.
    async fn send_graceful_stop(&mut self) {
        let Some(mut stdin) = self.stdin.take() else {
            warn!("capture control channel already closed");
            return;
        };
        if let Err(e) = stdin.write_all(b"q").await {
            warn!(error = %e, "failed to send graceful stop to capture subprocess");
            return;
        }
        let _ = stdin.flush().await;
    }

    /// Block until the subprocess exits, honoring shutdown requests.
    ///
    /// A graceful request sends the stop byte once; a forceful request kills
    /// the child. Consumes the session: `CAPTURING -> IDLE` on return.
    pub async fn wait(mut self, shutdown: &ShutdownToken) -> Result<ExitStatus> {
        let mut stop_sent = false;
        let mut killed = false;
        loop {
            tokio::select! {
                status = self.child.wait() => {
                    return status.map_err(|e| {
                        crate::Error::other(format!("error waiting for capture subprocess: {e}"))
                    });
                }
                _ = shutdown.graceful_requested(), if !stop_sent => {
                    info!("asking capture subprocess to finish its current segment");
                    self.send_graceful_stop().await;
                    stop_sent = true;
                }
                _ = shutdown.forceful_requested(), if stop_sent && !killed => {
                    warn!("forcefully terminating capture subprocess");
                    if let Err(e) = self.child.kill().await {
                        error!(error = %e, "failed to kill capture subprocess");
                    }
                    killed = true;
                }
            }
        }
    }
}
