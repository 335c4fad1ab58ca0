//! Command-line argument surface.

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "liveleech",
    version,
    about = "Unattended live-stream recorder: segmented capture with background remuxing"
)]
pub struct Args {
    /// Channel to watch: a Twitch channel name or a full source URL.
    pub channel: String,

    /// Root directory for captured and finalized files.
    pub output_dir: PathBuf,

    /// Directory for event and diagnostic logs.
    #[arg(long, default_value = "logs")]
    pub log_dir: PathBuf,

    /// Seconds between liveness polls while the channel is offline.
    #[arg(long, default_value_t = 45)]
    pub poll_interval: u64,

    /// Seconds between segment watcher manifest scans.
    #[arg(long, default_value_t = 240)]
    pub watcher_interval: u64,

    /// Seconds to wait for the watcher's drain pass at shutdown.
    #[arg(long, default_value_t = 15)]
    pub drain_timeout: u64,

    /// Seconds per capture segment file.
    #[arg(long, default_value_t = 21_600)]
    pub segment_duration: u64,

    /// Seconds per internal fragment within a segment.
    #[arg(long, default_value_t = 10)]
    pub fragment_duration: u64,

    /// Delete the fragmented source file after a successful remux.
    #[arg(long)]
    pub remove_source: bool,

    /// Path to the ffmpeg binary.
    #[arg(long, env = "FFMPEG_PATH", default_value = "ffmpeg")]
    pub ffmpeg_path: String,

    /// Path to the streamlink binary.
    #[arg(long, env = "STREAMLINK_PATH", default_value = "streamlink")]
    pub streamlink_path: String,
}
