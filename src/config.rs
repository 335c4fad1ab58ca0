//! Runtime configuration assembled from CLI arguments and environment.

use std::path::PathBuf;
use std::time::Duration;

use crate::cli::Args;
use crate::resolver;

/// Resolver credentials provided through the environment.
#[derive(Debug, Clone)]
pub struct TwitchCredentials {
    pub client_id: String,
    pub token: String,
}

impl TwitchCredentials {
    pub const CLIENT_ID_VAR: &'static str = "TWITCH_LIVELEECH_CLIENT_ID";
    pub const AUTHORIZATION_VAR: &'static str = "TWITCH_LIVELEECH_AUTHORIZATION";

    /// Read credentials from the environment, if both variables are set.
    pub fn from_env() -> Option<Self> {
        let client_id = std::env::var(Self::CLIENT_ID_VAR).ok().filter(|v| !v.is_empty())?;
        let token = std::env::var(Self::AUTHORIZATION_VAR)
            .ok()
            .filter(|v| !v.is_empty())?;
        Some(Self { client_id, token })
    }
}

/// Validated application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Channel identifier: a Twitch channel name or a full source URL.
    pub channel: String,
    /// Root directory for captured and finalized files.
    pub output_root: PathBuf,
    /// Directory for event and diagnostic logs.
    pub log_dir: PathBuf,
    /// Interval between liveness polls while idle.
    pub poll_interval: Duration,
    /// Interval between segment watcher manifest scans.
    pub watcher_interval: Duration,
    /// Bound on the wait for the watcher's drain pass at shutdown.
    pub drain_timeout: Duration,
    /// Duration of one capture segment file.
    pub segment_duration_secs: u64,
    /// Duration of the internal fragments inside a segment.
    pub fragment_duration_secs: u64,
    /// Delete the fragmented source after a successful remux.
    pub remove_source: bool,
    pub ffmpeg_path: String,
    pub streamlink_path: String,
}

impl AppConfig {
    pub fn from_args(args: Args) -> crate::Result<Self> {
        if args.segment_duration == 0 {
            return Err(crate::Error::config("segment duration must be nonzero"));
        }
        if args.fragment_duration == 0 || args.fragment_duration > args.segment_duration {
            return Err(crate::Error::config(
                "fragment duration must be nonzero and no longer than the segment duration",
            ));
        }

        Ok(Self {
            channel: args.channel,
            output_root: args.output_dir,
            log_dir: args.log_dir,
            poll_interval: Duration::from_secs(args.poll_interval),
            watcher_interval: Duration::from_secs(args.watcher_interval),
            drain_timeout: Duration::from_secs(args.drain_timeout),
            segment_duration_secs: args.segment_duration,
            fragment_duration_secs: args.fragment_duration,
            remove_source: args.remove_source,
            ffmpeg_path: args.ffmpeg_path,
            streamlink_path: args.streamlink_path,
        })
    }

    /// A short name for the channel, safe for log file names.
    pub fn channel_slug(&self) -> String {
        let slug: String = self
            .channel
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        slug.trim_matches('_').to_string()
    }

    /// Credentials required for a Twitch target; a missing pair is an
    /// unrecoverable startup misconfiguration.
    pub fn twitch_credentials(&self) -> crate::Result<Option<TwitchCredentials>> {
        let url = resolver::source_url_for(&self.channel);
        if !resolver::TWITCH_URL.is_match(&url) {
            return Ok(TwitchCredentials::from_env());
        }
        match TwitchCredentials::from_env() {
            Some(creds) => Ok(Some(creds)),
            None => Err(crate::Error::config(format!(
                "missing {} or {} environment variable(s)",
                TwitchCredentials::CLIENT_ID_VAR,
                TwitchCredentials::AUTHORIZATION_VAR,
            ))),
        }
    }
}
