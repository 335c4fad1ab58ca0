//! Channel monitor: the long-lived control loop.
//!
//! The monitor alternates between two states. While the channel is offline
//! it polls the resolver at a fixed interval; once live it hands off to a
//! capture session and a segment watcher, and returns to polling the moment
//! the session ends. The re-poll after a session is immediate, so a stream
//! that merely hiccuped is reacquired without the idle backoff.

use std::time::Duration;

use chrono::{Local, Utc};
use tracing::{error, info, warn};

use crate::capture::{CaptureSession, SessionPaths};
use crate::config::AppConfig;
use crate::remux::Remuxer;
use crate::resolver::{ResolveError, StreamResolver};
use crate::shutdown::ShutdownToken;
use crate::utils::{filename, fs};
use crate::watcher::WatcherHandle;
use crate::{Error, Result};

pub struct Monitor {
    config: AppConfig,
    resolver: Box<dyn StreamResolver>,
    shutdown: ShutdownToken,
}

impl Monitor {
    pub fn new(config: AppConfig, resolver: Box<dyn StreamResolver>, shutdown: ShutdownToken) -> Self {
        Self {
            config,
            resolver,
            shutdown,
        }
    }

    /// Run until shutdown is requested or an unrecoverable error occurs.
    pub async fn run(&self) -> Result<()> {
        info!(url = self.resolver.source_url(), "watching channel");

        // First poll is immediate; subsequent idle polls are spaced by the
        // configured interval. After a capture session the delay resets to
        // zero for an immediate liveness re-check.
        let mut delay = Duration::ZERO;

        loop {
            tokio::select! {
                _ = self.shutdown.graceful_requested() => {
                    info!("shutdown requested while idle");
                    return Ok(());
                }
                _ = tokio::time::sleep(delay) => {}
            }

            match self.resolver.resolve().await {
                Err(ResolveError::Transient(reason)) => {
                    warn!(%reason, "liveness check failed; will retry");
                    delay = self.config.poll_interval;
                }
                Err(e @ ResolveError::Unsupported(_)) => {
                    error!(error = %e, "source cannot be resolved");
                    return Err(e.into());
                }
                Ok(resolution) if !resolution.is_live() => {
                    info!("channel is offline");
                    delay = self.config.poll_interval;
                }
                Ok(resolution) => {
                    let Some(best) = resolution.best() else {
                        // Live, but the qualified variant is absent. This is
                        // not a transient condition worth polling through.
                        return Err(Error::NoQualifiedStream(
                            resolution.qualities().join(", "),
                        ));
                    };
                    self.capture_session(&best.url).await?;
                    delay = Duration::ZERO;
                }
            }
        }
    }

    /// Run one capture session to completion, watcher included.
    async fn capture_session(&self, media_url: &str) -> Result<()> {
        let title = self.resolver.channel_title().await;
        let sanitized = filename::sanitize_title(&title);
        let paths = SessionPaths::plan(&self.config.output_root, &sanitized, Local::now());
        fs::ensure_dir_all(&paths.month_dir).await?;

        let slug = self.config.channel_slug();
        let capture_log = self.config.log_dir.join(format!("{slug}_capture.log"));
        let remux_log = self.config.log_dir.join(format!("{slug}_remux.log"));

        info!(
            %title,
            manifest = %paths.manifest.display(),
            "channel is live, starting capture"
        );

        let session = CaptureSession::spawn(
            &self.config.ffmpeg_path,
            media_url,
            &paths,
            self.config.segment_duration_secs,
            self.config.fragment_duration_secs,
            &capture_log,
        )?;

        let remuxer = Remuxer::new(&self.config.ffmpeg_path)
            .with_remove_source(self.config.remove_source)
            .with_diagnostic_log(&remux_log);
        let watcher = WatcherHandle::spawn(
            session.manifest_path(),
            remuxer,
            self.config.watcher_interval,
        );

        let started_at = session.started_at();
        let status = session.wait(&self.shutdown).await?;
        let session_secs = (Utc::now() - started_at).num_seconds();
        if status.success() {
            info!(session_secs, "capture ended cleanly");
        } else {
            warn!(
                session_secs,
                exit_code = ?status.code(),
                "capture ended with an error"
            );
        }

        // A stream that simply ended gets an unbounded drain; only an
        // operator-requested shutdown bounds the wait.
        let drain_timeout = self.shutdown.is_stopping().then_some(self.config.drain_timeout);
        watcher.stop_and_drain(drain_timeout).await;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Args;
    use crate::resolver::{Resolution, StreamVariant};
    use async_trait::async_trait;
    use clap::Parser;
    use tempfile::TempDir;

    enum StubBehavior {
        Offline,
        Unsupported,
        LiveWithoutBest,
    }

    struct StubResolver {
        behavior: StubBehavior,
    }

    #[async_trait]
    impl StreamResolver for StubResolver {
        fn source_url(&self) -> &str {
            "https://twitch.tv/somecaster"
        }

        async fn resolve(&self) -> std::result::Result<Resolution, ResolveError> {
            match self.behavior {
                StubBehavior::Offline => Ok(Resolution::default()),
                StubBehavior::Unsupported => {
                    Err(ResolveError::Unsupported("https://example.com".to_string()))
                }
                StubBehavior::LiveWithoutBest => Ok(Resolution {
                    streams: vec![StreamVariant {
                        quality: "720p".to_string(),
                        url: "https://cdn/720".to_string(),
                    }],
                }),
            }
        }

        async fn channel_title(&self) -> String {
            "Stub Title".to_string()
        }
    }

    fn test_monitor(behavior: StubBehavior, tmp: &TempDir) -> Monitor {
        let args = Args::try_parse_from([
            "liveleech",
            "somecaster",
            tmp.path().to_str().unwrap(),
            "--poll-interval",
            "1",
        ])
        .unwrap();
        let mut config = AppConfig::from_args(args).unwrap();
        config.poll_interval = Duration::from_millis(10);
        Monitor::new(config, Box::new(StubResolver { behavior }), ShutdownToken::new())
    }

    #[tokio::test]
    async fn test_offline_channel_spawns_nothing_and_stops_on_request() {
        let tmp = TempDir::new().unwrap();
        let monitor = test_monitor(StubBehavior::Offline, &tmp);
        let shutdown = monitor.shutdown.clone();

        let run = tokio::spawn(async move { monitor.run().await });
        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.request_graceful();

        run.await.unwrap().unwrap();
        // Nothing was captured, so the output root holds no month buckets.
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_unsupported_source_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let monitor = test_monitor(StubBehavior::Unsupported, &tmp);
        let err = monitor.run().await.unwrap_err();
        assert!(matches!(err, Error::Resolve(ResolveError::Unsupported(_))));
    }

    #[tokio::test]
    async fn test_live_without_qualified_stream_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let monitor = test_monitor(StubBehavior::LiveWithoutBest, &tmp);
        let err = monitor.run().await.unwrap_err();
        match err {
            Error::NoQualifiedStream(qualities) => assert_eq!(qualities, "720p"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
