//! Stream resolution: is the channel live, and what can we play?
//!
//! Resolution is a compile-time capability seam: a static registry maps a
//! small fixed set of URL patterns to resolver constructors, and everything
//! behind it is one [`StreamResolver`] trait. A bare channel identifier
//! (no scheme) is interpreted as a Twitch channel name.

mod streamlink;
mod twitch;

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use thiserror::Error;

use crate::config::TwitchCredentials;
pub use streamlink::StreamlinkResolver;
pub use twitch::TwitchResolver;

/// Resolver failure kinds.
///
/// `Transient` failures are retried at the standard poll interval;
/// `Unsupported` means no resolver understands the source and is fatal.
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("transient resolver failure: {0}")]
    Transient(String),

    #[error("unsupported source: {0}")]
    Unsupported(String),
}

/// One playable quality variant of a live stream.
#[derive(Debug, Clone)]
pub struct StreamVariant {
    pub quality: String,
    pub url: String,
}

/// Outcome of one resolution attempt. No variants means the channel is not
/// live.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub streams: Vec<StreamVariant>,
}

impl Resolution {
    pub fn is_live(&self) -> bool {
        !self.streams.is_empty()
    }

    /// The qualified variant the capture uses. Live without `best` is the
    /// "no qualified stream" condition, which the control loop treats as
    /// fatal.
    pub fn best(&self) -> Option<&StreamVariant> {
        self.streams.iter().find(|s| s.quality == "best")
    }

    pub fn qualities(&self) -> Vec<&str> {
        self.streams.iter().map(|s| s.quality.as_str()).collect()
    }
}

/// Capability interface for one channel's resolution.
#[async_trait]
pub trait StreamResolver: Send + Sync {
    /// The source URL this resolver watches.
    fn source_url(&self) -> &str;

    /// Check whether the channel is live and which qualities are playable.
    async fn resolve(&self) -> Result<Resolution, ResolveError>;

    /// Human-readable title used for file naming. Never fails; lookups that
    /// go wrong degrade to a placeholder.
    async fn channel_title(&self) -> String;
}

/// Shared state handed to resolver constructors.
pub struct ResolverContext {
    pub streamlink_path: String,
    pub http: reqwest::Client,
    pub twitch_credentials: Option<TwitchCredentials>,
}

type ResolverConstructor = fn(String, &ResolverContext) -> Box<dyn StreamResolver>;

struct PlatformEntry {
    regex: &'static LazyLock<Regex>,
    constructor: ResolverConstructor,
}

pub static TWITCH_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:https?://)?(?:www\.)?twitch\.tv/([A-Za-z0-9_]+)").unwrap()
});

static YOUTUBE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:https?://)?(?:www\.)?youtube\.com/").unwrap()
});

static KICK_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:https?://)?(?:www\.)?kick\.com/").unwrap());

// Fixed platform registry; order decides match priority.
static PLATFORMS: &[PlatformEntry] = &[
    PlatformEntry {
        regex: &TWITCH_URL,
        constructor: |url, ctx| Box::new(TwitchResolver::new(url, ctx)),
    },
    PlatformEntry {
        regex: &YOUTUBE_URL,
        constructor: |url, ctx| {
            Box::new(StreamlinkResolver::new(url, ctx.streamlink_path.clone()))
        },
    },
    PlatformEntry {
        regex: &KICK_URL,
        constructor: |url, ctx| {
            Box::new(StreamlinkResolver::new(url, ctx.streamlink_path.clone()))
        },
    },
];

/// Expand a channel identifier into a source URL.
///
/// Anything without a scheme is treated as a Twitch channel name.
pub fn source_url_for(channel: &str) -> String {
    if channel.contains("://") {
        channel.to_string()
    } else {
        format!("https://twitch.tv/{channel}")
    }
}

/// Create the resolver for a channel identifier, or fail with `Unsupported`
/// if no known pattern matches.
pub fn create_resolver(
    channel: &str,
    ctx: &ResolverContext,
) -> Result<Box<dyn StreamResolver>, ResolveError> {
    let url = source_url_for(channel);
    for platform in PLATFORMS {
        if platform.regex.is_match(&url) {
            return Ok((platform.constructor)(url, ctx));
        }
    }
    Err(ResolveError::Unsupported(url))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_ctx() -> ResolverContext {
        ResolverContext {
            streamlink_path: "streamlink".to_string(),
            http: reqwest::Client::new(),
            twitch_credentials: None,
        }
    }

    #[test]
    fn test_source_url_for_bare_channel() {
        assert_eq!(source_url_for("somecaster"), "https://twitch.tv/somecaster");
    }

    #[test]
    fn test_source_url_for_full_url_passthrough() {
        assert_eq!(
            source_url_for("https://youtube.com/@chan/live"),
            "https://youtube.com/@chan/live"
        );
    }

    #[test]
    fn test_create_resolver_known_patterns() {
        let ctx = test_ctx();
        assert!(create_resolver("somecaster", &ctx).is_ok());
        assert!(create_resolver("https://www.twitch.tv/somecaster", &ctx).is_ok());
        assert!(create_resolver("https://youtube.com/@chan/live", &ctx).is_ok());
        assert!(create_resolver("https://kick.com/somecaster", &ctx).is_ok());
    }

    #[test]
    fn test_create_resolver_unknown_pattern_is_unsupported() {
        let err = create_resolver("https://example.com/stream", &test_ctx())
            .err()
            .unwrap();
        assert!(matches!(err, ResolveError::Unsupported(_)));
    }

    #[test]
    fn test_resolution_best_selection() {
        let resolution = Resolution {
            streams: vec![
                StreamVariant {
                    quality: "720p".to_string(),
                    url: "https://cdn/720".to_string(),
                },
                StreamVariant {
                    quality: "best".to_string(),
                    url: "https://cdn/best".to_string(),
                },
            ],
        };
        assert!(resolution.is_live());
        assert_eq!(resolution.best().unwrap().url, "https://cdn/best");
    }

    #[test]
    fn test_resolution_offline() {
        let resolution = Resolution::default();
        assert!(!resolution.is_live());
        assert!(resolution.best().is_none());
    }
}
