//! Twitch resolution: streamlink for the stream, Helix for the title.

use async_trait::async_trait;
use tracing::warn;

use super::{Resolution, ResolveError, ResolverContext, StreamResolver, StreamlinkResolver};
use crate::config::TwitchCredentials;

/// Placeholder title when the Helix lookup is unavailable or fails.
const UNKNOWN_TITLE: &str = "UNKNOWN TITLE";

pub struct TwitchResolver {
    channel: String,
    inner: StreamlinkResolver,
    client: reqwest::Client,
    credentials: Option<TwitchCredentials>,
}

impl TwitchResolver {
    pub fn new(url: String, ctx: &ResolverContext) -> Self {
        let channel = super::TWITCH_URL
            .captures(&url)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| url.clone());

        let inner = StreamlinkResolver::new(url, ctx.streamlink_path.clone()).with_extra_args([
            "--twitch-disable-ads".to_string(),
            "--twitch-disable-reruns".to_string(),
        ]);

        Self {
            channel,
            inner,
            client: ctx.http.clone(),
            credentials: ctx.twitch_credentials.clone(),
        }
    }

    async fn helix_get(
        &self,
        creds: &TwitchCredentials,
        url: &str,
    ) -> Option<serde_json::Value> {
        let response = match self
            .client
            .get(url)
            .header("Client-ID", &creds.client_id)
            .bearer_auth(&creds.token)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "failed to reach the Twitch API for the channel title");
                return None;
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, body, "Twitch API rejected the channel title request");
            return None;
        }

        response.json().await.ok()
    }

    async fn fetch_title(&self) -> Option<String> {
        let creds = self.credentials.as_ref()?;

        let users = self
            .helix_get(
                creds,
                &format!(
                    "https://api.twitch.tv/helix/users?login={}",
                    self.channel.to_lowercase()
                ),
            )
            .await?;
        let broadcaster_id = parse_user_id(&users)?;

        let channels = self
            .helix_get(
                creds,
                &format!("https://api.twitch.tv/helix/channels?broadcaster_id={broadcaster_id}"),
            )
            .await?;
        parse_channel_title(&channels)
    }
}

fn parse_user_id(body: &serde_json::Value) -> Option<String> {
    body.get("data")?
        .get(0)?
        .get("id")?
        .as_str()
        .map(str::to_string)
}

fn parse_channel_title(body: &serde_json::Value) -> Option<String> {
    body.get("data")?
        .get(0)?
        .get("title")?
        .as_str()
        .map(str::to_string)
}

#[async_trait]
impl StreamResolver for TwitchResolver {
    fn source_url(&self) -> &str {
        self.inner.source_url()
    }

    async fn resolve(&self) -> Result<Resolution, ResolveError> {
        self.inner.query().await
    }

    async fn channel_title(&self) -> String {
        match self.fetch_title().await {
            Some(title) => title,
            None => UNKNOWN_TITLE.to_string(),
        }
    }
}
