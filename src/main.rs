use clap::Parser;

use liveleech::cli::Args;
use liveleech::config::AppConfig;
use liveleech::monitor::Monitor;
use liveleech::resolver::{self, ResolverContext};
use liveleech::{logging, shutdown};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables before anything reads them.
    dotenvy::dotenv().ok();

    let args = Args::parse();
    let config = AppConfig::from_args(args)?;

    let _log_guard = logging::init(&config.log_dir, &config.channel_slug())?;

    // Credentials are validated up front: a Twitch target without them is a
    // startup misconfiguration, not something to discover mid-session.
    let twitch_credentials = config.twitch_credentials()?;

    let ctx = ResolverContext {
        streamlink_path: config.streamlink_path.clone(),
        http: reqwest::Client::new(),
        twitch_credentials,
    };
    let resolver = resolver::create_resolver(&config.channel, &ctx)?;

    let shutdown = shutdown::install();

    Monitor::new(config, resolver, shutdown).run().await?;

    tracing::info!("exiting");
    Ok(())
}
