// SPDX-License-Identifier: MIT
use std::sync::Arc;

use anyhow::{Context as _, Result};
use chrono::Utc;
use clap::Parser;
use tracing::info;

use redline::config::ReviewerConfig;
use redline::docs::drive::DriveClient;
use redline::rate_limit::RateLimiter;
use redline::service::ReviewService;
use redline::suggest::{HttpTransport, SuggestConfig, SuggestionClient};

#[derive(Parser)]
#[command(
    name = "redlined",
    about = "Redline — always-on background reviewer for shared documents",
    version
)]
struct Args {
    /// Data directory for config.toml
    #[arg(long, env = "REDLINE_DATA_DIR")]
    data_dir: Option<std::path::PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "REDLINE_LOG")]
    log: Option<String>,

    /// Seconds between poll cycles
    #[arg(long, env = "REDLINE_POLL_INTERVAL")]
    poll_interval_secs: Option<u64>,

    /// Run a single review cycle and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = ReviewerConfig::new(args.data_dir, args.log, args.poll_interval_secs);
    setup_logging(&config.log, &config.log_format);

    info!(version = env!("CARGO_PKG_VERSION"), "redlined starting");

    let api_key = config
        .suggest
        .api_key
        .clone()
        .context("no suggestion API key configured (REDLINE_API_KEY or [suggest] api_key)")?;
    let store_token = config
        .store
        .access_token
        .clone()
        .context("no store access token configured (REDLINE_STORE_TOKEN or [store] access_token)")?;

    let limiter = Arc::new(RateLimiter::new(config.suggest.requests_per_minute));
    let transport = Arc::new(
        HttpTransport::new(
            config.suggest.api_url.clone(),
            api_key,
            config.suggest_timeout(),
        )
        .context("building suggestion HTTP client")?,
    );
    let suggester = Arc::new(SuggestionClient::new(
        transport,
        limiter,
        SuggestConfig {
            chunk_size: config.suggest.chunk_size,
            max_attempts: config.suggest.max_attempts,
            initial_backoff: config.initial_backoff(),
        },
    ));

    let drive = Arc::new(
        DriveClient::new(
            config.store.files_base_url.clone(),
            config.store.docs_base_url.clone(),
            store_token,
            config.store_timeout(),
        )
        .context("building document store client")?,
    );

    let store: Arc<dyn redline::docs::DocumentStore> = drive.clone();
    let comments: Arc<dyn redline::docs::CommentTransport> = drive;
    let service = ReviewService::new(store, comments, suggester, config.suggest.chunk_size);

    let mut since = Utc::now();
    let mut ticker = tokio::time::interval(config.poll_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        since = service.run_cycle(since).await;
        if args.once {
            break;
        }
    }

    info!("redlined exiting");
    Ok(())
}

fn setup_logging(log_level: &str, log_format: &str) {
    if log_format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(log_level)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(log_level)
            .compact()
            .init();
    }
}
