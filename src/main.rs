mod address;
mod api;
mod app;
mod config;
mod error;
mod executor;
mod messages;
mod poller;
mod utils;
mod wallet;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use anyhow::anyhow;
use iced::{Application, Settings};
use tracing::info;
use tracing_subscriber::EnvFilter;

use api::HttpSources;
use app::{Flags, WalletTrackerApp};
use config::Config;
use poller::Tracker;
use wallet::WalletFetcher;

const DEFAULT_LOG_FILTER: &str = "eth_wallet_tracker=info,reqwest=warn,hyper=warn,wgpu=warn";

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_logging();

    let config = Config::from_env();
    info!(interval_secs = config.poll_interval.as_secs(), "starting wallet tracker");

    let fetcher = WalletFetcher::from_http(HttpSources::new(&config)?);
    let (tracker, events) = Tracker::new(fetcher, config.poll_interval);

    let mut settings = Settings::with_flags(Flags {
        tracker: Arc::new(tracker),
        events,
    });
    settings.window.size = (640, 520);
    // Closing waits for the poll loop to wind down first.
    settings.exit_on_close_request = false;

    WalletTrackerApp::run(settings).map_err(|err| anyhow!("GUI exited with an error: {err}"))
}
