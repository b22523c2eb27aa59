//! skatewatch - skateboard hardware sale tracker.
//!
//! Monitors sale listings at several skate shops, diffs them against the
//! previous run, and renders a static HTML report of current deals and
//! recent changes.

mod cli;
mod config;
mod diff;
mod extract;
mod fetch;
mod models;
mod report;
mod snapshot;
mod sources;
mod utils;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (before anything else)
    let _ = dotenvy::dotenv();

    // Initialize logging based on verbosity
    let default_filter = if cli::is_verbose() {
        "skatewatch=info"
    } else {
        "skatewatch=warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    cli::run().await
}
