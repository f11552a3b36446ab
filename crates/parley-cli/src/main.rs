//! Parley terminal client entry point.
//!
//! # Usage
//!
//! ```bash
//! # List rooms
//! PARLEY_TOKEN=... parley --user 7
//!
//! # Join a room
//! parley --server wss://host/ws/chat --api https://host/api --token ... --user 7 --room 12
//! ```

use clap::Parser;
use parley_cli::{Args, runtime};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    // stdout carries the conversation, logs go to stderr
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    Ok(runtime::run(args).await?)
}
