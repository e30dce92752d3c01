//! Queue proxy.
//!
//! A small proxy in front of one unreliable remote service. Every upstream
//! call goes through an admission-controlled retry queue so that bursts and
//! upstream throttling turn into delay instead of errors.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌──────────────────────────────────────────────────────┐
//!                    │                     QUEUE PROXY                       │
//!   Client Request   │  ┌────────┐   ┌────────────────┐   ┌──────────────┐  │
//!   ─────────────────┼─▶│  http  │──▶│  resilience    │──▶│   upstream   │──┼──▶ Remote
//!                    │  │ server │   │  retry queue   │   │    client    │  │    Service
//!   Client Response  │  │        │◀──│ backoff/admit  │◀──│ 429/5xx=fail │◀─┼───
//!   ◀────────────────┼──└────────┘   └────────────────┘   └──────────────┘  │
//!                    │                                                       │
//!                    │  config (TOML + hot reload) · observability ·         │
//!                    │  lifecycle (startup / signals / shutdown)             │
//!                    └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use clap::Parser;

use queue_proxy::lifecycle::startup::{self, Overrides};

#[derive(Parser)]
#[command(name = "queue-proxy")]
#[command(about = "Proxy that shields an unreliable upstream behind a retry queue", long_about = None)]
struct Args {
    /// Path to a TOML config file; watched for changes.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listener bind address.
    #[arg(short, long)]
    bind: Option<String>,

    /// Override the upstream base URL.
    #[arg(short, long)]
    upstream: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    startup::run(Overrides {
        config_path: args.config,
        bind_address: args.bind,
        upstream_url: args.upstream,
    })
    .await?;
    Ok(())
}
