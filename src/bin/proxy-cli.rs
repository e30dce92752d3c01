use std::time::{Duration, Instant};
use clap::{Parser, Subcommand};
use futures_util::stream::{self, StreamExt};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "proxy-cli")]
#[command(about = "Management and load CLI for the queue proxy", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check proxy liveness
    Health,
    /// Show the retry queue snapshot
    Status,
    /// Fetch a path from the upstream through the proxy
    Fetch {
        /// Upstream path, e.g. /items/7
        path: String,
    },
    /// Fire many concurrent requests and report how many succeeded
    Load {
        /// Total requests to send
        #[arg(short, long, default_value_t = 1000)]
        count: usize,

        /// Requests in flight at once
        #[arg(long, default_value_t = 1000)]
        concurrency: usize,

        /// Upstream path to request
        #[arg(short, long, default_value = "/")]
        path: String,

        /// Hit this base URL directly instead of going through the proxy
        #[arg(long)]
        direct: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match cli.command {
        Commands::Health => {
            let res = client.get(format!("{}/health", cli.url)).send().await?;
            print_response(res).await?;
        }
        Commands::Status => {
            let res = client.get(format!("{}/queue/status", cli.url)).send().await?;
            print_response(res).await?;
        }
        Commands::Fetch { path } => {
            let res = client.get(upstream_url(&cli.url, &path)).send().await?;
            let status = res.status();
            let body = res.text().await?;
            println!("{}", status);
            println!("{}", body);
        }
        Commands::Load {
            count,
            concurrency,
            path,
            direct,
        } => {
            let url = match direct {
                Some(base) => format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/')),
                None => upstream_url(&cli.url, &path),
            };
            run_load(&client, &url, count, concurrency.max(1)).await;
        }
    }

    Ok(())
}

fn upstream_url(proxy: &str, path: &str) -> String {
    format!(
        "{}/api/v1/upstream/{}",
        proxy.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

async fn run_load(client: &reqwest::Client, url: &str, count: usize, concurrency: usize) {
    println!("Sending {} requests to {} ({} concurrent)", count, url, concurrency);
    let start = Instant::now();

    let mut latencies: Vec<Duration> = Vec::with_capacity(count);
    let mut failures = 0usize;
    let mut results = stream::iter(0..count)
        .map(|_| async move {
            let req_start = Instant::now();
            let ok = matches!(client.get(url).send().await, Ok(res) if res.status().is_success());
            (ok, req_start.elapsed())
        })
        .buffer_unordered(concurrency);

    while let Some((ok, latency)) = results.next().await {
        if ok {
            latencies.push(latency);
        } else {
            failures += 1;
        }
    }

    let duration = start.elapsed();
    latencies.sort();
    println!("\n--- Load Results ---");
    println!("Succeeded:      {}/{}", latencies.len(), count);
    println!("Failed:         {}", failures);
    println!("Total Duration: {:?}", duration);
    if !latencies.is_empty() {
        let p50 = latencies[latencies.len() / 2];
        let p99 = latencies[((latencies.len() as f64 * 0.99) as usize).min(latencies.len() - 1)];
        println!("P50 Latency:    {:?}", p50);
        println!("P99 Latency:    {:?}", p99);
    }
    println!("--------------------\n");
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: proxy returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
