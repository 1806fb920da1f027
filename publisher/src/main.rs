mod client;
mod event;

use clap::Parser;
use client::{send_event, Delivery};
use event::{generate, ValueEncoding};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::time::Duration;
use tracing::{error, info, warn};

/// Simulated IoT device that posts one synthetic event per interval.
#[derive(Debug, Parser)]
#[command(name = "publisher", version)]
struct Args {
    /// Ingestion endpoint (API Gateway stage URL)
    #[arg(long, env = "PUBLISHER_ENDPOINT")]
    endpoint: String,

    /// Seconds to wait after each event, whatever the outcome
    #[arg(long, env = "PUBLISHER_INTERVAL_SECS", default_value_t = 5)]
    interval_secs: u64,

    /// Wire representation of the reading
    #[arg(long, env = "PUBLISHER_VALUE_ENCODING", value_enum, default_value = "float")]
    value_encoding: ValueEncoding,

    /// Stop after this many events (runs forever when unset)
    #[arg(long, env = "PUBLISHER_MAX_EVENTS")]
    max_events: Option<u64>,

    /// Per-request timeout in seconds
    #[arg(long, env = "PUBLISHER_TIMEOUT_SECS", default_value_t = 30)]
    timeout_secs: u64,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("Starting IoT publisher");
    info!(
        "Endpoint: {}, interval: {}s, encoding: {:?}",
        args.endpoint, args.interval_secs, args.value_encoding
    );

    let client = match reqwest::Client::builder()
        .timeout(Duration::from_secs(args.timeout_secs))
        .build()
    {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to build HTTP client: {}", e);
            std::process::exit(1);
        }
    };

    let interval = Duration::from_secs(args.interval_secs);
    let mut rng = StdRng::from_entropy();
    let mut sent = 0u64;

    loop {
        let event = generate(&mut rng, args.value_encoding);

        match send_event(&client, &args.endpoint, &event).await {
            Ok(Delivery::Accepted) => {
                let payload = serde_json::to_string_pretty(&event).unwrap_or_default();
                info!("Event sent: {}", payload);
            }
            Ok(Delivery::Rejected { status, body }) => {
                warn!("Failed to send event ({}): {}", status, body);
            }
            Err(e) => {
                error!("Error sending event: {}", e);
            }
        }

        sent += 1;
        if args.max_events.is_some_and(|max| sent >= max) {
            info!("Published {} events, stopping", sent);
            break;
        }

        tokio::time::sleep(interval).await;
    }
}
