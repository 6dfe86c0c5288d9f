//! Stream slot and root notifications from a pub/sub endpoint.
//!
//! Demonstrates:
//! - Building a pool with a message handler
//! - Subscribing to several methods across pooled connections
//! - Watching monitor health while the stream runs
//! - Closing everything on Ctrl+C
//!
//! Usage:
//!   cargo run --example stream
//!   cargo run --example stream -- wss://api.mainnet-beta.solana.com
//!   cargo run --example stream -- --debug

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::Context;
use rpc_pubsub_pool::{ConnectionPool, SubscriptionMethod};
use serde_json::json;
use tracing_subscriber::EnvFilter;

// ============================================================================
// Constants
// ============================================================================

const DEFAULT_ENDPOINT: &str = "wss://api.devnet.solana.com";

const STATUS_INTERVAL: Duration = Duration::from_secs(10);

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let debug = args.iter().any(|a| a == "--debug");
    let endpoint = args
        .iter()
        .find(|a| !a.starts_with("--"))
        .cloned()
        .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());

    init_logging(debug);

    if let Err(e) = run(endpoint).await {
        eprintln!("\n[ERROR] {e:#}");
        std::process::exit(1);
    }
}

async fn run(endpoint: String) -> anyhow::Result<()> {
    println!("=== Pub/Sub Stream ===\n");

    let received = Arc::new(AtomicU64::new(0));
    let counter = Arc::clone(&received);

    let pool = ConnectionPool::builder(&endpoint)
        .max_connections(2)
        .ping_interval(Duration::from_secs(15))
        .on_message(move |frame| {
            counter.fetch_add(1, Ordering::Relaxed);
            let text = std::str::from_utf8(frame)?;
            println!("        <- {text}");
            Ok(())
        })
        .build()
        .context("invalid pool configuration")?;

    println!("[Setup] Endpoint: {endpoint}");

    // ========================================================================
    // Subscribe
    // ========================================================================

    let requests = [
        (SubscriptionMethod::SlotSubscribe, vec![]),
        (SubscriptionMethod::RootSubscribe, vec![]),
        (
            SubscriptionMethod::LogsSubscribe,
            vec![json!("all"), json!({"commitment": "confirmed"})],
        ),
    ];

    for (method, params) in requests {
        match pool.subscribe(method, params).await {
            Some(id) => println!("        ✓ {method} as {id}"),
            None => println!("        ✗ {method} (connection not ready)"),
        }
    }

    println!("\n[Stream] {} subscriptions tracked", pool.subscription_count());
    println!("Press Ctrl+C to exit...\n");

    // ========================================================================
    // Run
    // ========================================================================

    let mut status = tokio::time::interval(STATUS_INTERVAL);
    status.tick().await;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,

            _ = status.tick() => {
                for monitor in pool.monitors() {
                    let s = monitor.status();
                    println!(
                        "[Status] {} open={} breaker={} failures={} retries={}",
                        monitor.id(),
                        s.is_open,
                        s.breaker,
                        s.failure_count,
                        s.retry_count,
                    );
                }
                println!("[Status] {} frames received", received.load(Ordering::Relaxed));
            }
        }
    }

    pool.close_all();
    println!("\n[Done] Closed {endpoint}");
    Ok(())
}

// ============================================================================
// Functions
// ============================================================================

/// Initialize tracing/logging.
fn init_logging(debug: bool) {
    let filter = if debug {
        "rpc_pubsub_pool=debug"
    } else {
        "rpc_pubsub_pool=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .init();
}
