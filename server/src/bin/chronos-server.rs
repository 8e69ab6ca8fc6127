//! chronos cache server binary.

use clap::Parser;
use std::path::PathBuf;

use chronos_server::Config;
use chronos_server::{logging, signal};

#[derive(Parser)]
#[command(name = "chronos-server")]
#[command(about = "In-memory cache server with predictive prefetching and adaptive TTL")]
struct Args {
    /// Path to configuration file (defaults apply when omitted)
    config: Option<PathBuf>,

    /// Print the default configuration and exit
    #[arg(long)]
    print_config: bool,
}

fn main() {
    let args = Args::parse();

    if args.print_config {
        print_default_config();
        return;
    }

    let config = match &args.config {
        Some(path) => match Config::load(path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Failed to load config: {}", e);
                std::process::exit(1);
            }
        },
        None => Config::default(),
    };

    logging::init(&config.logging);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        listen = %config.server.listen,
        admin = %config.server.admin_listen,
        segments = config.cache.segments,
        memory_mb = config.cache.max_memory_bytes / (1024 * 1024),
        policy = ?config.cache.eviction_policy,
        "chronos starting"
    );

    let shutdown = signal::install_signal_handler();

    if let Err(e) = chronos_server::run(config, shutdown) {
        tracing::error!(error = %e, "server error");
        std::process::exit(1);
    }
}

fn print_default_config() {
    let config = r#"# chronos server configuration

[server]
# RESP listener
listen = "0.0.0.0:6380"
# Admin HTTP listener (GET /health, /metrics, /stats)
admin_listen = "0.0.0.0:8080"
# Tokio worker threads (default: number of CPUs)
# worker_threads = 8

[cache]
# Segment count for lock striping; rounded up to a power of two
segments = 256
# Total memory budget (e.g., "2GB", "512MB")
max_memory_bytes = "2GB"
# Eviction policy: "lru" or "lfu"
eviction_policy = "lru"

[prefetch]
enabled = true
# Minimum transition probability before a key is prefetched
confidence = 0.6
# Access-history window; 0 disables prediction
window = 10
# Predictions dispatched per access
top_n = 3
# Background loader threads
workers = 4
# Prediction scoring window in milliseconds
expiry_ms = 30000
# TTL for prefetched entries
fill_ttl_s = 3600

[ttl]
enabled = true
# Seconds between rewrite passes
interval_s = 300
# Base TTL scaled by the cost-benefit multiplier
base_s = 3600
min_mult = 0.1
max_mult = 10.0
# Relative change below which a TTL is left alone
deadband = 0.2

[snapshot]
enabled = true
interval_s = 300
path = "./data/chronos.snapshot"

[health]
interval_s = 30

[logging]
# trace | debug | info | warn | error (RUST_LOG overrides)
level = "info"
# pretty | compact | json
format = "pretty"
"#;
    print!("{}", config);
}
