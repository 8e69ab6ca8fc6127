//! chronos-server: RESP2 front end and process wiring for the chronos
//! cache engine.

pub mod admin;
pub mod config;
pub mod connection;
pub mod context;
pub mod execute;
pub mod glob;
pub mod logging;
pub mod metrics;
pub mod server;
pub mod signal;

pub use config::Config;
pub use context::AppContext;

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::{Duration, Instant};

use chronos_cache::{
    CacheWarmer, DataLoader, HealthMonitor, MetricsCollector, NoopLoader, Prefetcher,
    SWEEP_INTERVAL_SECS, Scheduler, SnapshotManager, Store, TtlController,
};

/// Number of cold-start keys the warmer replays after a restart.
const WARMING_TOP_N: usize = 20;

/// Assemble every subsystem, serve until `shutdown` flips, then tear down
/// in order: timers, final snapshot, loader pools.
pub fn run(config: Config, shutdown: Arc<AtomicBool>) -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(Store::new(&config.cache.to_store_config()));
    let metrics = Arc::new(MetricsCollector::new(store.clone()));
    let health = Arc::new(HealthMonitor::new(metrics.clone()));
    let loader: Arc<dyn DataLoader> = Arc::new(NoopLoader);

    // Restore persisted state before accepting traffic.
    let snapshot = if config.snapshot.enabled {
        let manager = Arc::new(SnapshotManager::new(
            store.clone(),
            config.snapshot.path.clone(),
        ));
        match manager.load() {
            Ok(loaded) if loaded > 0 => {
                tracing::info!(loaded, "restored entries from snapshot");
            }
            Ok(_) => {}
            Err(e) => {
                tracing::error!(error = %e, "snapshot restore failed, starting empty");
            }
        }
        Some(manager)
    } else {
        None
    };

    let prefetcher = if config.prefetch.enabled {
        Some(Arc::new(Prefetcher::new(
            store.clone(),
            loader.clone(),
            config.prefetch.to_prefetch_config(),
        )))
    } else {
        None
    };

    let ttl = if config.ttl.enabled {
        Some(Arc::new(TtlController::new(
            store.clone(),
            config.ttl.to_ttl_config(),
        )))
    } else {
        None
    };

    let warmer = Arc::new(CacheWarmer::new(
        store.clone(),
        loader.clone(),
        config.prefetch.workers,
        WARMING_TOP_N,
    ));

    let ctx = Arc::new(AppContext {
        store: store.clone(),
        metrics: metrics.clone(),
        health: health.clone(),
        prefetcher: prefetcher.clone(),
        ttl: ttl.clone(),
        warmer: Some(warmer),
        started_at: Instant::now(),
    });

    // Background timers, one named thread each.
    let mut schedulers = Vec::new();

    schedulers.push(Scheduler::spawn(
        "chronos-sweep",
        Duration::from_secs(SWEEP_INTERVAL_SECS),
        {
            let store = store.clone();
            move || {
                store.sweep_expired();
            }
        },
    ));

    if let Some(ttl) = ttl.clone() {
        schedulers.push(Scheduler::spawn(
            "chronos-ttl",
            Duration::from_secs(config.ttl.interval_s),
            move || {
                ttl.adjust_all();
            },
        ));
    }

    if let Some(snapshot) = snapshot.clone() {
        schedulers.push(Scheduler::spawn(
            "chronos-snapshot",
            Duration::from_secs(config.snapshot.interval_s),
            move || {
                if let Err(e) = snapshot.save() {
                    tracing::error!(error = %e, "snapshot write failed");
                }
            },
        ));
    }

    schedulers.push(Scheduler::spawn(
        "chronos-health",
        Duration::from_secs(config.health.interval_s),
        {
            let health = health.clone();
            move || {
                health.run_check();
            }
        },
    ));

    let admin = admin::start(config.server.admin_listen, ctx.clone())?;

    // Foreground: the RESP accept loop owns this thread until shutdown.
    let result = server::run(&config, ctx.clone(), shutdown);

    tracing::info!("shutting down background subsystems");
    for scheduler in schedulers {
        scheduler.stop();
    }
    if let Some(snapshot) = &snapshot {
        match snapshot.save() {
            Ok(written) => tracing::info!(written, "final snapshot saved"),
            Err(e) => tracing::error!(error = %e, "final snapshot failed"),
        }
    }
    if let Some(prefetcher) = &prefetcher {
        prefetcher.shutdown();
    }
    admin.shutdown();
    tracing::info!("shutdown complete");

    result
}
