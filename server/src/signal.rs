//! Signal handling for graceful shutdown.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Install handlers for SIGINT and SIGTERM.
///
/// Returns a flag that flips to `true` when a shutdown signal arrives.
/// A second signal forces an immediate exit.
pub fn install_signal_handler() -> Arc<AtomicBool> {
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_flag = shutdown.clone();

    ctrlc::set_handler(move || {
        if shutdown_flag.swap(true, Ordering::SeqCst) {
            tracing::warn!("second signal received, forcing immediate exit");
            std::process::exit(1);
        }
        tracing::info!("shutdown signal received, draining...");
    })
    .expect("failed to set signal handler");

    shutdown
}
