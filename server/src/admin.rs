//! HTTP admin endpoints: health, Prometheus metrics, and a JSON stats dump.
//!
//! Runs in its own thread on a single-threaded tokio runtime so admin
//! traffic never competes with the cache request loops.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;

use crate::context::AppContext;

/// Handle returned by [`start`] for shutdown coordination.
pub struct AdminHandle {
    shutdown_tx: tokio::sync::oneshot::Sender<()>,
    join_handle: std::thread::JoinHandle<()>,
}

impl AdminHandle {
    /// Signal the admin server to shut down and wait for it to finish.
    pub fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        let _ = self.join_handle.join();
    }
}

/// Start the admin server on a dedicated thread.
pub fn start(address: SocketAddr, ctx: Arc<AppContext>) -> std::io::Result<AdminHandle> {
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    let join_handle = std::thread::Builder::new()
        .name("chronos-admin".to_string())
        .spawn(move || {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("failed to create admin runtime");

            rt.block_on(async move {
                run_admin_server(address, ctx, shutdown_rx).await;
            });
        })?;

    Ok(AdminHandle {
        shutdown_tx,
        join_handle,
    })
}

async fn run_admin_server(
    address: SocketAddr,
    ctx: Arc<AppContext>,
    shutdown_rx: tokio::sync::oneshot::Receiver<()>,
) {
    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/stats", get(stats_handler))
        .with_state(ctx);

    let listener = match tokio::net::TcpListener::bind(address).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(error = %e, address = %address, "failed to bind admin server");
            return;
        }
    };

    tracing::info!(address = %address, "admin server listening");

    let server = axum::serve(listener, app);
    tokio::select! {
        result = server => {
            if let Err(e) = result {
                tracing::error!(error = %e, "admin server error");
            }
        }
        _ = shutdown_rx => {
            tracing::debug!("admin server received shutdown signal");
        }
    }
}

/// `GET /health`: the health report as JSON; 503 once the score drops to
/// 70 or below.
async fn health_handler(State(ctx): State<Arc<AppContext>>) -> impl IntoResponse {
    let report = ctx.health.last_report();
    let snapshot = ctx.metrics.snapshot();

    let status = if report.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let issues: Vec<_> = report
        .issues
        .iter()
        .map(|issue| {
            json!({
                "severity": issue.severity.as_str(),
                "message": issue.message,
            })
        })
        .collect();

    let body = json!({
        "score": report.score,
        "status": report.status(),
        "issues": issues,
        "hitRate": snapshot.hit_rate,
        "p99Latency": snapshot.p99_latency_ms,
        "memoryUsage": snapshot.memory_bytes,
    });

    (status, Json(body))
}

/// `GET /metrics`: Prometheus text exposition.
async fn metrics_handler(State(ctx): State<Arc<AppContext>>) -> impl IntoResponse {
    let output = prometheus_output(&ctx);
    (
        StatusCode::OK,
        [("Content-Type", "text/plain; version=0.0.4; charset=utf-8")],
        output,
    )
}

/// `GET /stats`: every counter and percentile as JSON.
async fn stats_handler(State(ctx): State<Arc<AppContext>>) -> impl IntoResponse {
    let snapshot = ctx.metrics.snapshot();

    let mut body = json!({
        "hits": snapshot.hits,
        "misses": snapshot.misses,
        "hitRate": snapshot.hit_rate,
        "evictions": snapshot.evictions,
        "memoryBytes": snapshot.memory_bytes,
        "entryCount": snapshot.entry_count,
        "totalOperations": snapshot.total_operations,
        "latency": {
            "p50Ms": snapshot.p50_latency_ms,
            "p95Ms": snapshot.p95_latency_ms,
            "p99Ms": snapshot.p99_latency_ms,
        },
        "uptimeSeconds": ctx.uptime_seconds(),
    });

    if let Some(prefetcher) = &ctx.prefetcher {
        body["prefetch"] = json!({
            "predictionsMade": prefetcher.predictions_made(),
            "predictionsHit": prefetcher.predictions_hit(),
            "accuracy": prefetcher.accuracy(),
        });
    }

    Json(body)
}

/// Build the Prometheus exposition: engine metrics first, then every
/// counter and gauge registered with metriken.
fn prometheus_output(ctx: &AppContext) -> String {
    let snapshot = ctx.metrics.snapshot();
    let mut output = String::with_capacity(4096);

    output.push_str("# TYPE chronos_hits_total counter\n");
    output.push_str(&format!("chronos_hits_total {}\n", snapshot.hits));
    output.push_str("# TYPE chronos_misses_total counter\n");
    output.push_str(&format!("chronos_misses_total {}\n", snapshot.misses));
    output.push_str("# TYPE chronos_evictions_total counter\n");
    output.push_str(&format!("chronos_evictions_total {}\n", snapshot.evictions));
    output.push_str("# TYPE chronos_hit_rate gauge\n");
    output.push_str(&format!("chronos_hit_rate {}\n", snapshot.hit_rate));
    output.push_str("# TYPE chronos_memory_bytes gauge\n");
    output.push_str(&format!("chronos_memory_bytes {}\n", snapshot.memory_bytes));
    output.push_str("# TYPE chronos_entries gauge\n");
    output.push_str(&format!("chronos_entries {}\n", snapshot.entry_count));

    output.push_str("# TYPE chronos_latency_milliseconds summary\n");
    for (quantile, value) in [
        ("0.5", snapshot.p50_latency_ms),
        ("0.95", snapshot.p95_latency_ms),
        ("0.99", snapshot.p99_latency_ms),
    ] {
        output.push_str(&format!(
            "chronos_latency_milliseconds{{quantile=\"{}\"}} {}\n",
            quantile, value
        ));
    }

    if let Some(prefetcher) = &ctx.prefetcher {
        output.push_str("# TYPE chronos_predictions_made_total counter\n");
        output.push_str(&format!(
            "chronos_predictions_made_total {}\n",
            prefetcher.predictions_made()
        ));
        output.push_str("# TYPE chronos_predictions_hit_total counter\n");
        output.push_str(&format!(
            "chronos_predictions_hit_total {}\n",
            prefetcher.predictions_hit()
        ));
        output.push_str("# TYPE chronos_prefetch_accuracy gauge\n");
        output.push_str(&format!(
            "chronos_prefetch_accuracy {}\n",
            prefetcher.accuracy()
        ));
    }

    // Registered request counters (connections, per-verb totals, errors).
    for metric in metriken::metrics().iter() {
        let name = metric.name();
        if name.is_empty() {
            continue;
        }
        let value = match metric.value() {
            Some(v) => v,
            None => continue,
        };

        let prom_name: String = name
            .chars()
            .map(|c: char| {
                if c.is_ascii_alphanumeric() || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();

        match value {
            metriken::Value::Counter(v) => {
                output.push_str(&format!("# TYPE {} counter\n", prom_name));
                output.push_str(&format!("{} {}\n", prom_name, v));
            }
            metriken::Value::Gauge(v) => {
                output.push_str(&format!("# TYPE {} gauge\n", prom_name));
                output.push_str(&format!("{} {}\n", prom_name, v));
            }
            _ => {}
        }
    }

    output
}
