//! Health scoring.
//!
//! Distills hit rate, tail latency, and eviction pressure into a single
//! 0-100 score with one remediation-bearing issue per deduction. The
//! eviction rate is measured from the counter delta between checks.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Mutex, RwLock};

use crate::metrics::{MetricsCollector, MetricsSnapshot};

/// Issue severity, ordered from least to most pressing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

/// A single diagnosed problem with a remediation hint.
#[derive(Debug, Clone)]
pub struct HealthIssue {
    pub severity: Severity,
    pub message: String,
}

/// Result of one health check.
#[derive(Debug, Clone)]
pub struct HealthReport {
    pub score: u32,
    pub issues: Vec<HealthIssue>,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.score > 70
    }

    pub fn status(&self) -> &'static str {
        if self.is_healthy() { "healthy" } else { "degraded" }
    }
}

struct EvictionBaseline {
    at: Instant,
    evictions: u64,
}

/// Periodic health scorer over a [`MetricsCollector`].
pub struct HealthMonitor {
    metrics: Arc<MetricsCollector>,
    baseline: Mutex<Option<EvictionBaseline>>,
    last_report: RwLock<Option<HealthReport>>,
}

impl HealthMonitor {
    pub fn new(metrics: Arc<MetricsCollector>) -> Self {
        Self {
            metrics,
            baseline: Mutex::new(None),
            last_report: RwLock::new(None),
        }
    }

    /// Run one health check and remember the result.
    pub fn run_check(&self) {
        let report = self.diagnose();
        if !report.issues.is_empty() {
            tracing::info!(
                score = report.score,
                issues = report.issues.len(),
                "health check"
            );
            for issue in &report.issues {
                if issue.severity == Severity::High {
                    tracing::warn!(issue = %issue.message, "health issue");
                }
            }
        }
        *self.last_report.write() = Some(report);
    }

    /// The most recent report, computing one on demand if no check ran yet.
    pub fn last_report(&self) -> HealthReport {
        if let Some(report) = self.last_report.read().as_ref() {
            return report.clone();
        }
        self.diagnose()
    }

    /// Score the current metrics snapshot.
    pub fn diagnose(&self) -> HealthReport {
        let snapshot = self.metrics.snapshot();
        let eviction_rate = self.eviction_rate(&snapshot);

        let mut score: i32 = 100;
        let mut issues = Vec::new();

        if snapshot.hit_rate < 0.5 {
            score -= 30;
            issues.push(HealthIssue {
                severity: Severity::High,
                message: format!(
                    "Low hit rate ({:.1}%). Consider increasing cache size, \
                     adjusting the eviction policy, or enabling prefetching.",
                    snapshot.hit_rate * 100.0
                ),
            });
        } else if snapshot.hit_rate < 0.7 {
            score -= 15;
            issues.push(HealthIssue {
                severity: Severity::Medium,
                message: format!(
                    "Moderate hit rate ({:.1}%). Review working-set size \
                     against the configured memory budget.",
                    snapshot.hit_rate * 100.0
                ),
            });
        }

        if snapshot.p99_latency_ms > 10.0 {
            score -= 20;
            issues.push(HealthIssue {
                severity: Severity::High,
                message: format!(
                    "High P99 latency ({:.2}ms). Check lock contention and \
                     value sizes; consider more segments.",
                    snapshot.p99_latency_ms
                ),
            });
        } else if snapshot.p99_latency_ms > 5.0 {
            score -= 10;
            issues.push(HealthIssue {
                severity: Severity::Medium,
                message: format!(
                    "Elevated P99 latency ({:.2}ms). Watch for large values \
                     or hot segments.",
                    snapshot.p99_latency_ms
                ),
            });
        }

        if eviction_rate > 100.0 {
            score -= 25;
            issues.push(HealthIssue {
                severity: Severity::High,
                message: format!(
                    "High eviction rate ({:.1}/s). The cache is undersized; \
                     increase max memory.",
                    eviction_rate
                ),
            });
        } else if eviction_rate > 50.0 {
            score -= 15;
            issues.push(HealthIssue {
                severity: Severity::Medium,
                message: format!(
                    "Elevated eviction rate ({:.1}/s). Memory pressure is \
                     building; consider a larger budget.",
                    eviction_rate
                ),
            });
        }

        HealthReport {
            score: score.max(0) as u32,
            issues,
        }
    }

    /// Evictions per second since the previous check; 0 on the first call.
    fn eviction_rate(&self, snapshot: &MetricsSnapshot) -> f64 {
        let mut baseline = self.baseline.lock();
        let rate = match baseline.as_ref() {
            Some(prev) => {
                let elapsed = prev.at.elapsed().as_secs_f64();
                if elapsed <= 0.0 {
                    0.0
                } else {
                    snapshot.evictions.saturating_sub(prev.evictions) as f64 / elapsed
                }
            }
            None => 0.0,
        };
        *baseline = Some(EvictionBaseline {
            at: Instant::now(),
            evictions: snapshot.evictions,
        });
        rate
    }
}
