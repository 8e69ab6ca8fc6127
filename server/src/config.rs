//! Server configuration.
//!
//! Loaded from a TOML file; every table has defaults matching the documented
//! production values, so an empty file is a valid configuration.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use chronos_cache::{
    HealthConfig, PolicyKind, PrefetchConfig, SnapshotConfig, StoreConfig, TtlConfig,
};

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub cache: CacheSection,

    #[serde(default)]
    pub prefetch: PrefetchSection,

    #[serde(default)]
    pub ttl: TtlSection,

    #[serde(default)]
    pub snapshot: SnapshotSection,

    #[serde(default)]
    pub health: HealthSection,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Listener addresses and runtime sizing.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// RESP listener address.
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,

    /// Admin HTTP listener address (health, metrics, stats).
    #[serde(default = "default_admin_listen")]
    pub admin_listen: SocketAddr,

    /// Tokio worker threads (default: number of CPUs).
    pub worker_threads: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            admin_listen: default_admin_listen(),
            worker_threads: None,
        }
    }
}

/// `[cache]` table.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheSection {
    /// Segment count; rounded up to the next power of two.
    #[serde(default = "default_segments")]
    pub segments: usize,

    /// Total memory budget (e.g., "2GB", "512MB", or plain bytes).
    #[serde(
        default = "default_max_memory",
        deserialize_with = "deserialize_size"
    )]
    pub max_memory_bytes: u64,

    /// Eviction policy: "lru" or "lfu".
    #[serde(default = "default_policy", deserialize_with = "deserialize_policy")]
    pub eviction_policy: PolicyKind,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            segments: default_segments(),
            max_memory_bytes: default_max_memory(),
            eviction_policy: default_policy(),
        }
    }
}

impl CacheSection {
    pub fn to_store_config(&self) -> StoreConfig {
        StoreConfig {
            segments: self.segments,
            max_memory_bytes: self.max_memory_bytes,
            eviction_policy: self.eviction_policy,
        }
    }
}

/// `[prefetch]` table.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PrefetchSection {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    #[serde(default = "default_window")]
    pub window: usize,
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_expiry_ms")]
    pub expiry_ms: u64,
    #[serde(default = "default_fill_ttl")]
    pub fill_ttl_s: u64,
}

impl Default for PrefetchSection {
    fn default() -> Self {
        Self {
            enabled: true,
            confidence: default_confidence(),
            window: default_window(),
            top_n: default_top_n(),
            workers: default_workers(),
            expiry_ms: default_expiry_ms(),
            fill_ttl_s: default_fill_ttl(),
        }
    }
}

impl PrefetchSection {
    pub fn to_prefetch_config(&self) -> PrefetchConfig {
        PrefetchConfig {
            enabled: self.enabled,
            confidence: self.confidence,
            window: self.window,
            top_n: self.top_n,
            workers: self.workers,
            expiry_ms: self.expiry_ms,
            fill_ttl_s: self.fill_ttl_s,
        }
    }
}

/// `[ttl]` table.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TtlSection {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_ttl_interval")]
    pub interval_s: u64,
    #[serde(default = "default_ttl_base")]
    pub base_s: u64,
    #[serde(default = "default_min_mult")]
    pub min_mult: f64,
    #[serde(default = "default_max_mult")]
    pub max_mult: f64,
    #[serde(default = "default_deadband")]
    pub deadband: f64,
}

impl Default for TtlSection {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_s: default_ttl_interval(),
            base_s: default_ttl_base(),
            min_mult: default_min_mult(),
            max_mult: default_max_mult(),
            deadband: default_deadband(),
        }
    }
}

impl TtlSection {
    pub fn to_ttl_config(&self) -> TtlConfig {
        TtlConfig {
            enabled: self.enabled,
            interval_s: self.interval_s,
            base_s: self.base_s,
            min_mult: self.min_mult,
            max_mult: self.max_mult,
            deadband: self.deadband,
        }
    }
}

/// `[snapshot]` table.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SnapshotSection {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_snapshot_interval")]
    pub interval_s: u64,
    #[serde(default = "default_snapshot_path")]
    pub path: PathBuf,
}

impl Default for SnapshotSection {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_s: default_snapshot_interval(),
            path: default_snapshot_path(),
        }
    }
}

impl SnapshotSection {
    pub fn to_snapshot_config(&self) -> SnapshotConfig {
        SnapshotConfig {
            enabled: self.enabled,
            interval_s: self.interval_s,
            path: self.path.clone(),
        }
    }
}

/// `[health]` table.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HealthSection {
    #[serde(default = "default_health_interval")]
    pub interval_s: u64,
}

impl Default for HealthSection {
    fn default() -> Self {
        Self {
            interval_s: default_health_interval(),
        }
    }
}

impl HealthSection {
    pub fn to_health_config(&self) -> HealthConfig {
        HealthConfig {
            interval_s: self.interval_s,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Compact,
    Json,
}

/// `[logging]` table.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level filter when RUST_LOG is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,

    /// Include event targets in output.
    #[serde(default = "default_true")]
    pub target: bool,

    /// Include timestamps in output.
    #[serde(default = "default_true")]
    pub timestamps: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            target: true,
            timestamps: true,
        }
    }
}

// Default value functions

fn default_listen() -> SocketAddr {
    "0.0.0.0:6380".parse().unwrap()
}

fn default_admin_listen() -> SocketAddr {
    "0.0.0.0:8080".parse().unwrap()
}

fn default_segments() -> usize {
    256
}

fn default_max_memory() -> u64 {
    2 * 1024 * 1024 * 1024
}

fn default_policy() -> PolicyKind {
    PolicyKind::Lru
}

fn default_true() -> bool {
    true
}

fn default_confidence() -> f64 {
    0.6
}

fn default_window() -> usize {
    10
}

fn default_top_n() -> usize {
    3
}

fn default_workers() -> usize {
    4
}

fn default_expiry_ms() -> u64 {
    30_000
}

fn default_fill_ttl() -> u64 {
    3600
}

fn default_ttl_interval() -> u64 {
    300
}

fn default_ttl_base() -> u64 {
    3600
}

fn default_min_mult() -> f64 {
    0.1
}

fn default_max_mult() -> f64 {
    10.0
}

fn default_deadband() -> f64 {
    0.2
}

fn default_snapshot_interval() -> u64 {
    300
}

fn default_snapshot_path() -> PathBuf {
    PathBuf::from("./data/chronos.snapshot")
}

fn default_health_interval() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Deserialize a size as either an integer byte count or a string like
/// "64MB" / "2GB".
fn deserialize_size<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum SizeValue {
        Number(u64),
        String(String),
    }

    match SizeValue::deserialize(deserializer)? {
        SizeValue::Number(n) => Ok(n),
        SizeValue::String(s) => parse_size(&s).map_err(D::Error::custom),
    }
}

/// Parse a size string like "64MB", "4GB" into bytes.
pub fn parse_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty size string".to_string());
    }

    let (num_str, suffix) = match s.find(|c: char| c.is_alphabetic()) {
        Some(idx) => (&s[..idx], s[idx..].to_uppercase()),
        None => (s, String::new()),
    };

    let num: u64 = num_str
        .trim()
        .parse()
        .map_err(|_| format!("invalid number: {}", num_str))?;

    let multiplier: u64 = match suffix.as_str() {
        "" | "B" => 1,
        "K" | "KB" | "KIB" => 1024,
        "M" | "MB" | "MIB" => 1024 * 1024,
        "G" | "GB" | "GIB" => 1024 * 1024 * 1024,
        "T" | "TB" | "TIB" => 1024u64.pow(4),
        _ => return Err(format!("unknown size suffix: {}", suffix)),
    };

    num.checked_mul(multiplier)
        .ok_or_else(|| "size overflow".to_string())
}

fn deserialize_policy<'de, D>(deserializer: D) -> Result<PolicyKind, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;
    let s = String::deserialize(deserializer)?;
    s.parse().map_err(D::Error::custom)
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate cross-field constraints.
    pub fn validate(&self) -> Result<(), Box<dyn std::error::Error>> {
        if self.cache.max_memory_bytes == 0 {
            return Err("max_memory_bytes must be non-zero".into());
        }
        if !(0.0..=1.0).contains(&self.prefetch.confidence) {
            return Err(format!(
                "prefetch.confidence must be within [0.0, 1.0], got {}",
                self.prefetch.confidence
            )
            .into());
        }
        if self.ttl.min_mult > self.ttl.max_mult {
            return Err(format!(
                "ttl.min_mult ({}) must not exceed ttl.max_mult ({})",
                self.ttl.min_mult, self.ttl.max_mult
            )
            .into());
        }
        if self.ttl.enabled && self.ttl.interval_s == 0 {
            return Err("ttl.interval_s must be non-zero when ttl is enabled".into());
        }
        if self.snapshot.enabled && self.snapshot.interval_s == 0 {
            return Err("snapshot.interval_s must be non-zero when snapshots are enabled".into());
        }
        Ok(())
    }

    /// Tokio worker thread count.
    pub fn worker_threads(&self) -> usize {
        self.server
            .worker_threads
            .unwrap_or_else(num_cpus::get)
            .max(1)
    }
}
