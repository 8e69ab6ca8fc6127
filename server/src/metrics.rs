//! Server-side request counters.
//!
//! Registered with metriken so the admin endpoint can walk the registry and
//! emit them in Prometheus text format alongside the engine gauges.

use metriken::{Counter, Gauge, metric};

#[metric(
    name = "chronos_connections_accepted_total",
    description = "Total client connections accepted"
)]
pub static CONNECTIONS_ACCEPTED: Counter = Counter::new();

#[metric(
    name = "chronos_connections_active",
    description = "Currently active client connections"
)]
pub static CONNECTIONS_ACTIVE: Gauge = Gauge::new();

#[metric(name = "chronos_cmd_get_total", description = "GET commands handled")]
pub static GETS: Counter = Counter::new();

#[metric(name = "chronos_cmd_set_total", description = "SET commands handled")]
pub static SETS: Counter = Counter::new();

#[metric(name = "chronos_cmd_del_total", description = "DEL commands handled")]
pub static DELETES: Counter = Counter::new();

#[metric(
    name = "chronos_cmd_expire_total",
    description = "EXPIRE commands handled"
)]
pub static EXPIRES: Counter = Counter::new();

#[metric(
    name = "chronos_cmd_flush_total",
    description = "FLUSHALL commands handled"
)]
pub static FLUSHES: Counter = Counter::new();

#[metric(
    name = "chronos_validation_errors_total",
    description = "Commands rejected for oversized keys/values or bad arguments"
)]
pub static VALIDATION_ERRORS: Counter = Counter::new();

#[metric(
    name = "chronos_protocol_errors_total",
    description = "Connections that sent malformed RESP frames"
)]
pub static PROTOCOL_ERRORS: Counter = Counter::new();
