//! Command execution: maps protocol verbs onto store operations.
//!
//! Size validation lives here, before anything reaches a segment: keys over
//! 1024 bytes and values over 10 MiB are rejected with a per-command error
//! while the connection stays open. Every completed read is reported to the
//! prefetcher; hash-changing SETs feed the volatility estimator.

use std::time::Instant;

use bytes::{Bytes, BytesMut};

use chronos_cache::{MAX_KEY_LEN, MAX_VALUE_LEN};
use chronos_resp::{
    Command, write_array_header, write_bulk_string, write_error, write_integer, write_null_bulk,
    write_simple_string,
};

use crate::context::AppContext;
use crate::glob::glob_match;
use crate::metrics::{DELETES, EXPIRES, FLUSHES, GETS, SETS, VALIDATION_ERRORS};

/// Execute one parsed command, appending the reply to `write_buf`.
pub fn execute(ctx: &AppContext, cmd: &Command<'_>, write_buf: &mut BytesMut) {
    let started = Instant::now();

    match cmd {
        Command::Ping { message } => match message {
            Some(msg) => write_bulk_string(write_buf, msg),
            None => write_simple_string(write_buf, b"PONG"),
        },

        Command::Get { key } => {
            GETS.increment();
            let key = match validated_key(key, write_buf) {
                Some(k) => k,
                None => return,
            };

            match ctx.store.get(&key) {
                Some(value) => {
                    write_bulk_string(write_buf, &value);
                    if let Some(prefetcher) = &ctx.prefetcher {
                        prefetcher.on_read_hit(&key);
                    }
                }
                None => write_null_bulk(write_buf),
            }

            // The prefetcher hears about every completed read, hit or miss.
            if let Some(prefetcher) = &ctx.prefetcher {
                prefetcher.record_access(&key);
            }
            if let Some(warmer) = &ctx.warmer {
                warmer.record_access(&key);
            }
        }

        Command::Set { key, value, ex, px } => {
            SETS.increment();
            let key = match validated_key(key, write_buf) {
                Some(k) => k,
                None => return,
            };
            if value.len() > MAX_VALUE_LEN {
                VALIDATION_ERRORS.increment();
                write_error(write_buf, "ERR value too large");
                return;
            }

            // EX wins when both are given; PX floors to whole seconds.
            let ttl_seconds = match (ex, px) {
                (Some(seconds), _) => *seconds,
                (None, Some(millis)) => *millis / 1000,
                (None, None) => 0,
            };

            let outcome = ctx
                .store
                .put(key.clone(), Bytes::copy_from_slice(value), ttl_seconds);
            if let Some(ttl) = &ctx.ttl {
                ttl.observe_put(&key, &outcome);
            }
            write_simple_string(write_buf, b"OK");
        }

        Command::Del { keys } => {
            DELETES.increment();
            let mut parsed = Vec::with_capacity(keys.len());
            for raw in keys {
                match validated_key(raw, write_buf) {
                    Some(k) => parsed.push(k),
                    None => return,
                }
            }

            let mut removed = 0i64;
            for key in &parsed {
                if ctx.store.delete(key) {
                    removed += 1;
                }
            }
            write_integer(write_buf, removed);
        }

        Command::Expire { key, seconds } => {
            EXPIRES.increment();
            let key = match validated_key(key, write_buf) {
                Some(k) => k,
                None => return,
            };
            let applied = ctx.store.expire(&key, *seconds);
            write_integer(write_buf, if applied { 1 } else { 0 });
        }

        Command::Ttl { key } => {
            let key = match validated_key(key, write_buf) {
                Some(k) => k,
                None => return,
            };
            write_integer(write_buf, ctx.store.ttl(&key));
        }

        Command::Keys { pattern } => {
            let pattern = String::from_utf8_lossy(pattern);
            let matched: Vec<String> = ctx
                .store
                .keys()
                .into_iter()
                .filter(|key| glob_match(&pattern, key))
                .collect();

            write_array_header(write_buf, matched.len());
            for key in &matched {
                write_bulk_string(write_buf, key.as_bytes());
            }
        }

        Command::FlushAll => {
            FLUSHES.increment();
            ctx.store.clear();
            write_simple_string(write_buf, b"OK");
        }

        Command::Info => {
            let info = build_info(ctx);
            write_bulk_string(write_buf, info.as_bytes());
        }
    }

    ctx.metrics.record_operation(started.elapsed());
}

/// Decode and length-check a key, emitting the error reply on failure.
fn validated_key(raw: &[u8], write_buf: &mut BytesMut) -> Option<String> {
    if raw.len() > MAX_KEY_LEN {
        VALIDATION_ERRORS.increment();
        write_error(write_buf, "ERR key too long");
        return None;
    }
    Some(String::from_utf8_lossy(raw).into_owned())
}

/// Human-readable stats for the INFO command.
fn build_info(ctx: &AppContext) -> String {
    let snapshot = ctx.metrics.snapshot();
    let mut info = String::with_capacity(512);

    info.push_str("# Server\r\n");
    info.push_str(&format!("uptime_seconds:{}\r\n", ctx.uptime_seconds()));
    info.push_str(&format!("segments:{}\r\n", ctx.store.segment_count()));

    info.push_str("\r\n# Stats\r\n");
    info.push_str(&format!("hits:{}\r\n", snapshot.hits));
    info.push_str(&format!("misses:{}\r\n", snapshot.misses));
    info.push_str(&format!("hit_rate:{:.2}\r\n", snapshot.hit_rate * 100.0));
    info.push_str(&format!("evictions:{}\r\n", snapshot.evictions));
    info.push_str(&format!("memory_bytes:{}\r\n", snapshot.memory_bytes));
    info.push_str(&format!("keys:{}\r\n", snapshot.entry_count));
    info.push_str(&format!("total_operations:{}\r\n", snapshot.total_operations));

    info.push_str("\r\n# Latency\r\n");
    info.push_str(&format!("p50_ms:{:.3}\r\n", snapshot.p50_latency_ms));
    info.push_str(&format!("p95_ms:{:.3}\r\n", snapshot.p95_latency_ms));
    info.push_str(&format!("p99_ms:{:.3}\r\n", snapshot.p99_latency_ms));

    if let Some(prefetcher) = &ctx.prefetcher {
        info.push_str("\r\n# Prefetch\r\n");
        info.push_str(&format!(
            "predictions_made:{}\r\n",
            prefetcher.predictions_made()
        ));
        info.push_str(&format!(
            "predictions_hit:{}\r\n",
            prefetcher.predictions_hit()
        ));
        info.push_str(&format!("accuracy:{:.3}\r\n", prefetcher.accuracy()));
    }

    info
}
