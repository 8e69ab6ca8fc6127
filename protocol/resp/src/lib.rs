//! RESP2 protocol support for the chronos cache server.
//!
//! This crate parses client request frames into structured [`Command`]s and
//! provides encoding helpers for the reply types the server emits. Parsing is
//! zero-copy: command arguments borrow from the input buffer.

mod command;
mod encode;
mod error;

pub use command::Command;
pub use encode::{
    write_array_header, write_bulk_string, write_error, write_integer, write_null_bulk,
    write_simple_string,
};
pub use error::ParseError;

/// Options controlling request parsing limits.
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Maximum accepted bulk string length in bytes.
    ///
    /// This is a framing limit, not the server's value-size limit; it only
    /// exists to bound allocation for hostile length prefixes. Size policy
    /// (key/value limits) is enforced by the command dispatcher.
    pub max_bulk_string_len: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            // Comfortably above the 10 MiB value limit so oversized values
            // reach the dispatcher and produce a validation error instead of
            // tearing down the connection.
            max_bulk_string_len: 16 * 1024 * 1024,
        }
    }
}
