//! Per-connection state: buffered parsing and reply accumulation.

use bytes::{Buf, BytesMut};

use chronos_resp::{Command, ParseError, write_error};

use crate::context::AppContext;
use crate::execute::execute;
use crate::metrics::{PROTOCOL_ERRORS, VALIDATION_ERRORS};

/// Stop parsing new requests once this much reply data is unsent.
const MAX_PENDING_WRITE: usize = 256 * 1024;

/// State for one client connection.
pub struct Connection {
    read_buf: BytesMut,
    write_buf: BytesMut,
    write_pos: usize,
    should_close: bool,
}

impl Default for Connection {
    fn default() -> Self {
        Self::new()
    }
}

impl Connection {
    pub fn new() -> Self {
        Self {
            read_buf: BytesMut::with_capacity(16 * 1024),
            write_buf: BytesMut::with_capacity(16 * 1024),
            write_pos: 0,
            should_close: false,
        }
    }

    /// Append bytes received from the socket.
    pub fn append_recv_data(&mut self, data: &[u8]) {
        self.read_buf.extend_from_slice(data);
    }

    /// Parse and execute every complete command in the read buffer.
    pub fn process(&mut self, ctx: &AppContext) {
        if self.write_pos >= self.write_buf.len() {
            self.write_buf.clear();
            self.write_pos = 0;
        }

        loop {
            if self.read_buf.is_empty() || self.should_close {
                break;
            }
            if self.write_buf.len() - self.write_pos > MAX_PENDING_WRITE {
                break; // backpressure: flush before parsing more
            }

            match Command::parse(&self.read_buf) {
                Ok((cmd, consumed)) => {
                    execute(ctx, &cmd, &mut self.write_buf);
                    self.read_buf.advance(consumed);
                }
                Err(ParseError::Incomplete) => break,
                Err(ParseError::WrongArity(msg)) => {
                    // Validation-level problem: report and keep serving.
                    // The buffered tail is dropped to resynchronize.
                    VALIDATION_ERRORS.increment();
                    write_error(&mut self.write_buf, &format!("ERR {}", msg));
                    self.read_buf.clear();
                    break;
                }
                Err(ParseError::UnknownCommand(name)) => {
                    VALIDATION_ERRORS.increment();
                    write_error(
                        &mut self.write_buf,
                        &format!("ERR unknown command '{}'", name),
                    );
                    self.read_buf.clear();
                    break;
                }
                Err(e) => {
                    // Grammar violation: the stream cannot be trusted.
                    // Report, then close once the reply drains.
                    PROTOCOL_ERRORS.increment();
                    write_error(&mut self.write_buf, &format!("ERR protocol error: {}", e));
                    self.read_buf.clear();
                    self.should_close = true;
                    break;
                }
            }
        }
    }

    pub fn should_close(&self) -> bool {
        self.should_close
    }

    pub fn has_pending_write(&self) -> bool {
        self.write_pos < self.write_buf.len()
    }

    pub fn pending_write_data(&self) -> &[u8] {
        &self.write_buf[self.write_pos..]
    }

    pub fn advance_write(&mut self, n: usize) {
        self.write_pos += n;
        if self.write_pos >= self.write_buf.len() {
            self.write_buf.clear();
            self.write_pos = 0;
        }
    }
}
