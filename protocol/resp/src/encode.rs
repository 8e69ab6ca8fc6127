//! Response encoding helpers.
//!
//! Writes RESP2 reply frames into a `BytesMut`. Integers are formatted with
//! `itoa` to keep the hot path allocation-free.

use bytes::BytesMut;

/// Write a simple string reply: `+<text>\r\n`.
#[inline]
pub fn write_simple_string(buf: &mut BytesMut, text: &[u8]) {
    buf.extend_from_slice(b"+");
    buf.extend_from_slice(text);
    buf.extend_from_slice(b"\r\n");
}

/// Write an error reply: `-<message>\r\n`.
#[inline]
pub fn write_error(buf: &mut BytesMut, message: &str) {
    buf.extend_from_slice(b"-");
    buf.extend_from_slice(message.as_bytes());
    buf.extend_from_slice(b"\r\n");
}

/// Write an integer reply: `:<n>\r\n`.
#[inline]
pub fn write_integer(buf: &mut BytesMut, n: i64) {
    let mut int_buf = itoa::Buffer::new();
    buf.extend_from_slice(b":");
    buf.extend_from_slice(int_buf.format(n).as_bytes());
    buf.extend_from_slice(b"\r\n");
}

/// Write a bulk string reply: `$<len>\r\n<data>\r\n`.
#[inline]
pub fn write_bulk_string(buf: &mut BytesMut, value: &[u8]) {
    let mut len_buf = itoa::Buffer::new();
    buf.reserve(1 + 20 + 2 + value.len() + 2);
    buf.extend_from_slice(b"$");
    buf.extend_from_slice(len_buf.format(value.len()).as_bytes());
    buf.extend_from_slice(b"\r\n");
    buf.extend_from_slice(value);
    buf.extend_from_slice(b"\r\n");
}

/// Write a null bulk reply: `$-1\r\n`.
#[inline]
pub fn write_null_bulk(buf: &mut BytesMut) {
    buf.extend_from_slice(b"$-1\r\n");
}

/// Write an array header: `*<len>\r\n`. Elements follow separately.
#[inline]
pub fn write_array_header(buf: &mut BytesMut, len: usize) {
    let mut len_buf = itoa::Buffer::new();
    buf.extend_from_slice(b"*");
    buf.extend_from_slice(len_buf.format(len).as_bytes());
    buf.extend_from_slice(b"\r\n");
}
