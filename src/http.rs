//! Minimal HTTP/1.1 response-head parsing.
//!
//! Just enough for the two transit endpoints this device talks to: the
//! status line and a scan of the header block that captures
//! `Content-Length`. Everything else in the head is discarded. Bodies are
//! read by the caller, bounded by the captured length.

use thiserror::Error;

use crate::net::ByteStream;

/// Parsed status line and the headers we care about.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResponseHead {
    /// Numeric HTTP status, e.g. 200 or 400.
    pub status: u16,
    /// Declared body length, when the server sent one.
    pub content_length: Option<usize>,
}

/// Failure to read a response head off the wire.
#[derive(Error, Debug)]
pub enum HeadError {
    /// The response did not start with a parseable `HTTP/..` status line.
    #[error("response did not start with an HTTP status line")]
    BadStatusLine,

    /// Transport failure while reading the head.
    #[error("transport error while reading response head: {0}")]
    Io(#[from] std::io::Error),
}

/// Read the status line and header block up to the blank separator line.
pub fn read_head<S: ByteStream + ?Sized>(stream: &mut S) -> Result<ResponseHead, HeadError> {
    let status_line = stream.read_line()?;
    let status = parse_status_line(&status_line).ok_or(HeadError::BadStatusLine)?;

    let mut content_length = None;
    loop {
        let line = stream.read_line()?;
        let line = line.trim_end_matches(['\r', '\n']);
        // Blank line ends the head; so does end of stream.
        if line.is_empty() {
            break;
        }
        if let Some(value) = header_value(line, "content-length") {
            content_length = value.trim().parse().ok();
        }
    }

    Ok(ResponseHead {
        status,
        content_length,
    })
}

/// Extract the numeric status from a line like `HTTP/1.1 200 OK`.
fn parse_status_line(line: &str) -> Option<u16> {
    let rest = line.strip_prefix("HTTP/")?;
    rest.split_whitespace().nth(1)?.parse().ok()
}

/// Case-insensitive header lookup on a single `Name: value` line.
fn header_value<'a>(line: &'a str, name: &str) -> Option<&'a str> {
    let (field, value) = line.split_once(':')?;
    field.trim().eq_ignore_ascii_case(name).then_some(value)
}
