//! # Transit API Protocol Client
//!
//! Hand-rolled GET client for the two transit endpoints this device uses:
//! `location.name` (free-text harbour search) and `departureBoard`
//! (upcoming departures). Runs over the abstract [`ByteStream`] transport,
//! strictly one request at a time.
//!
//! ## Error taxonomy
//!
//! Every protocol outcome is a [`TransitError`] variant the caller can act
//! on without string matching:
//! - connection-level ([`TransitError::Handshake`],
//!   [`TransitError::Timeout`]) — transient, retry the whole call later
//! - protocol-level ([`TransitError::BadStatus`],
//!   [`TransitError::MalformedHead`]) — unexpected response shape, retry
//!   with backoff
//! - semantic ([`TransitError::StaleLocationId`]) — the cached stop id is
//!   invalid, re-resolve before retrying
//! - semantic ([`TransitError::NoTrips`]) — nothing scheduled in the
//!   queried window, broaden it (query the next day)
//! - resource ([`TransitError::Oversize`]) — body exceeds the fixed parse
//!   ceiling, do not retry the same query unmodified
//! - data ([`TransitError::Json`]) — malformed body, retry after a cooldown
//!
//! ## Memory ceiling
//!
//! Bodies are parsed into typed structs naming only the fields we use
//! (serde drops the rest during deserialization), and any body whose
//! declared length exceeds [`MAX_BODY_BYTES`] is refused before a single
//! byte of it reaches the parser.

use std::io;
use std::time::Duration;

use log::{debug, warn};
use serde::Deserialize;
use thiserror::Error;

use crate::buffer::ArrivalBuffer;
use crate::config::ApiConfig;
use crate::http::{self, HeadError};
use crate::net::ByteStream;
use crate::{timefmt, Departure};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// How long to wait for the first response byte before giving up.
const RESPONSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Largest response body the parser's memory budget can take.
pub const MAX_BODY_BYTES: usize = 6000;

/// Departures requested per page; the buffer is filled across pages.
const MAX_JOURNEYS: u8 = 2;

/// API error code meaning the stop id is no longer valid.
const STALE_LOCATION_CODE: &str = "SVC_LOC";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Everything that can go wrong talking to the transit API.
///
/// None of these are fatal to the process; see the module docs for the
/// retry policy each class implies.
#[derive(Error, Debug)]
pub enum TransitError {
    /// Could not establish the connection; nothing was sent.
    #[error("connection to the transit API failed: {0}")]
    Handshake(#[source] io::Error),

    /// No response data arrived within the 5-second window.
    #[error("no response from the transit API within 5 seconds")]
    Timeout,

    /// The response did not start with a parseable HTTP status line.
    #[error("response did not start with an HTTP status line")]
    MalformedHead,

    /// The server answered with an unexpected status.
    #[error("transit API returned HTTP status {0}")]
    BadStatus(u16),

    /// The API rejected the stop id; it must be re-resolved.
    #[error("transit API rejected the stop id as stale")]
    StaleLocationId,

    /// No departures are scheduled in the queried window. Not a fault —
    /// the caller should broaden the window to the next day.
    #[error("no departures in the queried window")]
    NoTrips,

    /// The declared body length exceeds the fixed parse ceiling.
    #[error("response body of {0} bytes exceeds the 6000-byte ceiling")]
    Oversize(usize),

    /// The body was not the JSON document we expected.
    #[error("departure JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    /// The location search matched nothing.
    #[error("location search returned no match")]
    NoMatch,

    /// Transport failure after the connection was established.
    #[error("transport I/O failed: {0}")]
    Io(#[from] io::Error),
}

impl From<HeadError> for TransitError {
    fn from(err: HeadError) -> Self {
        match err {
            HeadError::BadStatusLine => TransitError::MalformedHead,
            HeadError::Io(e) => TransitError::Io(e),
        }
    }
}

// ---------------------------------------------------------------------------
// Continuation cursor
// ---------------------------------------------------------------------------

/// Continuation token for paging through the departure board.
///
/// Produced by [`poll_departures`] and passed back in by the caller; it
/// marks the date and one-minute-incremented time of the last departure
/// *considered* (kept or duplicate), so a follow-up query starts strictly
/// after it. `date` is `None` only before any dated record has been seen,
/// in which case just the `time` bound is sent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cursor {
    pub date: Option<String>,
    pub time: String,
}

// ---------------------------------------------------------------------------
// Wire shapes (field-filtered: serde drops everything not named here)
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct LocationResponse {
    #[serde(rename = "stopLocationOrCoordLocation", default)]
    locations: Vec<LocationEntry>,
}

#[derive(Deserialize)]
struct LocationEntry {
    #[serde(rename = "StopLocation")]
    stop: Option<StopLocation>,
}

#[derive(Deserialize)]
struct StopLocation {
    id: String,
}

#[derive(Deserialize)]
struct DepartureBoard {
    #[serde(rename = "Departure")]
    departures: Option<Vec<ApiDeparture>>,
}

#[derive(Deserialize)]
struct ApiDeparture {
    date: String,
    time: String,
    #[serde(default)]
    direction: String,
}

#[derive(Deserialize)]
struct ApiFault {
    #[serde(rename = "errorCode")]
    error_code: Option<String>,
}

// ---------------------------------------------------------------------------
// Location resolver
// ---------------------------------------------------------------------------

/// Resolve a free-text harbour name to the API's opaque stop id.
///
/// Issues a single `location.name` GET and takes the id of the first
/// matching stop location. An empty match list is a hard
/// [`TransitError::NoMatch`] — a typo'd harbour name is an operator
/// problem, not data corruption, and must not be retried blindly.
pub fn resolve_location<S: ByteStream + ?Sized>(
    stream: &mut S,
    config: &ApiConfig,
    query: &str,
) -> Result<String, TransitError> {
    let result = resolve_inner(stream, config, query);
    stream.close();
    result
}

fn resolve_inner<S: ByteStream + ?Sized>(
    stream: &mut S,
    config: &ApiConfig,
    query: &str,
) -> Result<String, TransitError> {
    stream
        .connect(&config.host, config.port)
        .map_err(TransitError::Handshake)?;
    debug!("resolving stop name '{query}'");

    let request = format!(
        "GET /api/location.name?maxNo=1&type=S&format=json&input={}&accessId={} HTTP/1.1\r\n\
         Host: {}\r\n\
         Connection: close\r\n\
         \r\n",
        percent_encode(query),
        config.key,
        config.host,
    );
    stream.send(request.as_bytes())?;

    if !stream.await_data(RESPONSE_TIMEOUT)? {
        return Err(TransitError::Timeout);
    }

    let head = http::read_head(stream)?;
    if head.status != 200 {
        return Err(TransitError::BadStatus(head.status));
    }

    let body = read_body(stream, head.content_length)?;
    let parsed: LocationResponse = serde_json::from_slice(&body)?;
    parsed
        .locations
        .into_iter()
        .next()
        .and_then(|entry| entry.stop)
        .map(|stop| stop.id)
        .ok_or(TransitError::NoMatch)
}

// ---------------------------------------------------------------------------
// Departure poller
// ---------------------------------------------------------------------------

/// Fetch one page of upcoming departures and append the new ones to the
/// buffer.
///
/// Appends at most `4 - buffer.len()` records: duplicates (by exact
/// time-of-day text) are skipped but still advance the returned cursor,
/// so a stale window can never be reprocessed forever. The direction flag
/// is set by exact byte comparison of the API's `direction` field against
/// the configured outbound destination name.
///
/// Returns the updated continuation cursor; `Ok` means the page was
/// processed, even when zero new records were appended. The connection is
/// closed on every path.
pub fn poll_departures<S: ByteStream + ?Sized>(
    stream: &mut S,
    config: &ApiConfig,
    location_id: &str,
    cursor: Option<&Cursor>,
    buffer: &mut ArrivalBuffer,
) -> Result<Option<Cursor>, TransitError> {
    let result = poll_inner(stream, config, location_id, cursor, buffer);
    stream.close();
    result
}

fn poll_inner<S: ByteStream + ?Sized>(
    stream: &mut S,
    config: &ApiConfig,
    location_id: &str,
    cursor: Option<&Cursor>,
    buffer: &mut ArrivalBuffer,
) -> Result<Option<Cursor>, TransitError> {
    stream
        .connect(&config.host, config.port)
        .map_err(TransitError::Handshake)?;

    let request = departure_request(config, location_id, cursor);
    debug!("departure request: {}", request.lines().next().unwrap_or(""));
    stream.send(request.as_bytes())?;

    if !stream.await_data(RESPONSE_TIMEOUT)? {
        return Err(TransitError::Timeout);
    }

    let head = http::read_head(stream)?;
    if head.status == 400 {
        // A 400 carries an API-level error code worth distinguishing:
        // SVC_LOC means our cached stop id went stale.
        let body = read_body(stream, head.content_length)?;
        let fault: ApiFault = serde_json::from_slice(&body)?;
        return Err(if fault.error_code.as_deref() == Some(STALE_LOCATION_CODE) {
            TransitError::StaleLocationId
        } else {
            TransitError::BadStatus(400)
        });
    }
    if head.status != 200 {
        return Err(TransitError::BadStatus(head.status));
    }

    let body = read_body(stream, head.content_length)?;
    let board: DepartureBoard = serde_json::from_slice(&body)?;
    let departures = board.departures.ok_or(TransitError::NoTrips)?;

    let mut next_cursor = cursor.cloned();
    for dep in &departures {
        if buffer.is_full() {
            break;
        }

        if buffer.contains_time(&dep.time) {
            debug!("duplicate departure at {}", dep.time);
            advance_cursor(&mut next_cursor, dep);
            continue;
        }

        let Some(timestamp) = timefmt::parse_timestamp(&dep.date, &dep.time) else {
            warn!("skipping unparseable departure '{} {}'", dep.date, dep.time);
            advance_cursor(&mut next_cursor, dep);
            continue;
        };

        let record = Departure {
            timestamp,
            outbound: dep.direction == config.destination,
            time_text: dep.time.clone(),
        };
        debug!("buffering departure {} {}", dep.date, dep.time);
        if buffer.push(record).is_err() {
            break;
        }
        advance_cursor(&mut next_cursor, dep);
    }

    Ok(next_cursor)
}

/// Move the cursor strictly past `dep`, whether or not it was kept.
fn advance_cursor(cursor: &mut Option<Cursor>, dep: &ApiDeparture) {
    if let Some(time) = timefmt::increment_minute(&dep.time) {
        *cursor = Some(Cursor {
            date: Some(dep.date.clone()),
            time,
        });
    }
}

/// Build the `departureBoard` request, appending the continuation bounds
/// when a cursor is supplied. A cursor without a date sends only `time`.
fn departure_request(config: &ApiConfig, location_id: &str, cursor: Option<&Cursor>) -> String {
    let mut query = format!(
        "/api/departureBoard?accessId={}&format=json&maxJourneys={}&id={}&duration={}",
        config.key, MAX_JOURNEYS, location_id, config.duration_minutes,
    );
    if let Some(cursor) = cursor {
        if let Some(date) = &cursor.date {
            query.push_str(&format!("&date={date}"));
        }
        query.push_str(&format!("&time={}", cursor.time));
    }
    format!(
        "GET {query} HTTP/1.1\r\n\
         User-Agent: ferry-tracker/0.1\r\n\
         Cache-Control: no-cache\r\n\
         Host: {}\r\n\
         Connection: close\r\n\
         \r\n",
        config.host,
    )
}

/// Read the response body, bounded by the parse ceiling.
fn read_body<S: ByteStream + ?Sized>(
    stream: &mut S,
    declared_length: Option<usize>,
) -> Result<Vec<u8>, TransitError> {
    match declared_length {
        Some(len) if len > MAX_BODY_BYTES => Err(TransitError::Oversize(len)),
        Some(len) => Ok(stream.read_exact_bytes(len)?),
        None => {
            // No Content-Length: the server signals the end by closing.
            let body = stream.read_to_end_bounded(MAX_BODY_BYTES)?;
            if body.len() > MAX_BODY_BYTES {
                return Err(TransitError::Oversize(body.len()));
            }
            Ok(body)
        }
    }
}

/// Percent-encode a query value byte-wise as UTF-8; alphanumerics and
/// `-_.~` pass through. Harbour names are routinely non-ASCII.
pub fn percent_encode(input: &str) -> String {
    let mut encoded = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'0'..=b'9' | b'a'..=b'z' | b'A'..=b'Z' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(byte as char);
            }
            _ => encoded.push_str(&format!("%{byte:02X}")),
        }
    }
    encoded
}
