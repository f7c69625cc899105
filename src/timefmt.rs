//! Date and time-of-day arithmetic for departure records.
//!
//! The transit API hands out split `date` (`YYYY-MM-DD`) and `time`
//! (`HH:MM:SS`) strings; everything here converts between that pair and an
//! absolute Unix timestamp under local calendar rules, or nudges the
//! time-of-day text forward for the continuation cursor. Pure functions,
//! no I/O.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};

/// Parse a `YYYY-MM-DD` + `HH:MM:SS` pair into Unix epoch seconds using
/// the device's local calendar rules.
///
/// Returns `None` when either string is malformed or when the wall-clock
/// time does not exist locally (DST gap). Callers that care about
/// exactness must validate their inputs; a `None` here means the record
/// cannot be scheduled.
pub fn parse_timestamp(date: &str, time: &str) -> Option<i64> {
    let text = format!("{date} {time}");
    let naive = NaiveDateTime::parse_from_str(&text, "%Y-%m-%d %H:%M:%S").ok()?;
    naive
        .and_local_timezone(Local)
        .single()
        .map(|dt| dt.timestamp())
}

/// Add one minute to an `HH:MM[:SS]` string, wrapping minutes into hours
/// and hours into a 24-hour day. Any seconds field is dropped.
///
/// Used to compute the lower time bound of a follow-up departure query so
/// the API does not re-return the departure we just considered. Returns
/// `None` when the input does not yield two numeric fields.
pub fn increment_minute(time: &str) -> Option<String> {
    let mut fields = time.splitn(3, ':');
    let hours: u32 = fields.next()?.trim().parse().ok()?;
    let minutes: u32 = fields.next()?.trim().parse().ok()?;

    let mut minutes = minutes + 1;
    let mut hours = hours + minutes / 60;
    minutes %= 60;
    hours %= 24;

    Some(format!("{hours:02}:{minutes:02}"))
}

/// Render epoch seconds plus a separate millisecond component as
/// `YYYY-MM-DD HH:MM:SS.mmm` in local time.
///
/// Pure formatting; timestamps outside chrono's representable range fall
/// back to the epoch rather than failing.
pub fn format_timestamp(secs: i64, millis: u32) -> String {
    let local = DateTime::from_timestamp(secs, 0)
        .unwrap_or_default()
        .with_timezone(&Local);
    format!("{}.{:03}", local.format("%Y-%m-%d %H:%M:%S"), millis % 1000)
}

/// Advance a `YYYY-MM-DD` date by one calendar day.
///
/// Backing for the no-trips retry policy: when a window yields nothing,
/// the next query starts at midnight of the following day.
pub fn next_date(date: &str) -> Option<String> {
    let parsed = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
    parsed
        .succ_opt()
        .map(|next| next.format("%Y-%m-%d").to_string())
}
