//! # Cross-module Acquisition Tests
//!
//! Exercises the public library API the way the acquisition cycle uses
//! it: time arithmetic feeding the buffer, buffer maintenance feeding the
//! next query, and configuration loading from disk.

use std::fs;
use std::io::Write;
use tempfile::NamedTempFile;

use ferry_tracker_lib::buffer::{ArrivalBuffer, BUFFER_CAPACITY};
use ferry_tracker_lib::config::Config;
use ferry_tracker_lib::{timefmt, Departure};

fn departure(date: &str, time: &str) -> Departure {
    Departure {
        timestamp: timefmt::parse_timestamp(date, time).expect("well-formed pair"),
        outbound: false,
        time_text: time.to_string(),
    }
}

/// A filled buffer, compacted against a time between its records, keeps
/// exactly the future records in order and frees capacity for the poller.
#[test]
fn compaction_frees_capacity_for_future_records() {
    let mut buffer = ArrivalBuffer::new();
    buffer.push(departure("2025-06-16", "08:00:00")).unwrap();
    buffer.push(departure("2025-06-16", "10:00:00")).unwrap();
    buffer.push(departure("2025-06-16", "12:00:00")).unwrap();
    buffer.push(departure("2025-06-16", "14:00:00")).unwrap();
    assert!(buffer.is_full());

    // "Now" is 11:00 on the same day.
    let now = timefmt::parse_timestamp("2025-06-16", "11:00:00").unwrap();
    buffer.compact(now);

    assert_eq!(buffer.len(), 2, "only the 12:00 and 14:00 sailings remain");
    assert!(!buffer.is_full(), "compaction must free slots for new records");
    let times: Vec<&str> = buffer.iter().map(|d| d.time_text.as_str()).collect();
    assert_eq!(times, vec!["12:00:00", "14:00:00"]);
}

/// The dedup probe and the minute-increment cursor arithmetic agree on
/// the strings the API actually sends (`HH:MM:SS`).
#[test]
fn dedup_probe_and_cursor_arithmetic_use_api_strings() {
    let mut buffer = ArrivalBuffer::new();
    buffer.push(departure("2025-06-16", "23:59:00")).unwrap();

    assert!(buffer.contains_time("23:59:00"));
    // The continuation bound for that record wraps into the next day.
    assert_eq!(timefmt::increment_minute("23:59:00").as_deref(), Some("00:00"));
    assert_eq!(timefmt::next_date("2025-06-16").as_deref(), Some("2025-06-17"));
}

/// Buffered timestamps render back to the wall-clock text they came from.
#[test]
fn buffered_timestamps_format_for_display() {
    let record = departure("2025-06-16", "15:20:00");
    let rendered = timefmt::format_timestamp(record.timestamp, 0);
    assert_eq!(rendered, "2025-06-16 15:20:00.000");
}

#[test]
fn capacity_constant_matches_buffer_behavior() {
    let mut buffer = ArrivalBuffer::new();
    for hour in 0..BUFFER_CAPACITY {
        let time = format!("{hour:02}:00:00");
        buffer
            .push(departure("2025-06-16", &time))
            .expect("below capacity");
    }
    assert!(buffer.is_full());
}

#[test]
fn config_loads_from_a_toml_file() {
    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
[api]
host = "transit.example"
port = 8080
key = "secret"
stop_query = "Sejerby"
destination = "Havnsø (færge)"
duration_minutes = 120

[clock]
server = "10.0.0.1:123"
local_port = 2400
timezone_offset_hours = 2
fallback_offset_hours = 1
max_tries = 5
"#
    )
    .unwrap();

    let config = Config::load_from_path(file.path());
    assert_eq!(config.api.host, "transit.example");
    assert_eq!(config.api.port, 8080);
    assert_eq!(config.api.destination, "Havnsø (færge)");
    assert_eq!(config.clock.local_port, 2400);
    assert_eq!(config.clock.max_tries, 5);
}

#[test]
fn malformed_config_falls_back_to_defaults() {
    let file = NamedTempFile::new().unwrap();
    fs::write(file.path(), "this is not toml {{{{").unwrap();

    let config = Config::load_from_path(file.path());
    assert_eq!(config.api.host, "www.rejseplanen.dk");
}
