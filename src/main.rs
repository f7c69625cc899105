//! # Ferry Tracker Application Entry Point
//!
//! Runs one acquisition cycle: synchronize the clock, resolve the
//! configured harbour to a stop id, poll the departure board until the
//! arrival buffer is full (or an attempt bound is hit), compact away
//! anything already in the past, and print the board.
//!
//! Error policy follows the taxonomy in [`ferry_tracker_lib::transit`]:
//! a stale stop id triggers a re-resolve, an empty window advances the
//! query to the next day, and transient faults get a cooldown before the
//! next attempt. Nothing short of a failed initial resolve aborts.

// Test modules
#[cfg(test)]
mod tests;

use std::thread;
use std::time::Duration;

use anyhow::Context;
use chrono::Local;
use log::{info, warn};

use ferry_tracker_lib::buffer::ArrivalBuffer;
use ferry_tracker_lib::clock::{self, NtpClient};
use ferry_tracker_lib::config::Config;
use ferry_tracker_lib::net::TcpByteStream;
use ferry_tracker_lib::timefmt;
use ferry_tracker_lib::transit::{self, Cursor, TransitError};

/// Poll attempts per cycle before presenting whatever we have.
const MAX_POLL_ATTEMPTS: u32 = 8;

/// Cooldown after a transient poll failure.
const RETRY_COOLDOWN: Duration = Duration::from_secs(10);

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let config = Config::load();

    // Trustworthy time first; a failure here is logged, not fatal.
    match NtpClient::new(&config.clock) {
        Ok(mut ntp) => {
            clock::synchronize(&mut ntp, &config.clock);
        }
        Err(e) => warn!("could not open the NTP socket: {e}"),
    }

    let mut stream = TcpByteStream::new();
    let mut location = transit::resolve_location(&mut stream, &config.api, &config.api.stop_query)
        .with_context(|| format!("resolving stop '{}'", config.api.stop_query))?;
    info!("resolved '{}' to stop id {}", config.api.stop_query, location);

    let mut buffer = ArrivalBuffer::new();
    let mut cursor: Option<Cursor> = None;

    let mut attempts = 0;
    while !buffer.is_full() && attempts < MAX_POLL_ATTEMPTS {
        attempts += 1;
        match transit::poll_departures(
            &mut stream,
            &config.api,
            &location,
            cursor.as_ref(),
            &mut buffer,
        ) {
            Ok(next) => {
                cursor = next;
            }
            Err(TransitError::StaleLocationId) => {
                warn!("stop id went stale, re-resolving '{}'", config.api.stop_query);
                location =
                    transit::resolve_location(&mut stream, &config.api, &config.api.stop_query)
                        .context("re-resolving a stale stop id")?;
            }
            Err(TransitError::NoTrips) => {
                // Nothing in this window; start over from midnight of the
                // following day.
                let date = cursor
                    .as_ref()
                    .and_then(|c| c.date.clone())
                    .unwrap_or_else(|| Local::now().format("%Y-%m-%d").to_string());
                match timefmt::next_date(&date) {
                    Some(next) => {
                        info!("no departures after {date}; retrying from {next}");
                        cursor = Some(Cursor {
                            date: Some(next),
                            time: "00:00".to_string(),
                        });
                    }
                    None => {
                        warn!("could not advance past {date}, stopping this cycle");
                        break;
                    }
                }
            }
            Err(e) => {
                warn!("departure poll failed: {e}; cooling down");
                thread::sleep(RETRY_COOLDOWN);
            }
        }
    }

    let now = Local::now().timestamp();
    buffer.compact(now);

    if buffer.is_empty() {
        println!("No upcoming ferry departures.");
    } else {
        println!("Upcoming ferry departures:");
        for departure in buffer.iter() {
            let direction = if departure.outbound {
                config.api.destination.as_str()
            } else {
                "opposite terminus"
            };
            println!(
                "  {}  ->  {}",
                timefmt::format_timestamp(departure.timestamp, 0),
                direction
            );
        }
    }

    Ok(())
}
