//! # Ferry Tracker Core Library
//!
//! This library implements the departure acquisition subsystem of a small
//! ferry departure board: it keeps a device clock trustworthy via NTP,
//! resolves a harbour name to a transit-API stop id, polls the API's
//! departure board endpoint, and maintains a tiny bounded buffer of
//! validated future departures.
//!
//! ## Design Philosophy
//!
//! ### Built for an unreliable edge
//! The target is an unattended embedded controller with no persistent
//! storage and a flaky network link. Every network operation is a bounded,
//! sequential blocking call, every failure surfaces as a typed error the
//! caller can act on, and nothing here ever aborts the process.
//!
//! ### Memory Efficiency
//! - **Fixed-size buffer**: pending departures live in a
//!   [`buffer::ArrivalBuffer`] backed by a capacity-4 `heapless::Vec`,
//!   so the hot data structure never reallocates
//! - **Bounded bodies**: HTTP response bodies are refused outright when
//!   the declared length exceeds the 6000-byte parse ceiling
//! - **Field-filtered parsing**: JSON responses are decoded into typed
//!   structs that name only the fields we use; everything else is dropped
//!   during deserialization
//!
//! ### Data Flow
//! 1. **Clock**: [`clock`] fetches NTP time (with a fallback timezone
//!    offset) and sets the device clock
//! 2. **Resolve**: [`transit::resolve_location`] turns the configured
//!    harbour name into an opaque stop id
//! 3. **Poll**: [`transit::poll_departures`] fills the arrival buffer,
//!    deduplicating against already-buffered departures and handing back a
//!    continuation cursor for the next page
//! 4. **Compact**: [`buffer::ArrivalBuffer::compact`] drops departures that
//!    are already in the past before the buffer is shown to anyone

// Module declarations
pub mod buffer;
pub mod clock;
pub mod config;
pub mod http;
pub mod net;
pub mod timefmt;
pub mod transit;

/// One scheduled ferry departure, as kept in the arrival buffer.
///
/// Created by the poller from a single API response element and immutable
/// afterwards; it is dropped when expiry compaction evicts it.
///
/// The API's original `HH:MM:SS` text is retained alongside the derived
/// timestamp because deduplication keys on the exact upstream string: two
/// polls may return the same nominal departure, and comparing derived
/// timestamps would risk false negatives if parsing ever disagreed.
///
/// # Example
/// ```
/// use ferry_tracker_lib::Departure;
///
/// let dep = Departure {
///     timestamp: 1_735_916_400,
///     outbound: true,
///     time_text: "15:20:00".to_string(),
/// };
/// assert!(dep.outbound);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Departure {
    /// Departure time as seconds since the Unix epoch
    pub timestamp: i64,
    /// True when this sailing serves the configured outbound destination,
    /// false for the opposite terminus
    pub outbound: bool,
    /// The API's original time-of-day text, kept for exact deduplication
    pub time_text: String,
}
