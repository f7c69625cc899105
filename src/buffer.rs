//! # Arrival Buffer
//!
//! A fixed-capacity, ordered collection of pending ferry departures.
//!
//! The buffer is the single owner of its records: the poller appends
//! through [`ArrivalBuffer::push`], and expiry compaction is the only way
//! a record ever leaves. Capacity is enforced inside the type — backed by
//! a `heapless::Vec` there is no count field for callers to get wrong and
//! no slot beyond `len()` to read.

use crate::Departure;

/// Maximum number of departures kept at once.
pub const BUFFER_CAPACITY: usize = 4;

/// Bounded, ordered sequence of pending departures.
///
/// # Example
/// ```
/// use ferry_tracker_lib::{buffer::ArrivalBuffer, Departure};
///
/// let mut buffer = ArrivalBuffer::new();
/// buffer
///     .push(Departure { timestamp: 100, outbound: true, time_text: "10:00:00".into() })
///     .unwrap();
/// assert_eq!(buffer.len(), 1);
/// buffer.compact(200); // 100 is in the past now
/// assert!(buffer.is_empty());
/// ```
#[derive(Clone, Debug, Default)]
pub struct ArrivalBuffer {
    slots: heapless::Vec<Departure, BUFFER_CAPACITY>,
}

impl ArrivalBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of occupied slots, 0..=4.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// True when no departures are buffered.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// True when all slots are occupied and the poller must stop appending.
    pub fn is_full(&self) -> bool {
        self.slots.is_full()
    }

    /// Append a departure, refusing (and handing the record back) when the
    /// buffer is already at capacity.
    pub fn push(&mut self, departure: Departure) -> Result<(), Departure> {
        self.slots.push(departure)
    }

    /// Exact-string deduplication probe against the API's original
    /// time-of-day text of every buffered record.
    pub fn contains_time(&self, time_text: &str) -> bool {
        self.slots.iter().any(|d| d.time_text == time_text)
    }

    /// Drop every record whose timestamp is earlier than `now`, keeping
    /// the survivors in their original order.
    ///
    /// Must run before the buffer is presented to a consumer or used to
    /// request more departures, so expired entries free capacity and the
    /// dedup/continuation logic only reasons about future records.
    pub fn compact(&mut self, now: i64) {
        let kept: heapless::Vec<Departure, BUFFER_CAPACITY> = self
            .slots
            .iter()
            .filter(|d| d.timestamp >= now)
            .cloned()
            .collect();
        self.slots = kept;
    }

    /// Iterate over buffered departures in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Departure> {
        self.slots.iter()
    }
}
