//! # NTP Clock Synchronization
//!
//! The controller has no battery-backed clock, so departure timestamps
//! are meaningless until NTP establishes "now". This module owns a UDP
//! socket and a 48-byte scratch packet, sends the fixed-format request,
//! and extracts the transmit timestamp from the reply.
//!
//! Failure is never fatal: when every attempt goes unanswered the caller
//! gets `None` and the device keeps running on its stale clock — a ferry
//! board that is a little wrong beats one that is bricked.

use std::io;
use std::net::UdpSocket;
use std::thread;
use std::time::Duration;

use log::{debug, info, warn};

use crate::config::ClockConfig;
use crate::timefmt;

/// NTP packets are exactly 48 bytes for our purposes.
pub const NTP_PACKET_SIZE: usize = 48;

/// Seconds between the NTP epoch (1900) and the Unix epoch (1970).
const NTP_UNIX_DELTA: i64 = 2_208_988_800;

/// Byte offset of the 4-byte big-endian transmit timestamp.
const TRANSMIT_TIMESTAMP_OFFSET: usize = 40;

/// Per-attempt settle delay; doubles as the receive timeout.
const SETTLE_DELAY: Duration = Duration::from_secs(1);

/// Owned NTP client: one socket, one scratch packet, no shared state.
pub struct NtpClient {
    socket: UdpSocket,
    server: String,
    packet: [u8; NTP_PACKET_SIZE],
}

impl NtpClient {
    /// Bind the local UDP port and prepare a client for `config.server`.
    pub fn new(config: &ClockConfig) -> io::Result<Self> {
        let socket = UdpSocket::bind(("0.0.0.0", config.local_port))?;
        socket.set_read_timeout(Some(SETTLE_DELAY))?;
        Ok(Self {
            socket,
            server: config.server.clone(),
            packet: [0u8; NTP_PACKET_SIZE],
        })
    }

    /// Fire one request packet at the time server.
    fn send_request(&mut self) -> io::Result<()> {
        self.packet = [0u8; NTP_PACKET_SIZE];
        self.packet[0] = 0b1110_0011; // LI unsynchronized, version 4, client mode
        self.packet[2] = 6; // polling interval
        self.packet[3] = 0xEC; // peer clock precision
        self.packet[12] = 49;
        self.packet[13] = 0x4E;
        self.packet[14] = 49;
        self.packet[15] = 52;
        self.socket.send_to(&self.packet, self.server.as_str())?;
        Ok(())
    }

    /// Fetch Unix time from the server, shifted by a whole-hour timezone
    /// offset.
    ///
    /// One attempt per loop iteration with a fixed settle delay; gives up
    /// after `max_tries` unanswered attempts and returns `None` — never a
    /// zero that could be mistaken for a real reply.
    pub fn fetch_unix_time(&mut self, offset_hours: i8, max_tries: u8) -> Option<i64> {
        for attempt in 1..=max_tries {
            if let Err(e) = self.send_request() {
                warn!("NTP send failed: {e}");
                thread::sleep(SETTLE_DELAY);
                continue;
            }

            // recv blocks up to the settle delay
            match self.socket.recv(&mut self.packet) {
                Ok(n) if n >= NTP_PACKET_SIZE => {
                    debug!("NTP reply on attempt {attempt}/{max_tries}");
                    return Some(unix_time_from_packet(&self.packet, offset_hours));
                }
                Ok(n) => warn!("short NTP reply of {n} bytes, retrying"),
                Err(e)
                    if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) =>
                {
                    debug!("no NTP reply (attempt {attempt}/{max_tries})");
                }
                Err(e) => warn!("NTP receive failed: {e}"),
            }
        }
        None
    }
}

/// Convert a reply packet to Unix epoch seconds.
///
/// The transmit timestamp is a 4-byte big-endian count of seconds since
/// 1900 at offset 40; subtracting the 70-year delta and adding the
/// timezone shift yields local-shifted Unix time.
pub fn unix_time_from_packet(packet: &[u8; NTP_PACKET_SIZE], offset_hours: i8) -> i64 {
    let secs_since_1900 = u32::from_be_bytes([
        packet[TRANSMIT_TIMESTAMP_OFFSET],
        packet[TRANSMIT_TIMESTAMP_OFFSET + 1],
        packet[TRANSMIT_TIMESTAMP_OFFSET + 2],
        packet[TRANSMIT_TIMESTAMP_OFFSET + 3],
    ]);
    i64::from(secs_since_1900) - NTP_UNIX_DELTA + i64::from(offset_hours) * 3600
}

/// Run a full synchronization: primary offset, then one whole retry with
/// the fallback offset, then accept whatever resulted.
///
/// A successful fetch sets the device clock as a side effect; whether
/// that stuck is not this module's concern. Returns the fetched time so
/// the caller can log or sanity-check it.
pub fn synchronize(client: &mut NtpClient, config: &ClockConfig) -> Option<i64> {
    info!("starting NTP synchronization against {}", client.server);
    let fetched = client
        .fetch_unix_time(config.timezone_offset_hours, config.max_tries)
        .or_else(|| {
            warn!(
                "NTP sync failed, retrying once with fallback offset {:+}h",
                config.fallback_offset_hours
            );
            client.fetch_unix_time(config.fallback_offset_hours, config.max_tries)
        });

    match fetched {
        Some(unix_secs) => {
            info!("clock synchronized: {}", timefmt::format_timestamp(unix_secs, 0));
            set_system_time(unix_secs);
        }
        None => warn!("NTP sync exhausted all attempts; continuing with the stale clock"),
    }
    fetched
}

/// Set the realtime clock. Fire-and-forget: needs CAP_SYS_TIME, and a
/// refusal only costs us accuracy, not uptime.
#[cfg(unix)]
fn set_system_time(unix_secs: i64) {
    let timespec = libc::timespec {
        tv_sec: unix_secs as libc::time_t,
        tv_nsec: 0,
    };
    let rc = unsafe { libc::clock_settime(libc::CLOCK_REALTIME, &timespec) };
    if rc != 0 {
        warn!("clock_settime failed: {}", io::Error::last_os_error());
    }
}

#[cfg(not(unix))]
fn set_system_time(_unix_secs: i64) {}
