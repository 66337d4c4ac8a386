//! # Short-Range Radio Link
//!
//! The gateway and the sensor node share a point-to-point sub-GHz link with a
//! single fixed peer. The driver is abstracted behind [`Radio`]; the core only
//! needs non-blocking receive, send, and the two tuning knobs.
//!
//! Received payloads are cleaned up by [`frame_payload`] before decoding: cut
//! at the first NUL byte and truncated to the frame-size limit.

#[cfg(feature = "serial")]
pub mod serial;

use std::io;
use std::time::Duration;

use bytes::Bytes;
use log::trace;
use thiserror::Error;

use crate::clock::Clock;
use crate::logutil::hex_snippet;

/// Largest frame accepted from the link.
pub const DEFAULT_FRAME_LIMIT: usize = 58;
pub const DEFAULT_FREQUENCY_MHZ: f32 = 433.0;
pub const DEFAULT_TX_POWER_DBM: i8 = 10;
/// How long one radio poll waits for a frame.
pub const DEFAULT_RECEIVE_WINDOW: Duration = Duration::from_secs(10);
const RECEIVE_POLL: Duration = Duration::from_millis(50);

#[derive(Debug, Error)]
pub enum RadioError {
    #[error("radio init failed: {0}")]
    Init(String),
    #[error("radio reception failed: {0}")]
    Receive(String),
    #[error("radio transmit failed: {0}")]
    Transmit(String),
    #[error("radio parameter rejected: {0}")]
    Config(String),
    #[error("radio i/o: {0}")]
    Io(#[from] io::Error),
}

/// Transceiver driver.
pub trait Radio {
    fn init(&mut self) -> Result<(), RadioError>;
    fn set_frequency(&mut self, mhz: f32) -> Result<(), RadioError>;
    fn set_power(&mut self, dbm: i8) -> Result<(), RadioError>;
    /// A pending frame of at most `max_len` bytes, or `None` when nothing has arrived.
    fn try_receive(&mut self, max_len: usize) -> Result<Option<Bytes>, RadioError>;
    fn send(&mut self, frame: Bytes) -> Result<(), RadioError>;
}

/// Cut `raw` at the first NUL and to at most `limit` bytes.
pub fn frame_payload(raw: &[u8], limit: usize) -> &[u8] {
    let end = raw
        .iter()
        .position(|&b| b == 0)
        .unwrap_or(raw.len())
        .min(limit);
    &raw[..end]
}

/// Poll `radio` until a frame arrives or `window` has passed.
///
/// Returns `Ok(None)` when the window closed with nothing received. A driver
/// error ends the wait immediately.
pub async fn receive_within<R: Radio, C: Clock>(
    radio: &mut R,
    clock: &C,
    max_len: usize,
    window: Duration,
) -> Result<Option<Bytes>, RadioError> {
    let deadline = clock.now() + window;
    loop {
        if let Some(raw) = radio.try_receive(max_len)? {
            let payload = frame_payload(&raw, max_len);
            trace!("radio rx {} bytes: {}", raw.len(), hex_snippet(&raw, 32));
            return Ok(Some(raw.slice(..payload.len())));
        }
        let now = clock.now();
        if now >= deadline {
            return Ok(None);
        }
        clock.sleep(RECEIVE_POLL.min(deadline - now)).await;
    }
}
