//! Transparent UART radio bridge.
//!
//! Many sub-GHz modules expose a plain serial pipe: bytes written are sent over
//! the air and received payloads come out of the UART. Frames are delimited by
//! `\n` in both directions. Tuning is done with the module's own configuration
//! tool, so frequency and power are only recorded here.

use std::io::{self, Read, Write};
use std::time::Duration;

use anyhow::Result;
use bytes::{Buf, Bytes, BytesMut};
use log::{debug, warn};
use serialport::{ClearBuffer, SerialPort};

use super::{Radio, RadioError};
use crate::modem::serial::open_port;

/// Receive buffer bound; a bridge that never sends a newline is resynced here.
const MAX_PENDING: usize = 1024;

pub struct SerialRadio {
    port: Box<dyn SerialPort>,
    pending: BytesMut,
    frequency_mhz: f32,
    power_dbm: i8,
}

impl SerialRadio {
    pub fn open(port_name: &str, baud_rate: u32) -> Result<Self> {
        let port = open_port(port_name, baud_rate, Duration::from_millis(50))?;
        Ok(Self {
            port,
            pending: BytesMut::with_capacity(256),
            frequency_mhz: super::DEFAULT_FREQUENCY_MHZ,
            power_dbm: super::DEFAULT_TX_POWER_DBM,
        })
    }

    fn fill(&mut self) -> Result<(), RadioError> {
        let available = self.port.bytes_to_read().map_err(io::Error::from)? as usize;
        if available == 0 {
            return Ok(());
        }
        let mut buf = vec![0u8; available.min(MAX_PENDING)];
        match self.port.read(&mut buf) {
            Ok(n) => self.pending.extend_from_slice(&buf[..n]),
            Err(e) if e.kind() == io::ErrorKind::TimedOut => {}
            Err(e) => return Err(RadioError::Receive(e.to_string())),
        }
        if let Some(dropped) = resync_overflow(&mut self.pending) {
            warn!("radio bridge: {} bytes without delimiter, dropping", dropped);
        }
        Ok(())
    }
}

/// Split the first complete line off `pending`, without its `\n` or a trailing
/// `\r`, cut to `max_len` bytes.
fn next_line(pending: &mut BytesMut, max_len: usize) -> Option<Bytes> {
    let pos = pending.iter().position(|&b| b == b'\n')?;
    let mut line = pending.split_to(pos);
    pending.advance(1);
    if line.last() == Some(&b'\r') {
        line.truncate(line.len() - 1);
    }
    line.truncate(max_len);
    Some(line.freeze())
}

/// Discard `pending` once it outgrows the bound with no delimiter in sight.
/// Returns how many bytes were dropped.
fn resync_overflow(pending: &mut BytesMut) -> Option<usize> {
    if pending.len() > MAX_PENDING && !pending.contains(&b'\n') {
        let dropped = pending.len();
        pending.clear();
        Some(dropped)
    } else {
        None
    }
}

impl Radio for SerialRadio {
    fn init(&mut self) -> Result<(), RadioError> {
        self.port
            .clear(ClearBuffer::All)
            .map_err(|e| RadioError::Init(e.to_string()))?;
        self.pending.clear();
        debug!(
            "radio bridge ready ({} MHz, {} dBm configured on module)",
            self.frequency_mhz, self.power_dbm
        );
        Ok(())
    }

    fn set_frequency(&mut self, mhz: f32) -> Result<(), RadioError> {
        if !(mhz.is_finite() && mhz > 0.0) {
            return Err(RadioError::Config(format!("frequency {mhz} MHz")));
        }
        self.frequency_mhz = mhz;
        Ok(())
    }

    fn set_power(&mut self, dbm: i8) -> Result<(), RadioError> {
        self.power_dbm = dbm;
        Ok(())
    }

    fn try_receive(&mut self, max_len: usize) -> Result<Option<Bytes>, RadioError> {
        self.fill()?;
        Ok(next_line(&mut self.pending, max_len))
    }

    fn send(&mut self, frame: Bytes) -> Result<(), RadioError> {
        let mut out = BytesMut::with_capacity(frame.len() + 1);
        out.extend_from_slice(&frame);
        out.extend_from_slice(b"\n");
        self.port
            .write_all(&out)
            .and_then(|_| self.port.flush())
            .map_err(|e| RadioError::Transmit(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_split_on_newline_and_drop_carriage_return() {
        let mut pending = BytesMut::from(&b"T:1.00,H:2.00,P:3.00\r\nT:4"[..]);
        assert_eq!(
            next_line(&mut pending, 58).as_deref(),
            Some(&b"T:1.00,H:2.00,P:3.00"[..])
        );
        assert_eq!(&pending[..], b"T:4");
        assert_eq!(next_line(&mut pending, 58), None);

        pending.extend_from_slice(b".00\n\n");
        assert_eq!(next_line(&mut pending, 58).as_deref(), Some(&b"T:4.00"[..]));
        assert_eq!(next_line(&mut pending, 58).as_deref(), Some(&b""[..]));
        assert!(pending.is_empty());
    }

    #[test]
    fn long_line_is_cut_to_the_frame_limit() {
        let mut pending = BytesMut::from(&b"0123456789\nrest"[..]);
        assert_eq!(next_line(&mut pending, 4).as_deref(), Some(&b"0123"[..]));
        assert_eq!(&pending[..], b"rest");
    }

    #[test]
    fn overflow_without_delimiter_is_dropped() {
        let mut pending = BytesMut::from(&[b'x'; MAX_PENDING + 1][..]);
        assert_eq!(resync_overflow(&mut pending), Some(MAX_PENDING + 1));
        assert!(pending.is_empty());

        let mut at_bound = BytesMut::from(&[b'x'; MAX_PENDING][..]);
        assert_eq!(resync_overflow(&mut at_bound), None);

        let mut with_line = BytesMut::from(&[b'x'; MAX_PENDING + 1][..]);
        with_line[10] = b'\n';
        assert_eq!(resync_overflow(&mut with_line), None);
        assert_eq!(with_line.len(), MAX_PENDING + 1);
    }
}
