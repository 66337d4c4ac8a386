//! Serial-port transport for the cellular modem.

use std::io::{self, Read, Write};
use std::time::Duration;

use anyhow::{anyhow, Result};
use bytes::Bytes;
use log::debug;
use serialport::SerialPort;

use super::at::ModemTransport;

/// Open `port_name` as 8N1 at `baud_rate` with DTR/RTS asserted and the
/// input buffer drained of boot chatter.
pub fn open_port(port_name: &str, baud_rate: u32, timeout: Duration) -> Result<Box<dyn SerialPort>> {
    let mut builder = serialport::new(port_name, baud_rate).timeout(timeout);
    #[cfg(unix)]
    {
        builder = builder
            .data_bits(serialport::DataBits::Eight)
            .stop_bits(serialport::StopBits::One)
            .parity(serialport::Parity::None);
    }
    let mut port = builder
        .open()
        .map_err(|e| anyhow!("Failed to open serial port {}: {}", port_name, e))?;

    let _ = port.write_data_terminal_ready(true);
    let _ = port.write_request_to_send(true);

    let mut purge_buf = [0u8; 512];
    let mut purged = 0usize;
    while let Ok(available) = port.bytes_to_read() {
        if available == 0 {
            break;
        }
        match port.read(&mut purge_buf) {
            Ok(0) | Err(_) => break,
            Ok(n) => purged += n,
        }
    }
    debug!(
        "Serial port {} opened at {} baud, purged {} bytes",
        port_name, baud_rate, purged
    );
    Ok(port)
}

pub struct SerialModem {
    port: Box<dyn SerialPort>,
    buf: Vec<u8>,
}

impl SerialModem {
    pub fn open(port_name: &str, baud_rate: u32) -> Result<Self> {
        let port = open_port(port_name, baud_rate, Duration::from_millis(50))?;
        Ok(Self {
            port,
            buf: vec![0u8; 1024],
        })
    }
}

impl ModemTransport for SerialModem {
    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.port.write_all(bytes)?;
        self.port.flush()
    }

    fn read_available(&mut self) -> io::Result<Bytes> {
        let available = self.port.bytes_to_read().map_err(io::Error::from)?;
        if available == 0 {
            return Ok(Bytes::new());
        }
        let want = (available as usize).min(self.buf.len());
        match self.port.read(&mut self.buf[..want]) {
            Ok(n) => Ok(Bytes::copy_from_slice(&self.buf[..n])),
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(Bytes::new()),
            Err(e) => Err(e),
        }
    }
}
