//! Line-oriented AT transactions over a byte stream.
//!
//! A transaction writes one command line and then collects whatever the modem
//! sends back until a terminator (`OK`, `ERROR`, or the `>` input prompt) shows
//! up or the per-call deadline passes. The transaction itself never fails: the
//! collected text is returned either way and the caller decides what it means.

use std::io;
use std::time::{Duration, Instant};

use bytes::{Bytes, BytesMut};
use log::{debug, trace, warn};

use crate::clock::Clock;
use crate::logutil::escape_log;
use crate::metrics;

/// Substrings that end a response.
pub const TERMINATORS: [&str; 3] = ["OK", "ERROR", ">"];
/// Appended to every command.
pub const LINE_END: &str = "\r\n";
/// Gap between reads while waiting for a response.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Byte-level link to the modem.
pub trait ModemTransport {
    fn write(&mut self, bytes: &[u8]) -> io::Result<()>;
    /// Everything received since the last call; empty when nothing arrived.
    fn read_available(&mut self) -> io::Result<Bytes>;
}

pub fn has_terminator(text: &str) -> bool {
    bytes_have_terminator(text.as_bytes())
}

/// Terminators are ASCII, so raw bytes can be searched before any decoding.
fn bytes_have_terminator(bytes: &[u8]) -> bool {
    TERMINATORS.iter().any(|t| {
        let t = t.as_bytes();
        bytes.windows(t.len()).any(|w| w == t)
    })
}

/// State of one in-flight command; lives only inside [`AtPort::send_and_wait`].
struct Transaction<'a> {
    command: &'a str,
    deadline: Instant,
    accumulated: BytesMut,
}

impl Transaction<'_> {
    /// Decode once so multi-byte characters split across reads survive.
    fn into_response(self) -> String {
        String::from_utf8_lossy(&self.accumulated).into_owned()
    }
}

/// Owner of the modem link. Holding it by `&mut` is what guarantees a single
/// outstanding transaction per modem.
pub struct AtPort<T, C> {
    transport: T,
    clock: C,
    poll_interval: Duration,
}

impl<T: ModemTransport, C: Clock> AtPort<T, C> {
    pub fn new(transport: T, clock: C) -> Self {
        Self {
            transport,
            clock,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Write `command` plus a line end, then gather the response.
    ///
    /// Returns as soon as a terminator has been seen, or exactly when `timeout`
    /// has elapsed since the call began. An empty `command` writes just the line
    /// end and waits for the tail of an earlier multi-step exchange. A failed
    /// write returns an empty response at once.
    pub async fn send_and_wait(&mut self, command: &str, timeout: Duration) -> String {
        let started = self.clock.now();
        let mut tx = Transaction {
            command,
            deadline: started + timeout,
            accumulated: BytesMut::new(),
        };

        let line = format!("{}{}", tx.command, LINE_END);
        if let Err(e) = self.transport.write(line.as_bytes()) {
            // nothing can answer a command that never left
            warn!("AT write of {:?} failed: {}", tx.command, e);
            metrics::observe_transaction(Duration::ZERO, false);
            return tx.into_response();
        }

        loop {
            match self.transport.read_available() {
                Ok(chunk) if !chunk.is_empty() => {
                    trace!("AT rx chunk: {}", escape_log(&String::from_utf8_lossy(&chunk)));
                    tx.accumulated.extend_from_slice(&chunk);
                }
                Ok(_) => {}
                Err(ref e) if is_transient(e) => {}
                Err(e) => debug!("AT read error while waiting for {:?}: {}", tx.command, e),
            }

            if bytes_have_terminator(&tx.accumulated) {
                break;
            }
            let now = self.clock.now();
            if now >= tx.deadline {
                break;
            }
            let remaining = tx.deadline - now;
            self.clock.sleep(self.poll_interval.min(remaining)).await;
        }

        let elapsed = self.clock.now().saturating_duration_since(started);
        let terminated = bytes_have_terminator(&tx.accumulated);
        metrics::observe_transaction(elapsed, terminated);
        let command = tx.command;
        let response = tx.into_response();
        if terminated {
            debug!(
                "AT {:?} -> {} ({} ms)",
                command,
                escape_log(&response),
                elapsed.as_millis()
            );
        } else {
            debug!(
                "AT {:?} timed out after {} ms, got {}",
                command,
                elapsed.as_millis(),
                escape_log(&response)
            );
        }
        response
    }

    /// Write bytes without a line end (message bodies, control bytes).
    pub fn write_raw(&mut self, bytes: &[u8]) -> io::Result<()> {
        trace!("AT raw write: {}", escape_log(&String::from_utf8_lossy(bytes)));
        self.transport.write(bytes)
    }
}

fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::collections::VecDeque;

    /// Replies from a fixed queue, one chunk per read.
    struct Canned {
        written: Vec<u8>,
        replies: VecDeque<Bytes>,
    }

    impl ModemTransport for Canned {
        fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
            self.written.extend_from_slice(bytes);
            Ok(())
        }
        fn read_available(&mut self) -> io::Result<Bytes> {
            Ok(self.replies.pop_front().unwrap_or_default())
        }
    }

    fn canned(replies: &[&'static str]) -> Canned {
        Canned {
            written: Vec::new(),
            replies: replies.iter().map(|r| Bytes::from_static(r.as_bytes())).collect(),
        }
    }

    #[tokio::test]
    async fn stops_at_terminator_split_across_reads() {
        let clock = ManualClock::new();
        let mut port = AtPort::new(canned(&["\r\nO", "", "K\r\n", "junk"]), clock.clone());
        let resp = port.send_and_wait("AT", Duration::from_secs(2)).await;
        assert_eq!(resp, "\r\nOK\r\n");
        assert_eq!(port.transport().written, b"AT\r\n");
        assert!(clock.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn prompt_counts_as_terminator() {
        let mut port = AtPort::new(canned(&["\r\n> "]), ManualClock::new());
        let resp = port.send_and_wait("AT+CMGS=\"+1\"", Duration::from_secs(5)).await;
        assert!(resp.contains('>'));
    }

    #[tokio::test]
    async fn empty_command_writes_line_end_only() {
        let mut port = AtPort::new(canned(&["+CMGS: 4\r\nOK"]), ManualClock::new());
        let resp = port.send_and_wait("", Duration::from_secs(10)).await;
        assert!(resp.contains("+CMGS:"));
        assert_eq!(port.transport().written, b"\r\n");
    }

    #[tokio::test]
    async fn zero_timeout_reads_once() {
        let clock = ManualClock::new();
        let mut port = AtPort::new(canned(&[]), clock.clone());
        let resp = port.send_and_wait("AT", Duration::ZERO).await;
        assert!(resp.is_empty());
        assert_eq!(clock.elapsed(), Duration::ZERO);
    }
}
