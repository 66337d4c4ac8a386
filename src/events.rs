//! Discrete outcome events.
//!
//! The gateway never drives an indicator directly. It reports each outcome as an
//! [`Event`] to an [`EventSink`], and whatever is attached (LED driver, log,
//! channel into another task) decides how to present it.

use std::fmt;

use log::{error, info, warn};
use tokio::sync::mpsc;

use crate::metrics;

/// Uplink path a relay attempt went through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Sms,
    Publish,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Sms => "sms",
            Channel::Publish => "publish",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// A frame arrived and decoded into a present reading.
    RadioDecodeOk,
    /// A frame arrived but could not be decoded.
    RadioDecodeFail,
    /// The radio driver reported a reception error.
    RadioRxFail,
    RelayOk(Channel),
    RelayFail(Channel),
    /// The modem failed its liveness probe and a reset cycle was run.
    ModemResetAttempted,
    /// The radio front-end failed to initialize; the gateway halts.
    InitFatal,
}

impl Event {
    /// Stable identifier, e.g. `radio-decode-ok` or `relay-fail:sms`.
    pub fn name(&self) -> String {
        match self {
            Event::RadioDecodeOk => "radio-decode-ok".to_string(),
            Event::RadioDecodeFail => "radio-decode-fail".to_string(),
            Event::RadioRxFail => "radio-rx-fail".to_string(),
            Event::RelayOk(ch) => format!("relay-ok:{ch}"),
            Event::RelayFail(ch) => format!("relay-fail:{ch}"),
            Event::ModemResetAttempted => "modem-reset-attempted".to_string(),
            Event::InitFatal => "init-fatal".to_string(),
        }
    }
}

/// Receiver of outcome events.
pub trait EventSink {
    fn emit(&mut self, event: Event);
}

/// Collects events in order; handy for inspection.
impl EventSink for Vec<Event> {
    fn emit(&mut self, event: Event) {
        self.push(event);
    }
}

/// Forwards events to another task (e.g. an indicator driver). A closed
/// receiver is ignored.
impl EventSink for mpsc::UnboundedSender<Event> {
    fn emit(&mut self, event: Event) {
        let _ = self.send(event);
    }
}

/// Default sink: counts every event and writes it to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl EventSink for LogSink {
    fn emit(&mut self, event: Event) {
        metrics::record_event(event);
        match event {
            Event::RadioDecodeOk | Event::RelayOk(_) => info!("event {}", event.name()),
            Event::InitFatal => error!("event {}", event.name()),
            _ => warn!("event {}", event.name()),
        }
    }
}

/// Sends every event to two sinks.
pub struct Tee<A, B>(pub A, pub B);

impl<A: EventSink, B: EventSink> EventSink for Tee<A, B> {
    fn emit(&mut self, event: Event) {
        self.0.emit(event);
        self.1.emit(event);
    }
}
