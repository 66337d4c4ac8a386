//! Test utilities & fixtures.
//! Scripted modem and radio fakes driven by a shared [`ManualClock`].
#![allow(dead_code)]

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use bytes::Bytes;
use fieldrelay::clock::{Clock, ManualClock};
use fieldrelay::gateway::{ChannelPolicy, GatewaySettings};
use fieldrelay::modem::{AtPort, Modem, ModemTiming, ModemTransport, SessionConfig};
use fieldrelay::radio::{Radio, RadioError};

pub const OK: &str = "\r\nOK\r\n";
pub const FIX_REPLY: &str = "\r\n+CGPSINFO: 3113.343286,N,12121.234064,E,250311,072809.3,44.1,0.0,0\r\n\r\nOK\r\n";
pub const NO_FIX_REPLY: &str = "\r\n+CGPSINFO: ,,,,,,,,\r\n\r\nOK\r\n";

struct Rule {
    pattern: String,
    response: String,
    delay: Duration,
    remaining: Option<usize>,
}

impl Rule {
    /// `pattern` matches a command exactly, or as a prefix when it ends in `*`.
    fn matches(&self, command: &str) -> bool {
        match self.pattern.strip_suffix('*') {
            Some(prefix) => command.starts_with(prefix),
            None => command == self.pattern,
        }
    }
}

#[derive(Default)]
struct ModemInner {
    rules: Vec<Rule>,
    pending: VecDeque<(Instant, Bytes)>,
    commands: Vec<String>,
    raw: Vec<Vec<u8>>,
}

/// Scripted AT peer. Clones share state, so a test keeps one handle for
/// inspection after handing another to the port.
#[derive(Clone)]
pub struct FakeModem {
    inner: Arc<Mutex<ModemInner>>,
    clock: ManualClock,
}

impl FakeModem {
    pub fn new(clock: &ManualClock) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ModemInner::default())),
            clock: clock.clone(),
        }
    }

    /// Reply to every matching command immediately. Earlier rules win.
    pub fn on(&self, pattern: &str, response: &str) -> &Self {
        self.push_rule(pattern, response, Duration::ZERO, None)
    }

    pub fn on_after(&self, pattern: &str, response: &str, delay: Duration) -> &Self {
        self.push_rule(pattern, response, delay, None)
    }

    /// Reply to the next `times` matching commands only.
    pub fn on_times(&self, pattern: &str, response: &str, times: usize) -> &Self {
        self.push_rule(pattern, response, Duration::ZERO, Some(times))
    }

    fn push_rule(&self, pattern: &str, response: &str, delay: Duration, remaining: Option<usize>) -> &Self {
        self.inner.lock().unwrap().rules.push(Rule {
            pattern: pattern.to_string(),
            response: response.to_string(),
            delay,
            remaining,
        });
        self
    }

    /// Every command line written, without the line end.
    pub fn commands(&self) -> Vec<String> {
        self.inner.lock().unwrap().commands.clone()
    }

    pub fn count(&self, pattern: &str) -> usize {
        let probe = Rule {
            pattern: pattern.to_string(),
            response: String::new(),
            delay: Duration::ZERO,
            remaining: None,
        };
        self.commands().iter().filter(|c| probe.matches(c)).count()
    }

    /// Writes that carried no line end (message bodies).
    pub fn raw_writes(&self) -> Vec<Vec<u8>> {
        self.inner.lock().unwrap().raw.clone()
    }

    pub fn clear_log(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.commands.clear();
        inner.raw.clear();
    }
}

impl ModemTransport for FakeModem {
    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        let now = self.clock.now();
        let mut inner = self.inner.lock().unwrap();
        let Some(command) = bytes.strip_suffix(b"\r\n") else {
            inner.raw.push(bytes.to_vec());
            return Ok(());
        };
        let command = String::from_utf8_lossy(command).into_owned();
        inner.commands.push(command.clone());
        let reply = inner
            .rules
            .iter_mut()
            .filter(|r| r.remaining != Some(0))
            .find(|r| r.matches(&command))
            .map(|rule| {
                if let Some(n) = rule.remaining.as_mut() {
                    *n -= 1;
                }
                (now + rule.delay, Bytes::from(rule.response.clone()))
            });
        if let Some(reply) = reply {
            inner.pending.push_back(reply);
        }
        Ok(())
    }

    fn read_available(&mut self) -> io::Result<Bytes> {
        let now = self.clock.now();
        let mut inner = self.inner.lock().unwrap();
        let mut out = Vec::new();
        while let Some((at, _)) = inner.pending.front() {
            if *at > now {
                break;
            }
            if let Some((_, chunk)) = inner.pending.pop_front() {
                out.extend_from_slice(&chunk);
            }
        }
        Ok(Bytes::from(out))
    }
}

/// A modem that accepts everything: fix available, SMS and publish succeed.
pub fn healthy_modem(clock: &ManualClock) -> FakeModem {
    let modem = FakeModem::new(clock);
    modem
        .on("AT+CGPSINFO", FIX_REPLY)
        .on("AT+CMGS=*", "\r\n> ")
        .on("", "\r\n+CMGS: 12\r\n\r\nOK\r\n")
        .on("*", OK);
    modem
}

#[derive(Default)]
struct RadioInner {
    incoming: VecDeque<Result<Bytes, String>>,
    sent: Vec<Bytes>,
    fail_init: bool,
    initialized: bool,
    frequency: Option<f32>,
    power: Option<i8>,
}

#[derive(Clone, Default)]
pub struct FakeRadio {
    inner: Arc<Mutex<RadioInner>>,
}

impl FakeRadio {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_frame(&self, frame: &str) {
        self.push_bytes(frame.as_bytes());
    }

    pub fn push_bytes(&self, frame: &[u8]) {
        self.inner
            .lock()
            .unwrap()
            .incoming
            .push_back(Ok(Bytes::copy_from_slice(frame)));
    }

    pub fn push_error(&self, msg: &str) {
        self.inner
            .lock()
            .unwrap()
            .incoming
            .push_back(Err(msg.to_string()));
    }

    pub fn fail_init(&self) {
        self.inner.lock().unwrap().fail_init = true;
    }

    pub fn sent(&self) -> Vec<String> {
        self.inner
            .lock()
            .unwrap()
            .sent
            .iter()
            .map(|b| String::from_utf8_lossy(b).into_owned())
            .collect()
    }

    pub fn tuning(&self) -> (bool, Option<f32>, Option<i8>) {
        let inner = self.inner.lock().unwrap();
        (inner.initialized, inner.frequency, inner.power)
    }
}

impl Radio for FakeRadio {
    fn init(&mut self) -> Result<(), RadioError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_init {
            return Err(RadioError::Init("no transceiver on bus".into()));
        }
        inner.initialized = true;
        Ok(())
    }

    fn set_frequency(&mut self, mhz: f32) -> Result<(), RadioError> {
        self.inner.lock().unwrap().frequency = Some(mhz);
        Ok(())
    }

    fn set_power(&mut self, dbm: i8) -> Result<(), RadioError> {
        self.inner.lock().unwrap().power = Some(dbm);
        Ok(())
    }

    fn try_receive(&mut self, max_len: usize) -> Result<Option<Bytes>, RadioError> {
        match self.inner.lock().unwrap().incoming.pop_front() {
            Some(Ok(frame)) => Ok(Some(frame.slice(..frame.len().min(max_len)))),
            Some(Err(msg)) => Err(RadioError::Receive(msg)),
            None => Ok(None),
        }
    }

    fn send(&mut self, frame: Bytes) -> Result<(), RadioError> {
        self.inner.lock().unwrap().sent.push(frame);
        Ok(())
    }
}

pub fn modem_with(
    transport: FakeModem,
    clock: &ManualClock,
    session: Option<SessionConfig>,
) -> Modem<FakeModem, ManualClock> {
    Modem::new(
        AtPort::new(transport, clock.clone()),
        ModemTiming::default(),
        session,
    )
}

pub fn session() -> Option<SessionConfig> {
    Some(SessionConfig {
        apn: "internet".to_string(),
    })
}

/// Gateway settings with short, distinct intervals for tick tests.
pub fn test_settings() -> GatewaySettings {
    GatewaySettings {
        radio_poll_interval: Duration::from_secs(1),
        receive_window: Duration::from_secs(2),
        sms: Some(ChannelPolicy {
            interval: Duration::from_secs(600),
            consume_on_success: true,
            location_warm_up: true,
        }),
        publish: Some(ChannelPolicy {
            interval: Duration::from_secs(300),
            consume_on_success: false,
            location_warm_up: false,
        }),
        device_reset_interval: None,
        ..GatewaySettings::default()
    }
}
