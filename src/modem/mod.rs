//! # Cellular Modem Supervision
//!
//! The gateway's uplink is an AT-command cellular modem with an integrated GNSS
//! receiver. This module keeps track of whether that modem is usable and brings
//! it back when it is not.
//!
//! - [`at`] - transaction engine (command line out, response text in)
//! - [`serial`] - serial-port transport (feature `serial`)
//!
//! ## Health states
//!
//! ```text
//! Unresponsive ──test ok──▶ Ready ──session──▶ SessionEstablished
//!      ▲                      │                       │
//!      │                 test failed             test failed
//!      │                      ▼                       ▼
//!      └──────recover──── Faulted ◀───────────────────┘
//! ```
//!
//! A failed liveness probe always leads to a full recovery: hard reset, settle,
//! the initialization sequence, and (when publishing is enabled) a fresh data
//! session. There is no cooldown and no terminal state; a modem that stays dead
//! is reset again on every due relay.

pub mod at;
#[cfg(feature = "serial")]
pub mod serial;

use std::time::Duration;

use log::{debug, info, warn};

pub use at::{AtPort, ModemTransport};

use crate::clock::Clock;
use crate::codec::LocationFix;

pub const PROBE: &str = "AT";
pub const HARD_RESET: &str = "AT+CRESET";
pub const LOCATION_QUERY: &str = "AT+CGPSINFO";
pub const LOCATION_WARM_UP: &str = "AT+CGPS=1,1";
pub const SESSION_ACTIVATE: &str = "AT+CGACT=1,1";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModemState {
    Unresponsive,
    Ready,
    SessionEstablished,
    Faulted,
}

impl ModemState {
    /// Answering commands (with or without a data session).
    pub fn is_ready(&self) -> bool {
        matches!(self, ModemState::Ready | ModemState::SessionEstablished)
    }
}

/// Timeouts and settle delays of the modem vocabulary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModemTiming {
    /// Wait after power-up before the first command.
    pub startup_delay: Duration,
    pub probe_timeout: Duration,
    pub reset_timeout: Duration,
    /// Wait after the hard reset before re-initializing.
    pub reset_settle: Duration,
    /// Wait after each location-subsystem setup command.
    pub init_step_settle: Duration,
    pub location_timeout: Duration,
    pub warm_up_timeout: Duration,
    pub warm_up_settle: Duration,
}

impl Default for ModemTiming {
    fn default() -> Self {
        Self {
            startup_delay: Duration::from_secs(10),
            probe_timeout: Duration::from_secs(2),
            reset_timeout: Duration::from_secs(5),
            reset_settle: Duration::from_secs(10),
            init_step_settle: Duration::from_secs(2),
            location_timeout: Duration::from_secs(10),
            warm_up_timeout: Duration::from_secs(5),
            warm_up_settle: Duration::from_secs(5),
        }
    }
}

/// Packet-data context needed before the broker can be reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub apn: String,
}

impl SessionConfig {
    fn define_context_command(&self) -> String {
        format!("AT+CGDCONT=1,\"IP\",\"{}\",\"0.0.0.0\",0,0", self.apn)
    }
}

/// Command, timeout, and whether the init-step settle delay follows it.
const INIT_SEQUENCE: [(&str, Duration, bool); 5] = [
    ("ATE0", Duration::from_secs(1), false),
    ("AT+CGPSPWR=1", Duration::from_secs(2), true),
    ("AT+CGPSRST=1", Duration::from_secs(2), true),
    ("AT+CGPSIPR=9600", Duration::from_secs(2), true),
    ("AT+CGPSOUT=0", Duration::from_secs(2), false),
];

/// The modem link plus its health state. Only this type changes the state.
pub struct Modem<T, C> {
    port: AtPort<T, C>,
    state: ModemState,
    timing: ModemTiming,
    session: Option<SessionConfig>,
}

impl<T: ModemTransport, C: Clock> Modem<T, C> {
    /// `session` is `Some` when the deployment publishes over a data session.
    pub fn new(port: AtPort<T, C>, timing: ModemTiming, session: Option<SessionConfig>) -> Self {
        Self {
            port,
            state: ModemState::Unresponsive,
            timing,
            session,
        }
    }

    pub fn state(&self) -> ModemState {
        self.state
    }

    pub fn timing(&self) -> &ModemTiming {
        &self.timing
    }

    pub fn requires_session(&self) -> bool {
        self.session.is_some()
    }

    pub fn port(&self) -> &AtPort<T, C> {
        &self.port
    }

    pub fn port_mut(&mut self) -> &mut AtPort<T, C> {
        &mut self.port
    }

    /// Power-on bring-up: startup delay, init sequence, data session if needed.
    pub async fn start(&mut self) -> ModemState {
        info!(
            "Waiting {}s for modem startup",
            self.timing.startup_delay.as_secs()
        );
        self.port.clock().sleep(self.timing.startup_delay).await;
        self.initialize().await;
        if self.requires_session() {
            self.establish_session().await;
        }
        self.state
    }

    /// Liveness probe. A modem that already holds a data session keeps that state.
    pub async fn test(&mut self) -> ModemState {
        let resp = self.port.send_and_wait(PROBE, self.timing.probe_timeout).await;
        self.state = if resp.contains("OK") {
            match self.state {
                ModemState::SessionEstablished => ModemState::SessionEstablished,
                _ => ModemState::Ready,
            }
        } else {
            warn!("Modem failed liveness probe");
            ModemState::Faulted
        };
        self.state
    }

    /// Hard reset and full re-initialization. Blocks for the whole sequence.
    ///
    /// The data session is rebuilt unconditionally when the deployment needs one.
    pub async fn recover(&mut self) -> ModemState {
        warn!("Resetting modem");
        self.port
            .send_and_wait(HARD_RESET, self.timing.reset_timeout)
            .await;
        self.state = ModemState::Unresponsive;
        self.port.clock().sleep(self.timing.reset_settle).await;
        self.initialize().await;
        if self.requires_session() {
            self.establish_session().await;
        }
        info!("Modem recovery finished in state {:?}", self.state);
        self.state
    }

    /// Echo off and location-subsystem setup. Responses are not checked: the
    /// next liveness probe tells whether the modem came up.
    pub async fn initialize(&mut self) {
        debug!("Running modem init sequence");
        for (command, timeout, settle) in INIT_SEQUENCE {
            self.port.send_and_wait(command, timeout).await;
            if settle {
                self.port.clock().sleep(self.timing.init_step_settle).await;
            }
        }
    }

    /// Define and activate the packet-data context. Returns true when both
    /// steps answered `OK`. Both steps are always issued.
    pub async fn establish_session(&mut self) -> bool {
        let Some(session) = self.session.clone() else {
            return false;
        };
        let defined = self
            .port
            .send_and_wait(&session.define_context_command(), Duration::from_secs(5))
            .await
            .contains("OK");
        let activated = self
            .port
            .send_and_wait(SESSION_ACTIVATE, Duration::from_secs(10))
            .await
            .contains("OK");
        if defined && activated {
            info!("Data session established (APN {})", session.apn);
            self.state = ModemState::SessionEstablished;
            true
        } else {
            warn!(
                "Data session setup failed (define ok: {}, activate ok: {})",
                defined, activated
            );
            false
        }
    }

    /// Re-establish the data session if the deployment needs one and it is not up.
    pub async fn ensure_session(&mut self) -> bool {
        if !self.requires_session() || self.state == ModemState::SessionEstablished {
            return true;
        }
        self.establish_session().await
    }

    /// Power the GNSS receiver up and give it time to settle.
    pub async fn warm_up_location(&mut self) {
        self.port
            .send_and_wait(LOCATION_WARM_UP, self.timing.warm_up_timeout)
            .await;
        self.port.clock().sleep(self.timing.warm_up_settle).await;
    }

    pub async fn query_location(&mut self) -> LocationFix {
        let resp = self
            .port
            .send_and_wait(LOCATION_QUERY, self.timing.location_timeout)
            .await;
        let fix = LocationFix::from_response(&resp);
        if !fix.has_fix() {
            debug!("No location fix available");
        }
        fix
    }
}
