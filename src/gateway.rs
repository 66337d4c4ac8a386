//! # Relay Orchestrator
//!
//! [`Gateway`] owns every piece of mutable state (radio, modem, cache,
//! timers) and runs them from one cooperative control loop. Each call to
//! [`Gateway::tick`] evaluates the timers in a fixed order:
//!
//! 1. radio poll: bounded receive, decode, cache update
//! 2. publish relay, then SMS relay: staleness check, liveness probe, location,
//!    send sequence, cache policy
//! 3. device reset
//!
//! Every step runs to completion before the next one is considered. Nothing
//! here fails the loop: errors are logged, reported as [`Event`]s and retried
//! when the timer next comes due.

use std::future::Future;
use std::time::Duration;

use log::{debug, info, warn};

use crate::cache::ReadingCache;
use crate::clock::Clock;
use crate::codec::{outgoing_message, DecodeStrategy};
use crate::error::{GatewayError, RelayError};
use crate::events::{Channel, Event, EventSink};
use crate::logutil::escape_log;
use crate::metrics;
use crate::modem::{Modem, ModemState, ModemTransport};
use crate::radio::{receive_within, Radio, RadioError};
use crate::scheduler::{Activity, Scheduler};
use crate::uplink::{self, BrokerConfig};

/// Schedule and cache policy of one relay channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelPolicy {
    pub interval: Duration,
    /// Invalidate the cached reading after a successful send.
    pub consume_on_success: bool,
    /// Run the GNSS warm-up before the location query.
    pub location_warm_up: bool,
}

/// Everything the orchestrator needs besides its peripherals.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewaySettings {
    pub decode: DecodeStrategy,
    pub frame_limit: usize,
    pub receive_window: Duration,
    pub radio_frequency_mhz: f32,
    pub radio_power_dbm: i8,
    pub radio_poll_interval: Duration,
    pub staleness: Duration,
    /// `None` disables the periodic device reset.
    pub device_reset_interval: Option<Duration>,
    /// `None` disables the channel.
    pub sms: Option<ChannelPolicy>,
    pub publish: Option<ChannelPolicy>,
    pub recipient: String,
    pub broker: BrokerConfig,
    pub loop_pause: Duration,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        crate::config::Config::default().gateway_settings()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Continue,
    /// The device-reset timer fired; the caller rebuilds the gateway.
    DeviceReset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunExit {
    Shutdown,
    DeviceReset,
}

pub struct Gateway<R, T, C, E> {
    radio: R,
    modem: Modem<T, C>,
    clock: C,
    cache: ReadingCache,
    scheduler: Scheduler,
    settings: GatewaySettings,
    events: E,
}

impl<R, T, C, E> Gateway<R, T, C, E>
where
    R: Radio,
    T: ModemTransport,
    C: Clock,
    E: EventSink,
{
    /// Timers start now: each activity first fires one interval from this call.
    pub fn new(radio: R, modem: Modem<T, C>, settings: GatewaySettings, events: E) -> Self {
        let clock = modem.port().clock().clone();
        let now = clock.now();
        let mut scheduler = Scheduler::new();
        scheduler.register(Activity::RadioPoll, settings.radio_poll_interval, now);
        if let Some(policy) = settings.publish {
            scheduler.register(Activity::PublishRelay, policy.interval, now);
        }
        if let Some(policy) = settings.sms {
            scheduler.register(Activity::SmsRelay, policy.interval, now);
        }
        if let Some(interval) = settings.device_reset_interval {
            scheduler.register(Activity::DeviceReset, interval, now);
        }
        Self {
            radio,
            modem,
            clock,
            cache: ReadingCache::new(settings.staleness),
            scheduler,
            settings,
            events,
        }
    }

    pub fn cache(&self) -> &ReadingCache {
        &self.cache
    }

    pub fn modem(&self) -> &Modem<T, C> {
        &self.modem
    }

    pub fn radio(&self) -> &R {
        &self.radio
    }

    pub fn radio_mut(&mut self) -> &mut R {
        &mut self.radio
    }

    pub fn events(&self) -> &E {
        &self.events
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn settings(&self) -> &GatewaySettings {
        &self.settings
    }

    /// Bring up the radio, then the modem.
    ///
    /// A radio that cannot be initialized is the one unrecoverable condition:
    /// `init-fatal` is emitted and the error returned.
    pub async fn start(&mut self) -> Result<(), GatewayError> {
        if let Err(e) = self.bring_up_radio() {
            self.events.emit(Event::InitFatal);
            return Err(GatewayError::InitFatal(e));
        }
        info!(
            "Radio ready at {} MHz, {} dBm",
            self.settings.radio_frequency_mhz, self.settings.radio_power_dbm
        );
        let state = self.modem.start().await;
        info!("Modem bring-up finished in state {:?}", state);
        Ok(())
    }

    fn bring_up_radio(&mut self) -> Result<(), RadioError> {
        self.radio.init()?;
        self.radio.set_frequency(self.settings.radio_frequency_mhz)?;
        self.radio.set_power(self.settings.radio_power_dbm)?;
        Ok(())
    }

    /// Run every due activity once, in order.
    pub async fn tick(&mut self) -> TickOutcome {
        for activity in Activity::ALL {
            let now = self.clock.now();
            if !self.scheduler.fire_if_due(activity, now) {
                continue;
            }
            match activity {
                Activity::RadioPoll => self.poll_radio().await,
                Activity::PublishRelay => {
                    let _ = self.relay(Channel::Publish).await;
                }
                Activity::SmsRelay => {
                    let _ = self.relay(Channel::Sms).await;
                }
                Activity::DeviceReset => {
                    info!("Device reset interval reached");
                    metrics::inc_device_resets();
                    return TickOutcome::DeviceReset;
                }
            }
        }
        TickOutcome::Continue
    }

    /// Wait up to the receive window for one frame and fold it into the cache.
    pub async fn poll_radio(&mut self) {
        let received = receive_within(
            &mut self.radio,
            &self.clock,
            self.settings.frame_limit,
            self.settings.receive_window,
        )
        .await;
        match received {
            Ok(Some(frame)) => {
                let text = String::from_utf8_lossy(&frame);
                match self.settings.decode.decode(&text) {
                    Ok(reading) => {
                        let now = self.clock.now();
                        self.cache.update(reading, now);
                        info!("Received reading {}", reading);
                        self.events.emit(Event::RadioDecodeOk);
                    }
                    Err(e) => {
                        warn!("Discarding frame {}: {}", escape_log(&text), e);
                        self.events.emit(Event::RadioDecodeFail);
                    }
                }
            }
            Ok(None) => {
                debug!(
                    "No frame within {} ms, clearing cached reading",
                    self.settings.receive_window.as_millis()
                );
                self.cache.invalidate();
            }
            Err(e) => {
                warn!("Radio receive failed: {}", e);
                self.events.emit(Event::RadioRxFail);
            }
        }
    }

    fn policy(&self, channel: Channel) -> Option<ChannelPolicy> {
        match channel {
            Channel::Sms => self.settings.sms,
            Channel::Publish => self.settings.publish,
        }
    }

    /// One relay attempt on `channel`.
    ///
    /// A modem that fails the liveness probe is reset instead of used, and the
    /// attempt ends with [`RelayError::PeripheralFaulted`].
    pub async fn relay(&mut self, channel: Channel) -> Result<(), RelayError> {
        let Some(policy) = self.policy(channel) else {
            debug!("{} channel disabled", channel);
            return Ok(());
        };

        let now = self.clock.now();
        let reading = self.cache.reading_for_relay(now);

        if self.modem.test().await == ModemState::Faulted {
            self.modem.recover().await;
            self.events.emit(Event::ModemResetAttempted);
            return Err(RelayError::PeripheralFaulted);
        }

        if channel == Channel::Publish {
            self.modem.ensure_session().await;
        }
        if policy.location_warm_up {
            self.modem.warm_up_location().await;
        }
        let location = self.modem.query_location().await;
        let message = outgoing_message(&reading, &location);
        debug!("Relaying over {}: {}", channel, message);

        let result = match channel {
            Channel::Sms => {
                uplink::send_sms(self.modem.port_mut(), &self.settings.recipient, &message).await
            }
            Channel::Publish => {
                uplink::publish(self.modem.port_mut(), &self.settings.broker, &message).await
            }
        };

        match &result {
            Ok(()) => {
                self.events.emit(Event::RelayOk(channel));
                if policy.consume_on_success {
                    self.cache.invalidate();
                }
            }
            Err(e) => {
                warn!("{} relay failed: {}", channel, e);
                self.events.emit(Event::RelayFail(channel));
            }
        }
        result
    }

    /// Tick until `shutdown` resolves or the device-reset timer fires.
    ///
    /// Shutdown is only observed during the pause between ticks.
    pub async fn run<F: Future>(&mut self, shutdown: F) -> RunExit {
        tokio::pin!(shutdown);
        loop {
            if self.tick().await == TickOutcome::DeviceReset {
                return RunExit::DeviceReset;
            }
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    return RunExit::Shutdown;
                }
                _ = self.clock.sleep(self.settings.loop_pause) => {}
            }
        }
    }
}
