//! # Configuration Management Module
//!
//! The gateway and the sensor node read one TOML file. Every value has a
//! default matching the field deployment, so a file only needs the sections it
//! changes.
//!
//! ## Configuration Structure
//!
//! - [`ModemConfig`] - modem serial link and bring-up delays
//! - [`RadioConfig`] - radio link, tuning, and frame hygiene
//! - [`DecodeConfig`] - which frame decoder the peer is read with
//! - [`SmsConfig`] / [`PublishConfig`] - relay channels
//! - [`ScheduleConfig`] - radio poll, device reset, staleness
//! - [`NodeConfig`] - sensor-node transmit interval
//! - [`LoggingConfig`] - log level and optional file
//!
//! ## Usage
//!
//! ```rust,no_run
//! use fieldrelay::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     config.validate()?;
//!     println!("Modem port: {}", config.modem.port);
//!
//!     Config::create_default("config.toml").await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration File Format
//!
//! ```toml
//! [modem]
//! port = "/dev/ttyUSB0"
//! baud_rate = 115200
//!
//! [sms]
//! enabled = true
//! recipient = "+15550100000"
//! interval_secs = 1800
//!
//! [publish]
//! enabled = false
//! ```

use std::time::Duration;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::cache::DEFAULT_STALENESS;
use crate::codec::DecodeStrategy;
use crate::gateway::{ChannelPolicy, GatewaySettings};
use crate::modem::{ModemTiming, SessionConfig};
use crate::radio;
use crate::uplink::BrokerConfig;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ModemConfig {
    pub port: String,
    pub baud_rate: u32,
    /// Wait after power-up before the first command (seconds).
    pub startup_delay_secs: u64,
    /// Wait after `AT+CRESET` before re-initializing (seconds).
    pub reset_settle_secs: u64,
    /// Wait after each location-subsystem setup command (ms).
    pub init_step_settle_ms: u64,
    /// Gap between reads while waiting for a response (ms).
    pub poll_interval_ms: u64,
}

impl Default for ModemConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
            baud_rate: 115200,
            startup_delay_secs: 10,
            reset_settle_secs: 10,
            init_step_settle_ms: 2000,
            poll_interval_ms: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RadioConfig {
    pub port: String,
    pub baud_rate: u32,
    pub frequency_mhz: f32,
    pub tx_power_dbm: i8,
    /// Frames longer than this are truncated before decoding.
    pub frame_limit: usize,
    /// How long one radio poll waits for a frame (ms).
    pub receive_window_ms: u64,
}

impl Default for RadioConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB1".to_string(),
            baud_rate: 9600,
            frequency_mhz: radio::DEFAULT_FREQUENCY_MHZ,
            tx_power_dbm: radio::DEFAULT_TX_POWER_DBM,
            frame_limit: radio::DEFAULT_FRAME_LIMIT,
            receive_window_ms: radio::DEFAULT_RECEIVE_WINDOW.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct DecodeConfig {
    pub strategy: DecodeStrategy,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SmsConfig {
    pub enabled: bool,
    pub recipient: String,
    pub interval_secs: u64,
    /// Invalidate the cached reading after a successful send.
    pub consume_on_success: bool,
    /// Power up the GNSS receiver before querying the location.
    pub location_warm_up: bool,
}

impl Default for SmsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            recipient: "+15550100000".to_string(),
            interval_secs: 1800,
            consume_on_success: true,
            location_warm_up: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PublishConfig {
    pub enabled: bool,
    /// Access point name for the packet-data session.
    pub apn: String,
    pub broker_host: String,
    pub broker_port: u16,
    pub client_id: String,
    pub topic: String,
    pub keepalive_secs: u32,
    pub interval_secs: u64,
    pub consume_on_success: bool,
    pub location_warm_up: bool,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            apn: "internet".to_string(),
            broker_host: "test.mosquitto.org".to_string(),
            broker_port: 1883,
            client_id: "fieldrelay-gateway".to_string(),
            topic: "field/gateway/sensors".to_string(),
            keepalive_secs: 120,
            interval_secs: 60,
            consume_on_success: false,
            location_warm_up: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ScheduleConfig {
    /// 0 polls the radio on every tick.
    pub radio_poll_interval_ms: u64,
    /// Full device reset period; 0 disables it.
    pub device_reset_interval_secs: u64,
    /// Age after which a cached reading is not relayed.
    pub staleness_secs: u64,
    /// Pause between ticks (ms).
    pub loop_pause_ms: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            radio_poll_interval_ms: 0,
            device_reset_interval_secs: 2400,
            staleness_secs: DEFAULT_STALENESS.as_secs(),
            loop_pause_ms: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct NodeConfig {
    pub transmit_interval_ms: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            transmit_interval_ms: 5000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: Some("fieldrelay.log".to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub modem: ModemConfig,
    #[serde(default)]
    pub radio: RadioConfig,
    #[serde(default)]
    pub decode: DecodeConfig,
    #[serde(default)]
    pub sms: SmsConfig,
    #[serde(default)]
    pub publish: PublishConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub node: NodeConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a file
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;

        Ok(config)
    }

    /// Create a default configuration file
    pub async fn create_default(path: &str) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }

    /// Reject configurations the gateway cannot run with.
    pub fn validate(&self) -> Result<()> {
        if !self.sms.enabled && !self.publish.enabled {
            return Err(anyhow!("At least one of [sms] or [publish] must be enabled"));
        }
        if self.sms.enabled {
            if self.sms.recipient.trim().is_empty() {
                return Err(anyhow!("[sms].recipient must not be empty"));
            }
            if self.sms.interval_secs == 0 {
                return Err(anyhow!("[sms].interval_secs must be greater than 0"));
            }
        }
        if self.publish.enabled {
            if self.publish.topic.trim().is_empty() {
                return Err(anyhow!("[publish].topic must not be empty"));
            }
            if self.publish.broker_host.trim().is_empty() {
                return Err(anyhow!("[publish].broker_host must not be empty"));
            }
            if self.publish.apn.trim().is_empty() {
                return Err(anyhow!("[publish].apn must not be empty"));
            }
            if self.publish.interval_secs == 0 {
                return Err(anyhow!("[publish].interval_secs must be greater than 0"));
            }
        }
        if self.radio.frame_limit == 0 {
            return Err(anyhow!("[radio].frame_limit must be greater than 0"));
        }
        if !(self.radio.frequency_mhz.is_finite() && self.radio.frequency_mhz > 0.0) {
            return Err(anyhow!(
                "[radio].frequency_mhz {} is not a usable frequency",
                self.radio.frequency_mhz
            ));
        }
        Ok(())
    }

    pub fn modem_timing(&self) -> ModemTiming {
        ModemTiming {
            startup_delay: Duration::from_secs(self.modem.startup_delay_secs),
            reset_settle: Duration::from_secs(self.modem.reset_settle_secs),
            init_step_settle: Duration::from_millis(self.modem.init_step_settle_ms),
            ..ModemTiming::default()
        }
    }

    /// Data session parameters; only needed when publishing.
    pub fn session(&self) -> Option<SessionConfig> {
        self.publish.enabled.then(|| SessionConfig {
            apn: self.publish.apn.clone(),
        })
    }

    pub fn broker(&self) -> BrokerConfig {
        BrokerConfig {
            host: self.publish.broker_host.clone(),
            port: self.publish.broker_port,
            client_id: self.publish.client_id.clone(),
            topic: self.publish.topic.clone(),
            keepalive_secs: self.publish.keepalive_secs,
        }
    }

    pub fn gateway_settings(&self) -> GatewaySettings {
        GatewaySettings {
            decode: self.decode.strategy,
            frame_limit: self.radio.frame_limit,
            receive_window: Duration::from_millis(self.radio.receive_window_ms),
            radio_frequency_mhz: self.radio.frequency_mhz,
            radio_power_dbm: self.radio.tx_power_dbm,
            radio_poll_interval: Duration::from_millis(self.schedule.radio_poll_interval_ms),
            staleness: Duration::from_secs(self.schedule.staleness_secs),
            device_reset_interval: (self.schedule.device_reset_interval_secs > 0)
                .then(|| Duration::from_secs(self.schedule.device_reset_interval_secs)),
            sms: self.sms.enabled.then(|| ChannelPolicy {
                interval: Duration::from_secs(self.sms.interval_secs),
                consume_on_success: self.sms.consume_on_success,
                location_warm_up: self.sms.location_warm_up,
            }),
            publish: self.publish.enabled.then(|| ChannelPolicy {
                interval: Duration::from_secs(self.publish.interval_secs),
                consume_on_success: self.publish.consume_on_success,
                location_warm_up: self.publish.location_warm_up,
            }),
            recipient: self.sms.recipient.clone(),
            broker: self.broker(),
            loop_pause: Duration::from_millis(self.schedule.loop_pause_ms),
        }
    }
}
