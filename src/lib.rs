//! # fieldrelay - Field Telemetry Gateway
//!
//! fieldrelay relays environmental readings from a remote sensor node to a
//! cellular uplink. The node transmits short text frames over a sub-GHz radio
//! link; the gateway caches the latest reading and forwards it by SMS and/or a
//! publish-subscribe broker on its own schedule, driving the cellular modem
//! through AT commands.
//!
//! ## Features
//!
//! - **AT Transaction Engine**: Deadline-bounded command/response exchanges that never overrun their budget.
//! - **Defensive Frame Decoding**: Order-tolerant lenient decoder or strict all-or-nothing decoder, selectable per deployment.
//! - **Store-and-Forward Cache**: Single-slot latest reading with staleness invalidation and per-channel consumption policy.
//! - **Modem Supervision**: Liveness probe with automatic hard reset, re-initialization, and data-session rebuild.
//! - **Independent Timers**: Radio poll, SMS relay, publish relay, and periodic device reset each on their own interval.
//! - **Deterministic Testing**: Every wait goes through an injectable clock.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fieldrelay::clock::TokioClock;
//! use fieldrelay::config::Config;
//! use fieldrelay::events::LogSink;
//! use fieldrelay::gateway::Gateway;
//! use fieldrelay::modem::{serial::SerialModem, AtPort, Modem};
//! use fieldrelay::radio::serial::SerialRadio;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     let port = AtPort::new(SerialModem::open(&config.modem.port, config.modem.baud_rate)?, TokioClock);
//!     let modem = Modem::new(port, config.modem_timing(), config.session());
//!     let radio = SerialRadio::open(&config.radio.port, config.radio.baud_rate)?;
//!
//!     let mut gateway = Gateway::new(radio, modem, config.gateway_settings(), LogSink);
//!     gateway.start().await?;
//!     gateway.run(tokio::signal::ctrl_c()).await;
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`gateway`] - Relay orchestrator and control loop
//! - [`modem`] - Modem health state machine and the AT transaction engine
//! - [`uplink`] - SMS and broker publish send sequences
//! - [`radio`] - Radio driver interface and bounded receive
//! - [`codec`] - Sensor frame and location formats
//! - [`cache`] - Latest-reading store
//! - [`scheduler`] - Interval timers
//! - [`node`] - Sensor-node transmitter
//! - [`config`] - Configuration loading and validation
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐      radio       ┌─────────────────┐
//! │   Sensor Node   │ ───────────────▶ │     Gateway     │ ← timers, cache
//! └─────────────────┘   T:..,H:..,P:.. └─────────────────┘
//!                                               │ AT commands
//!                                      ┌─────────────────┐
//!                                      │  Cellular Modem │ → SMS / broker
//!                                      └─────────────────┘
//! ```

pub mod cache;
pub mod clock;
pub mod codec;
pub mod config;
pub mod error;
pub mod events;
pub mod gateway;
pub mod logutil;
pub mod metrics;
pub mod modem;
pub mod node;
pub mod radio;
pub mod scheduler;
pub mod uplink;
