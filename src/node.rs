//! Remote sensor node: read the sensor, encode a frame, send it over the radio.

use std::future::Future;
use std::time::Duration;

use bytes::Bytes;
use log::{debug, info, warn};
use rand::Rng;
use thiserror::Error;

use crate::clock::Clock;
use crate::codec::SensorReading;
use crate::radio::{Radio, RadioError};

#[derive(Debug, Error)]
pub enum SensorError {
    #[error("sensor not responding")]
    NotResponding,
    #[error("sensor read failed: {0}")]
    Read(String),
}

pub trait Sensor {
    fn read(&mut self) -> Result<SensorReading, SensorError>;
}

/// Uniformly random readings in plausible outdoor ranges.
#[derive(Debug, Default)]
pub struct SimulatedSensor;

impl SimulatedSensor {
    pub fn new() -> Self {
        Self
    }
}

/// Whole part in `[lo, hi)` plus hundredths, like a two-decimal instrument.
fn hundredths<R: Rng>(rng: &mut R, lo: u32, hi: u32) -> f32 {
    let whole = rng.gen_range(lo..hi);
    let frac = rng.gen_range(0..100u32);
    whole as f32 + frac as f32 / 100.0
}

impl Sensor for SimulatedSensor {
    fn read(&mut self) -> Result<SensorReading, SensorError> {
        let mut rng = rand::thread_rng();
        Ok(SensorReading::new(
            hundredths(&mut rng, 20, 31),
            hundredths(&mut rng, 30, 81),
            hundredths(&mut rng, 990, 1031),
        ))
    }
}

pub struct SensorNode<S, R, C> {
    sensor: S,
    radio: R,
    clock: C,
    interval: Duration,
}

impl<S: Sensor, R: Radio, C: Clock> SensorNode<S, R, C> {
    pub fn new(sensor: S, radio: R, clock: C, interval: Duration) -> Self {
        Self {
            sensor,
            radio,
            clock,
            interval,
        }
    }

    pub fn radio(&self) -> &R {
        &self.radio
    }

    /// Initialize and tune the radio.
    pub fn start(&mut self, frequency_mhz: f32, power_dbm: i8) -> Result<(), RadioError> {
        self.radio.init()?;
        self.radio.set_frequency(frequency_mhz)?;
        self.radio.set_power(power_dbm)?;
        info!("Sensor node radio ready at {} MHz, {} dBm", frequency_mhz, power_dbm);
        Ok(())
    }

    /// Read once and send the frame. A failed sensor read sends sentinels so the
    /// gateway still sees the node alive.
    pub fn transmit_once(&mut self) -> Result<String, RadioError> {
        let reading = match self.sensor.read() {
            Ok(r) => r,
            Err(e) => {
                warn!("Sensor read failed: {}", e);
                SensorReading::UNKNOWN
            }
        };
        let frame = reading.encode();
        self.radio.send(Bytes::from(frame.clone()))?;
        debug!("Sent frame {}", frame);
        Ok(frame)
    }

    /// Transmit every interval until `shutdown` resolves. Transmit errors are
    /// logged and the next interval tried.
    pub async fn run<F: Future>(&mut self, shutdown: F) {
        tokio::pin!(shutdown);
        loop {
            if let Err(e) = self.transmit_once() {
                warn!("Transmit failed: {}", e);
            }
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("Sensor node stopping");
                    return;
                }
                _ = self.clock.sleep(self.interval) => {}
            }
        }
    }
}
