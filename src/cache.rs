//! Single-slot store for the latest radio reading.

use std::time::{Duration, Instant};

use log::debug;

use crate::codec::SensorReading;

/// Default age after which a cached reading is no longer relayed.
pub const DEFAULT_STALENESS: Duration = Duration::from_secs(300);

/// The cached reading and when it arrived. `received_at` is `None` until the
/// first frame has been decoded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CachedReading {
    pub reading: SensorReading,
    pub received_at: Option<Instant>,
}

#[derive(Debug, Clone)]
pub struct ReadingCache {
    current: CachedReading,
    staleness: Duration,
}

impl ReadingCache {
    pub fn new(staleness: Duration) -> Self {
        Self {
            current: CachedReading {
                reading: SensorReading::UNKNOWN,
                received_at: None,
            },
            staleness,
        }
    }

    /// Replace the reading. The arrival time never moves backwards, even if the
    /// caller's clock does.
    pub fn update(&mut self, reading: SensorReading, now: Instant) {
        let received_at = match self.current.received_at {
            Some(prev) if prev > now => prev,
            _ => now,
        };
        self.current = CachedReading {
            reading,
            received_at: Some(received_at),
        };
    }

    /// Reset to all-sentinel. The arrival time of the last frame is kept.
    pub fn invalidate(&mut self) {
        self.current.reading = SensorReading::UNKNOWN;
    }

    pub fn snapshot(&self) -> CachedReading {
        self.current
    }

    pub fn staleness(&self) -> Duration {
        self.staleness
    }

    /// True when a present reading is older than the staleness threshold at `now`.
    pub fn is_stale(&self, now: Instant) -> bool {
        match self.current.received_at {
            Some(at) if self.current.reading.is_present() => {
                now.saturating_duration_since(at) > self.staleness
            }
            _ => false,
        }
    }

    /// The reading a relay attempt at `now` should carry. A stale reading is
    /// invalidated first, so the relay sends sentinels instead of old data.
    pub fn reading_for_relay(&mut self, now: Instant) -> SensorReading {
        if self.is_stale(now) {
            debug!(
                "cached reading older than {}s, invalidating",
                self.staleness.as_secs()
            );
            self.invalidate();
        }
        self.current.reading
    }
}

impl Default for ReadingCache {
    fn default() -> Self {
        Self::new(DEFAULT_STALENESS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_unknown() {
        let cache = ReadingCache::default();
        let snap = cache.snapshot();
        assert_eq!(snap.reading, SensorReading::UNKNOWN);
        assert!(snap.received_at.is_none());
        assert!(!cache.is_stale(Instant::now()));
    }

    #[test]
    fn received_at_is_monotonic() {
        let t0 = Instant::now();
        let mut cache = ReadingCache::default();
        cache.update(SensorReading::new(1.0, 2.0, 3.0), t0 + Duration::from_secs(10));
        cache.update(SensorReading::new(4.0, 5.0, 6.0), t0);
        let snap = cache.snapshot();
        assert_eq!(snap.reading.temperature, 4.0);
        assert_eq!(snap.received_at, Some(t0 + Duration::from_secs(10)));
    }

    #[test]
    fn invalidate_keeps_arrival_time() {
        let t0 = Instant::now();
        let mut cache = ReadingCache::default();
        cache.update(SensorReading::new(1.0, 2.0, 3.0), t0);
        cache.invalidate();
        assert_eq!(cache.snapshot().reading, SensorReading::UNKNOWN);
        assert_eq!(cache.snapshot().received_at, Some(t0));
    }
}
