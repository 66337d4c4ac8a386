use std::time::{Duration, Instant};

use fieldrelay::cache::ReadingCache;
use fieldrelay::codec::SensorReading;

fn reading() -> SensorReading {
    SensorReading::new(21.5, 55.3, 1013.25)
}

#[test]
fn stale_after_threshold() {
    let t0 = Instant::now();
    let mut cache = ReadingCache::new(Duration::from_secs(300));
    cache.update(reading(), t0);

    assert_eq!(
        cache.reading_for_relay(t0 + Duration::from_secs(299)),
        reading()
    );
    assert_eq!(
        cache.reading_for_relay(t0 + Duration::from_secs(301)),
        SensorReading::UNKNOWN
    );
    // invalidation sticks until the next frame
    assert_eq!(
        cache.reading_for_relay(t0 + Duration::from_secs(302)),
        SensorReading::UNKNOWN
    );
}

#[test]
fn exactly_at_threshold_is_still_fresh() {
    let t0 = Instant::now();
    let mut cache = ReadingCache::new(Duration::from_secs(300));
    cache.update(reading(), t0);
    assert!(!cache.is_stale(t0 + Duration::from_secs(300)));
}

#[test]
fn fresh_frame_after_staleness_is_relayed() {
    let t0 = Instant::now();
    let mut cache = ReadingCache::new(Duration::from_secs(300));
    cache.update(reading(), t0);
    let _ = cache.reading_for_relay(t0 + Duration::from_secs(400));

    let newer = SensorReading::new(22.0, 50.0, 1000.0);
    cache.update(newer, t0 + Duration::from_secs(410));
    assert_eq!(cache.reading_for_relay(t0 + Duration::from_secs(420)), newer);
}

#[test]
fn snapshot_does_not_invalidate() {
    let t0 = Instant::now();
    let mut cache = ReadingCache::new(Duration::from_secs(300));
    cache.update(reading(), t0);
    assert!(cache.is_stale(t0 + Duration::from_secs(301)));
    assert_eq!(cache.snapshot().reading, reading());
}
