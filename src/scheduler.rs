//! Interval timers for the gateway's periodic activities.
//!
//! There is no background task here: the control loop asks the scheduler which
//! timers are due and runs each activity to completion before asking about the
//! next one. A timer that fires records the current instant as its last firing,
//! so an activity that overruns its own interval fires again on the next check
//! and never more than once per check.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Activity {
    RadioPoll,
    PublishRelay,
    SmsRelay,
    DeviceReset,
}

impl Activity {
    /// Evaluation order within one tick.
    pub const ALL: [Activity; 4] = [
        Activity::RadioPoll,
        Activity::PublishRelay,
        Activity::SmsRelay,
        Activity::DeviceReset,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timer {
    pub last_fired: Instant,
    pub interval: Duration,
}

impl Timer {
    pub fn new(interval: Duration, start: Instant) -> Self {
        Self {
            last_fired: start,
            interval,
        }
    }

    pub fn is_due(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last_fired) >= self.interval
    }

    /// Time left until the timer is due (zero when already due).
    pub fn remaining(&self, now: Instant) -> Duration {
        self.interval
            .saturating_sub(now.saturating_duration_since(self.last_fired))
    }
}

/// One timer per registered activity. Unregistered activities never fire.
#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    timers: Vec<(Activity, Timer)>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or re-register) `activity`; its first firing is one interval after `start`.
    pub fn register(&mut self, activity: Activity, interval: Duration, start: Instant) {
        let timer = Timer::new(interval, start);
        match self.timers.iter_mut().find(|(a, _)| *a == activity) {
            Some(slot) => slot.1 = timer,
            None => self.timers.push((activity, timer)),
        }
    }

    pub fn timer(&self, activity: Activity) -> Option<&Timer> {
        self.timers
            .iter()
            .find(|(a, _)| *a == activity)
            .map(|(_, t)| t)
    }

    /// If `activity` is due at `now`, mark it fired and return true.
    pub fn fire_if_due(&mut self, activity: Activity, now: Instant) -> bool {
        match self.timers.iter_mut().find(|(a, _)| *a == activity) {
            Some((_, timer)) if timer.is_due(now) => {
                timer.last_fired = now;
                true
            }
            _ => false,
        }
    }

    /// Evaluate every timer in registration order, calling `on_fire` for each due one.
    pub fn tick(&mut self, now: Instant, mut on_fire: impl FnMut(Activity)) {
        for (activity, timer) in self.timers.iter_mut() {
            if timer.is_due(now) {
                timer.last_fired = now;
                on_fire(*activity);
            }
        }
    }

    /// Shortest wait until any registered timer is due.
    pub fn next_due_in(&self, now: Instant) -> Option<Duration> {
        self.timers.iter().map(|(_, t)| t.remaining(now)).min()
    }
}
