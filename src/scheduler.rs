use chrono::{DateTime, Duration, Utc};

/// Repeating deadline for the engine's periodic tick.
///
/// Nothing sleeps here: the event loop asks `due` whenever it wakes, and
/// `until_due` tells it how long it may wait for input before asking again.
/// A late poll fires once and re-arms from `now`, so missed intervals are
/// never replayed.
#[derive(Debug, Clone)]
pub struct Ticker {
    interval: Duration,
    next_due: DateTime<Utc>,
}

impl Ticker {
    pub fn start(interval: Duration, now: DateTime<Utc>) -> Self {
        Self {
            interval,
            next_due: now + interval,
        }
    }

    pub fn due(&mut self, now: DateTime<Utc>) -> bool {
        if now < self.next_due {
            return false;
        }
        self.next_due = now + self.interval;
        true
    }

    pub fn until_due(&self, now: DateTime<Utc>) -> std::time::Duration {
        (self.next_due - now).to_std().unwrap_or_default()
    }
}
