use chrono::{NaiveDateTime, Timelike};
use parking_lot::Mutex;

const MORNING_HOURS: std::ops::RangeInclusive<u32> = 5..=7;
const EVENING_HOURS: std::ops::RangeInclusive<u32> = 17..=19;
const NOON: u32 = 12;

/// Whether the 30-day history should be fetched at local time `now`, given
/// the local time of the last collection.
///
/// Collects on the first pass, on every new calendar day, and once in each of
/// the morning (05-07) and evening (17-19) windows.
pub fn should_collect_bulk(now: NaiveDateTime, last: Option<NaiveDateTime>) -> bool {
    let Some(last) = last else {
        return true;
    };

    if now.date() != last.date() {
        return true;
    }

    let hour = now.hour();
    if MORNING_HOURS.contains(&hour) {
        return last.hour() >= NOON;
    }
    if EVENING_HOURS.contains(&hour) {
        return last.hour() < NOON;
    }
    false
}

/// Remembers the last bulk collection. [`CollectionWindow::claim`] checks
/// and records under a single lock.
#[derive(Debug, Default)]
pub struct CollectionWindow {
    last: Mutex<Option<NaiveDateTime>>,
}

impl CollectionWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true and records `now` when a collection is due.
    pub fn claim(&self, now: NaiveDateTime) -> bool {
        let mut last = self.last.lock();
        if !should_collect_bulk(now, *last) {
            return false;
        }
        *last = Some(now);
        true
    }

    pub fn last(&self) -> Option<NaiveDateTime> {
        *self.last.lock()
    }
}
