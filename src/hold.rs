use chrono::{Duration, NaiveDateTime};

/// Absolute start/end window for a climate hold, computed from the device's
/// own clock so the hold lines up with thermostat-local time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HoldWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl HoldWindow {
    pub fn starting_at(start: NaiveDateTime, minutes: i64) -> Self {
        Self {
            start,
            end: start + Duration::minutes(minutes),
        }
    }
}
