use time::{macros::format_description, Duration, OffsetDateTime, UtcOffset};

/// Device time minus client time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClockOffset(Duration);

impl ClockOffset {
    pub const fn zero() -> Self {
        Self(Duration::ZERO)
    }

    pub fn from_seconds(seconds: i64) -> Self {
        Self(Duration::seconds(seconds))
    }

    /// Offset from a device clock reading taken at local time `local`.
    pub fn from_device_time(device: OffsetDateTime, local: OffsetDateTime) -> Self {
        Self(device - local)
    }

    pub fn as_duration(&self) -> Duration {
        self.0
    }

    pub fn apply(&self, local: OffsetDateTime) -> OffsetDateTime {
        local + self.0
    }

    pub fn corrected_now(&self) -> OffsetDateTime {
        self.apply(OffsetDateTime::now_utc())
    }
}

/// `Created` value of a UsernameToken, always rendered in UTC.
pub fn format_created(at: OffsetDateTime) -> Result<String, time::error::Format> {
    let format = format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].000Z");
    at.to_offset(UtcOffset::UTC).format(&format)
}
