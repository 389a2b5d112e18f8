//! Timezone used to render and parse the table's `DATETIME` values
//!
//! Doris stores timestamps without an offset, so both directions go through
//! the wall clock of the configured zone.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use thiserror::Error;

/// Rendering pattern for timestamps embedded in SQL (microsecond precision)
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Parsing pattern; the fractional part is optional and of any width
const PARSE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown timezone `{0}`")]
pub struct InvalidTimezone(pub String);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TimestampError {
    #[error("invalid timestamp `{value}`: {reason}")]
    Format { value: String, reason: String },

    #[error("timestamp `{0}` does not exist in the configured timezone")]
    Nonexistent(String),
}

/// Either the host's local zone or a named IANA zone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    Local,
    Zone(Tz),
}

impl Location {
    /// Resolve an IANA name; the empty string selects the local zone
    pub fn from_name(name: &str) -> Result<Self, InvalidTimezone> {
        if name.is_empty() || name == "Local" {
            return Ok(Location::Local);
        }
        name.parse::<Tz>()
            .map(Location::Zone)
            .map_err(|_| InvalidTimezone(name.to_string()))
    }

    /// Wall-clock time in this zone
    pub fn to_naive(&self, t: DateTime<Utc>) -> NaiveDateTime {
        match self {
            Location::Local => t.with_timezone(&chrono::Local).naive_local(),
            Location::Zone(tz) => t.with_timezone(tz).naive_local(),
        }
    }

    /// Interpret a wall-clock time in this zone
    ///
    /// Ambiguous times (DST fold) resolve to the earlier instant.
    pub fn from_naive(&self, naive: NaiveDateTime) -> Option<DateTime<Utc>> {
        match self {
            Location::Local => chrono::Local
                .from_local_datetime(&naive)
                .earliest()
                .map(|t| t.with_timezone(&Utc)),
            Location::Zone(tz) => tz
                .from_local_datetime(&naive)
                .earliest()
                .map(|t| t.with_timezone(&Utc)),
        }
    }

    /// Render as `YYYY-MM-DD HH:MM:SS.ffffff`
    pub fn format(&self, t: DateTime<Utc>) -> String {
        format_naive(self.to_naive(t))
    }

    pub fn parse(&self, value: &str) -> Result<DateTime<Utc>, TimestampError> {
        let naive = NaiveDateTime::parse_from_str(value.trim(), PARSE_FORMAT).map_err(|e| {
            TimestampError::Format {
                value: value.to_string(),
                reason: e.to_string(),
            }
        })?;
        self.from_naive(naive)
            .ok_or_else(|| TimestampError::Nonexistent(value.to_string()))
    }
}

pub fn format_naive(naive: NaiveDateTime) -> String {
    naive.format(TIME_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn test_from_name() {
        assert_eq!(Location::from_name("").unwrap(), Location::Local);
        assert_eq!(
            Location::from_name("Asia/Shanghai").unwrap(),
            Location::Zone(chrono_tz::Asia::Shanghai)
        );
        assert!(Location::from_name("Mars/Olympus_Mons").is_err());
    }

    #[test]
    fn test_format_in_zone() {
        let loc = Location::from_name("Asia/Shanghai").unwrap();
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 1, 1, 1).unwrap()
            + chrono::Duration::microseconds(1);
        assert_eq!(loc.format(t), "2024-01-01 09:01:01.000001");
    }

    #[test]
    fn test_format_pads_fraction() {
        let loc = Location::Zone(chrono_tz::UTC);
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(loc.format(t), "2024-01-01 00:00:00.000000");
    }

    #[test]
    fn test_parse_in_zone() {
        let loc = Location::from_name("Asia/Shanghai").unwrap();
        let t = loc.parse("2024-01-01 09:01:01.123456").unwrap();
        assert_eq!(t, Utc.with_ymd_and_hms(2024, 1, 1, 1, 1, 1).unwrap() + chrono::Duration::microseconds(123456));

        let t = loc.parse("2024-01-01 09:01:01").unwrap();
        assert_eq!(t.nanosecond(), 0);

        let t = loc.parse("2024-01-01 09:01:01.5").unwrap();
        assert_eq!(t.nanosecond(), 500_000_000);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let loc = Location::Zone(chrono_tz::UTC);
        assert!(matches!(loc.parse("yesterday"), Err(TimestampError::Format { .. })));
        assert!(loc.parse("").is_err());
    }

    #[test]
    fn test_round_trip_through_local_zone() {
        let loc = Location::Local;
        let t = Utc.with_ymd_and_hms(2024, 6, 15, 12, 30, 0).unwrap();
        assert_eq!(loc.parse(&loc.format(t)).unwrap(), t);
    }
}
