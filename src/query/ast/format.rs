//! Textual forms of literal values.
//!
//! These layouts are what the query language lexes back in, so they must not
//! drift: numbers keep three decimals, durations use unit suffixes and
//! timestamps use a quoted UTC layout.

use chrono::{DateTime, Duration, Utc};

/// Layout of a time literal, without the fractional seconds.
pub const DATE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const NANOS_PER_MICRO: i64 = 1_000;
const NANOS_PER_MILLI: i64 = 1_000_000;
const NANOS_PER_SECOND: i64 = 1_000_000_000;
const NANOS_PER_MINUTE: i64 = 60 * NANOS_PER_SECOND;
const NANOS_PER_HOUR: i64 = 60 * NANOS_PER_MINUTE;
const NANOS_PER_DAY: i64 = 24 * NANOS_PER_HOUR;
const NANOS_PER_WEEK: i64 = 7 * NANOS_PER_DAY;

/// Returns the duration in nanoseconds, saturating at the bounds of `i64`.
pub fn duration_nanos(d: &Duration) -> i64 {
    d.num_nanoseconds()
        .unwrap_or(if *d < Duration::zero() { i64::MIN } else { i64::MAX })
}

/// Formats a duration using the largest unit that divides it evenly.
pub fn format_duration(d: &Duration) -> String {
    let nanos = duration_nanos(d);
    if nanos == 0 {
        "0s".to_string()
    } else if nanos % NANOS_PER_WEEK == 0 {
        format!("{}w", nanos / NANOS_PER_WEEK)
    } else if nanos % NANOS_PER_DAY == 0 {
        format!("{}d", nanos / NANOS_PER_DAY)
    } else if nanos % NANOS_PER_HOUR == 0 {
        format!("{}h", nanos / NANOS_PER_HOUR)
    } else if nanos % NANOS_PER_MINUTE == 0 {
        format!("{}m", nanos / NANOS_PER_MINUTE)
    } else if nanos % NANOS_PER_SECOND == 0 {
        format!("{}s", nanos / NANOS_PER_SECOND)
    } else if nanos % NANOS_PER_MILLI == 0 {
        format!("{}ms", nanos / NANOS_PER_MILLI)
    } else {
        // Sub-microsecond precision is not representable in the language.
        format!("{}u", nanos / NANOS_PER_MICRO)
    }
}

/// Formats a timestamp as `YYYY-MM-DD HH:MM:SS[.ffffff]` in UTC.
/// Trailing zeros of the fraction are trimmed.
pub fn format_time(t: &DateTime<Utc>) -> String {
    let mut s = t.format(DATE_TIME_FORMAT).to_string();
    let micros = t.timestamp_subsec_micros();
    if micros > 0 {
        let fraction = format!("{:06}", micros);
        s.push('.');
        s.push_str(fraction.trim_end_matches('0'));
    }
    s
}

/// Wraps a string in single quotes, escaping anything that would break lexing.
pub fn quote_string(s: &str) -> String {
    let mut quoted = String::with_capacity(s.len() + 2);
    quoted.push('\'');
    for c in s.chars() {
        match c {
            '\n' => quoted.push_str("\\n"),
            '\\' => quoted.push_str("\\\\"),
            '\'' => quoted.push_str("\\'"),
            c => quoted.push(c),
        }
    }
    quoted.push('\'');
    quoted
}

/// Serde adapter storing a duration as signed nanoseconds.
pub mod serde_nanos {
    use chrono::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(super::duration_nanos(d))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::nanoseconds(i64::deserialize(deserializer)?))
    }

    pub mod option {
        use chrono::Duration;
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            d: &Option<Duration>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match d {
                Some(d) => serializer.serialize_some(&super::super::duration_nanos(d)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<Duration>, D::Error> {
            Ok(Option::<i64>::deserialize(deserializer)?.map(Duration::nanoseconds))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_duration_units() {
        assert_eq!(format_duration(&Duration::zero()), "0s");
        assert_eq!(format_duration(&Duration::weeks(2)), "2w");
        assert_eq!(format_duration(&Duration::days(3)), "3d");
        assert_eq!(format_duration(&Duration::hours(5)), "5h");
        assert_eq!(format_duration(&Duration::minutes(90)), "90m");
        assert_eq!(format_duration(&Duration::seconds(10)), "10s");
        assert_eq!(format_duration(&Duration::milliseconds(1500)), "1500ms");
        assert_eq!(format_duration(&Duration::microseconds(7)), "7u");
        assert_eq!(format_duration(&Duration::minutes(-5)), "-5m");
    }

    #[test]
    fn test_format_time() {
        let t = Utc.with_ymd_and_hms(2020, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(format_time(&t), "2020-01-02 03:04:05");

        let t = t + Duration::microseconds(1500);
        assert_eq!(format_time(&t), "2020-01-02 03:04:05.0015");
    }

    #[test]
    fn test_quote_string() {
        assert_eq!(quote_string("foo"), "'foo'");
        assert_eq!(quote_string("it's"), "'it\\'s'");
        assert_eq!(quote_string("a\nb"), "'a\\nb'");
        assert_eq!(quote_string("c:\\dir"), "'c:\\\\dir'");
    }
}
