//! Humane duration strings.
//!
//! Config files spell durations as an integer with a unit suffix:
//! `"250ms"`, `"30s"`, `"5m"`, `"1h"`, `"30d"`. Compound forms like
//! `"1h30m"` are rejected; write `"90m"` instead.

use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{ConfigError, Result};

/// Accepted shape of a humane duration string.
static DURATION_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)(ms|s|m|h|d)$").unwrap_or_else(|_| unreachable!()));

/// Parses a humane duration string.
pub fn parse_duration(input: &str) -> Result<Duration> {
    let invalid = || ConfigError::InvalidDuration {
        input: input.to_string(),
    };

    let captures = DURATION_REGEX.captures(input.trim()).ok_or_else(invalid)?;
    let value: u64 = captures[1].parse().map_err(|_| invalid())?;

    let duration = match &captures[2] {
        "ms" => Some(Duration::from_millis(value)),
        "s" => Some(Duration::from_secs(value)),
        "m" => value.checked_mul(60).map(Duration::from_secs),
        "h" => value.checked_mul(3600).map(Duration::from_secs),
        "d" => value.checked_mul(86_400).map(Duration::from_secs),
        _ => None,
    };
    duration.ok_or_else(invalid)
}

/// Renders a duration using the largest unit that divides it evenly.
///
/// The output round-trips through [`parse_duration`] for any duration
/// with whole-millisecond precision.
#[must_use]
pub fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis == 0 {
        return "0s".to_string();
    }
    if millis % 1000 != 0 {
        return format!("{millis}ms");
    }

    let seconds = duration.as_secs();
    if seconds % 86_400 == 0 {
        format!("{}d", seconds / 86_400)
    } else if seconds % 3600 == 0 {
        format!("{}h", seconds / 3600)
    } else if seconds % 60 == 0 {
        format!("{}m", seconds / 60)
    } else {
        format!("{seconds}s")
    }
}

/// Serde adapter for `Duration` fields spelled in humane form.
///
/// Use with `#[serde(with = "duration::humane")]`.
pub mod humane {
    use std::time::Duration;

    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::{format_duration, parse_duration};

    /// Serializes the duration as a humane string.
    pub fn serialize<S: Serializer>(
        duration: &Duration,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_duration(*duration))
    }

    /// Deserializes a humane duration string.
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_duration(&raw).map_err(D::Error::custom)
    }
}

/// Serde adapter for optional `Duration` fields in humane form.
///
/// Pair with `#[serde(default, skip_serializing_if = "Option::is_none")]`
/// so an absent field stays absent on the way back out.
pub mod humane_opt {
    use std::time::Duration;

    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::{format_duration, parse_duration};

    /// Serializes the duration as a humane string when present.
    pub fn serialize<S: Serializer>(
        duration: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match duration {
            Some(d) => serializer.serialize_some(&format_duration(*d)),
            None => serializer.serialize_none(),
        }
    }

    /// Deserializes an optional humane duration string.
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        raw.map(|s| parse_duration(&s).map_err(D::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    mod parse_tests {
        use super::*;
        use test_case::test_case;

        #[test_case("250ms", Duration::from_millis(250); "milliseconds")]
        #[test_case("30s", Duration::from_secs(30); "seconds")]
        #[test_case("5m", Duration::from_secs(300); "minutes")]
        #[test_case("1h", Duration::from_secs(3600); "hours")]
        #[test_case("30d", Duration::from_secs(2_592_000); "days")]
        #[test_case("0s", Duration::ZERO; "zero")]
        #[test_case(" 90m ", Duration::from_secs(5400); "surrounding whitespace")]
        fn parses(input: &str, expected: Duration) {
            assert_eq!(parse_duration(input).unwrap(), expected);
        }

        #[test_case(""; "empty")]
        #[test_case("5"; "missing unit")]
        #[test_case("s"; "missing value")]
        #[test_case("5 m"; "inner whitespace")]
        #[test_case("-5m"; "negative")]
        #[test_case("1.5h"; "fractional")]
        #[test_case("1h30m"; "compound")]
        #[test_case("5w"; "unknown unit")]
        #[test_case("99999999999999999999s"; "overflows u64")]
        fn rejects(input: &str) {
            let err = parse_duration(input).unwrap_err();
            assert!(matches!(err, ConfigError::InvalidDuration { .. }));
        }

        #[test]
        fn rejects_day_overflow() {
            let input = format!("{}d", u64::MAX);
            assert!(parse_duration(&input).is_err());
        }
    }

    mod format_tests {
        use super::*;
        use test_case::test_case;

        #[test_case(Duration::ZERO, "0s"; "zero")]
        #[test_case(Duration::from_millis(250), "250ms"; "milliseconds")]
        #[test_case(Duration::from_secs(45), "45s"; "seconds")]
        #[test_case(Duration::from_secs(300), "5m"; "whole minutes")]
        #[test_case(Duration::from_secs(5400), "90m"; "ninety minutes")]
        #[test_case(Duration::from_secs(7200), "2h"; "whole hours")]
        #[test_case(Duration::from_secs(2_592_000), "30d"; "whole days")]
        #[test_case(Duration::from_millis(1500), "1500ms"; "fractional second stays in millis")]
        fn formats(duration: Duration, expected: &str) {
            assert_eq!(format_duration(duration), expected);
        }
    }

    proptest! {
        #[test]
        fn format_then_parse_round_trips(millis in 0_u64..u64::from(u32::MAX)) {
            let duration = Duration::from_millis(millis);
            let rendered = format_duration(duration);
            prop_assert_eq!(parse_duration(&rendered).unwrap(), duration);
        }
    }
}
