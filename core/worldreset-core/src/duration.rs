//! Compact duration grammar shared by the config file and the command line.
//!
//! Accepted forms are a sequence of `<number><unit>` parts in descending
//! unit order, e.g. `30d`, `1h30m`, `24hs`, `8.5ys`, `3mo5ws2days4.045secs`.
//! A trailing bare number counts as seconds. Each part is rounded to whole
//! seconds before being added up.

use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Duration;
use thiserror::Error;

pub const SECOND: u64 = 1;
pub const MINUTE: u64 = 60;
pub const HOUR: u64 = 60 * MINUTE;
pub const DAY: u64 = 24 * HOUR;
pub const WEEK: u64 = 7 * DAY;
/// Average Gregorian year (365.2425 days).
pub const YEAR: u64 = 31_556_952;
pub const MONTH: u64 = YEAR / 12;

/// Units in the order they must appear, largest first.
const UNITS: [(u64, &str, &str); 7] = [
    (YEAR, "y", "year"),
    (MONTH, "mo", "month"),
    (WEEK, "w", "week"),
    (DAY, "d", "day"),
    (HOUR, "h", "hour"),
    (MINUTE, "m", "minute"),
    (SECOND, "s", "second"),
];

static DURATION_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"^",
        r"(?:(\d+(?:\.\d+)?)y(?:ear)?s?)?",
        r"(?:(\d+(?:\.\d+)?)mo(?:nth)?s?)?",
        r"(?:(\d+(?:\.\d+)?)w(?:eek)?s?)?",
        r"(?:(\d+(?:\.\d+)?)d(?:ay)?s?)?",
        r"(?:(\d+(?:\.\d+)?)h(?:r|our)?s?)?",
        r"(?:(\d+(?:\.\d+)?)m(?:in|inute)?s?)?",
        r"(?:(\d+(?:\.\d+)?)(?:s(?:ec|econd)?s?)?)?",
        r"$",
    ))
    .expect("duration pattern is valid")
});

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DurationError {
    #[error("empty duration")]
    Empty,

    #[error("\"{0}\" is not a duration (try 30d, 1h30m or 45s)")]
    Invalid(String),

    #[error("duration must not be less than {min}, found {found}")]
    TooSmall { found: String, min: String },

    #[error("duration must not be more than {max}, found {found}")]
    TooBig { found: String, max: String },
}

/// Parses a duration with no bounds.
pub fn parse_duration(input: &str) -> Result<Duration, DurationError> {
    DurationBounds::default().parse(input)
}

/// Inclusive minimum and exclusive maximum for parsed durations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DurationBounds {
    pub min: Option<Duration>,
    pub max: Option<Duration>,
}

impl DurationBounds {
    pub fn at_least(min: Duration) -> Self {
        DurationBounds {
            min: Some(min),
            max: None,
        }
    }

    /// `min` inclusive, `max` exclusive.
    pub fn between(min: Duration, max: Duration) -> Self {
        DurationBounds {
            min: Some(min),
            max: Some(max),
        }
    }

    pub fn parse(&self, input: &str) -> Result<Duration, DurationError> {
        let input = input.trim().to_lowercase();
        if input.is_empty() {
            return Err(DurationError::Empty);
        }

        let caps = DURATION_PATTERN
            .captures(&input)
            .ok_or_else(|| DurationError::Invalid(input.clone()))?;

        let mut total: u64 = 0;
        for (index, (unit_secs, _, _)) in UNITS.iter().enumerate() {
            if let Some(amount) = caps.get(index + 1) {
                let amount: f64 = amount
                    .as_str()
                    .parse()
                    .map_err(|_| DurationError::Invalid(input.clone()))?;
                total = total.saturating_add((amount * *unit_secs as f64).round() as u64);
            }
        }
        let duration = Duration::from_secs(total);

        if let Some(min) = self.min {
            if duration < min {
                return Err(DurationError::TooSmall {
                    found: short_duration(duration),
                    min: short_duration(min),
                });
            }
        }

        if let Some(max) = self.max {
            if duration >= max {
                return Err(DurationError::TooBig {
                    found: short_duration(duration),
                    max: short_duration(max),
                });
            }
        }

        Ok(duration)
    }
}

/// Splits whole seconds into per-unit amounts, largest unit first.
fn split_units(duration: Duration) -> [u64; 7] {
    let mut remaining = duration.as_secs();
    let mut parts = [0u64; 7];
    for (part, (unit_secs, _, _)) in parts.iter_mut().zip(UNITS.iter()) {
        *part = remaining / unit_secs;
        remaining %= unit_secs;
    }
    parts
}

/// Formats as `1y2mo3w4d5h6m7s`, omitting zero parts.
pub fn short_duration(duration: Duration) -> String {
    let formatted: String = split_units(duration)
        .iter()
        .zip(UNITS.iter())
        .filter(|(amount, _)| **amount != 0)
        .map(|(amount, (_, suffix, _))| format!("{}{}", amount, suffix))
        .collect();

    if formatted.is_empty() {
        "0s".to_string()
    } else {
        formatted
    }
}

/// Formats as `1 year, 2 months, 1 second`, omitting zero parts.
pub fn long_duration(duration: Duration) -> String {
    let parts: Vec<String> = split_units(duration)
        .iter()
        .zip(UNITS.iter())
        .filter(|(amount, _)| **amount != 0)
        .map(|(amount, (_, _, name))| {
            format!("{} {}{}", amount, name, if *amount > 1 { "s" } else { "" })
        })
        .collect();

    if parts.is_empty() {
        "0 seconds".to_string()
    } else {
        parts.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    #[test]
    fn test_parse_single_units() {
        assert_eq!(parse_duration("12d").unwrap(), secs(12 * DAY));
        assert_eq!(parse_duration("25mins").unwrap(), secs(25 * MINUTE));
        assert_eq!(parse_duration("24hs").unwrap(), secs(24 * HOUR));
        assert_eq!(parse_duration("30min").unwrap(), secs(30 * MINUTE));
        assert_eq!(parse_duration("30s").unwrap(), secs(30));
        assert_eq!(parse_duration("1mo").unwrap(), secs(MONTH));
        assert_eq!(parse_duration("2weeks").unwrap(), secs(2 * WEEK));
    }

    #[test]
    fn test_parse_bare_number_is_seconds() {
        assert_eq!(parse_duration("90").unwrap(), secs(90));
    }

    #[test]
    fn test_parse_compound_and_fractional() {
        assert_eq!(parse_duration("1h30m").unwrap(), secs(HOUR + 30 * MINUTE));
        assert_eq!(
            parse_duration("3mo5ws2days4.045secs").unwrap(),
            secs(3 * MONTH + 5 * WEEK + 2 * DAY + 4)
        );
        assert_eq!(parse_duration("1.5h").unwrap(), secs(90 * MINUTE));
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!(parse_duration("2D").unwrap(), secs(2 * DAY));
    }

    #[test]
    fn test_parse_rejects_out_of_order_and_garbage() {
        assert!(matches!(parse_duration("5m1h"), Err(DurationError::Invalid(_))));
        assert!(matches!(parse_duration("soon"), Err(DurationError::Invalid(_))));
        assert_eq!(parse_duration("  "), Err(DurationError::Empty));
    }

    #[test]
    fn test_bounds() {
        let bounds = DurationBounds::at_least(secs(10));
        assert!(matches!(bounds.parse("5s"), Err(DurationError::TooSmall { .. })));
        assert_eq!(bounds.parse("10s").unwrap(), secs(10));

        let capped = DurationBounds {
            min: None,
            max: Some(secs(DAY)),
        };
        assert!(matches!(capped.parse("1d"), Err(DurationError::TooBig { .. })));
        assert_eq!(capped.parse("23h").unwrap(), secs(23 * HOUR));
    }

    #[test]
    fn test_bounds_reject_saturated_sum() {
        let bounds = DurationBounds::between(secs(10), secs(1000 * YEAR));
        assert!(matches!(bounds.parse("1000000000000y"), Err(DurationError::TooBig { .. })));
        assert!(matches!(bounds.parse("1000y"), Err(DurationError::TooBig { .. })));
        assert_eq!(bounds.parse("999y").unwrap(), secs(999 * YEAR));
    }

    #[test]
    fn test_short_duration() {
        assert_eq!(short_duration(secs(0)), "0s");
        assert_eq!(short_duration(secs(HOUR + 30 * MINUTE)), "1h30m");
        assert_eq!(short_duration(secs(30 * DAY)), "4w2d");
        assert_eq!(short_duration(secs(YEAR + 7)), "1y7s");
    }

    #[test]
    fn test_long_duration() {
        assert_eq!(long_duration(secs(HOUR + 1)), "1 hour, 1 second");
        assert_eq!(long_duration(secs(2 * DAY + 3 * MINUTE)), "2 days, 3 minutes");
        assert_eq!(long_duration(secs(0)), "0 seconds");
    }
}
