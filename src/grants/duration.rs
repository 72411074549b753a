//! Grant duration parsing.
//!
//! Durations use the compact admin form: `5m`, `2h`, `1d`, or `inf` for a
//! grant that never expires. A bare number is minutes.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

const SECS_PER_MINUTE: u64 = 60;
const SECS_PER_HOUR: u64 = 3_600;
const SECS_PER_DAY: u64 = 86_400;

/// How long a grant lasts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantDuration {
    Finite(Duration),
    Infinite,
}

impl GrantDuration {
    pub fn is_infinite(&self) -> bool {
        matches!(self, GrantDuration::Infinite)
    }

    pub fn as_duration(&self) -> Option<Duration> {
        match self {
            GrantDuration::Finite(d) => Some(*d),
            GrantDuration::Infinite => None,
        }
    }
}

impl fmt::Display for GrantDuration {
    /// Renders the largest whole unit, e.g. `2h`, `1d`, `90m`, or `permanent`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = match self {
            GrantDuration::Infinite => return f.write_str("permanent"),
            GrantDuration::Finite(d) => d.as_secs(),
        };
        if secs > 0 && secs % SECS_PER_DAY == 0 {
            write!(f, "{}d", secs / SECS_PER_DAY)
        } else if secs > 0 && secs % SECS_PER_HOUR == 0 {
            write!(f, "{}h", secs / SECS_PER_HOUR)
        } else {
            write!(f, "{}m", secs / SECS_PER_MINUTE)
        }
    }
}

/// Duration parse failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DurationError {
    #[error("duration is empty")]
    Empty,
    #[error("invalid duration '{0}' (use 5m, 2h, 1d or inf)")]
    Invalid(String),
    #[error("duration '{0}' is too large")]
    Overflow(String),
}

/// Parse a duration like `5m`, `2h`, `1d`, `30` (minutes) or `inf`.
pub fn parse(text: &str) -> Result<GrantDuration, DurationError> {
    let s = text.trim();
    if s.is_empty() {
        return Err(DurationError::Empty);
    }

    let lower = s.to_ascii_lowercase();
    if lower == "inf" || lower == "infinite" {
        return Ok(GrantDuration::Infinite);
    }

    let (digits, unit) = if let Some(stripped) = lower.strip_suffix('m') {
        (stripped, SECS_PER_MINUTE)
    } else if let Some(stripped) = lower.strip_suffix('h') {
        (stripped, SECS_PER_HOUR)
    } else if let Some(stripped) = lower.strip_suffix('d') {
        (stripped, SECS_PER_DAY)
    } else {
        // No unit means minutes
        (lower.as_str(), SECS_PER_MINUTE)
    };

    // u64::from_str accepts a leading '+', so check the digits first
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(DurationError::Invalid(s.to_string()));
    }

    let count: u64 = digits
        .parse()
        .map_err(|_| DurationError::Overflow(s.to_string()))?;
    let secs = count
        .checked_mul(unit)
        .ok_or_else(|| DurationError::Overflow(s.to_string()))?;

    Ok(GrantDuration::Finite(Duration::from_secs(secs)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(text: &str) -> u64 {
        parse(text)
            .ok()
            .and_then(|d| d.as_duration())
            .map(|d| d.as_secs())
            .unwrap_or(u64::MAX)
    }

    #[test]
    fn parses_units() {
        assert_eq!(secs("5m"), 300);
        assert_eq!(secs("2h"), 7_200);
        assert_eq!(secs("1d"), 86_400);
        assert_eq!(secs("2H"), 7_200);
        assert_eq!(secs(" 10m "), 600);
    }

    #[test]
    fn bare_number_is_minutes() {
        assert_eq!(secs("15"), 900);
        assert_eq!(secs("0"), 0);
    }

    #[test]
    fn infinite_is_case_insensitive() {
        assert_eq!(parse("inf"), Ok(GrantDuration::Infinite));
        assert_eq!(parse("INF"), Ok(GrantDuration::Infinite));
        assert_eq!(parse("Infinite"), Ok(GrantDuration::Infinite));
    }

    #[test]
    fn rejects_malformed_input() {
        assert_eq!(parse(""), Err(DurationError::Empty));
        assert_eq!(parse("   "), Err(DurationError::Empty));
        assert!(matches!(parse("abc"), Err(DurationError::Invalid(_))));
        assert!(matches!(parse("-5m"), Err(DurationError::Invalid(_))));
        assert!(matches!(parse("+5m"), Err(DurationError::Invalid(_))));
        assert!(matches!(parse("m"), Err(DurationError::Invalid(_))));
        assert!(matches!(parse("5w"), Err(DurationError::Invalid(_))));
        assert!(matches!(parse("1.5h"), Err(DurationError::Invalid(_))));
        assert!(matches!(parse("infinity"), Err(DurationError::Invalid(_))));
    }

    #[test]
    fn rejects_overflow() {
        assert!(matches!(
            parse("99999999999999999999999m"),
            Err(DurationError::Overflow(_))
        ));
        // Fits in u64 but not once multiplied into seconds
        let near_max = format!("{}d", u64::MAX / 2);
        assert!(matches!(parse(&near_max), Err(DurationError::Overflow(_))));
    }

    #[test]
    fn display_uses_largest_unit() {
        assert_eq!(parse("90m").map(|d| d.to_string()), Ok("90m".to_string()));
        assert_eq!(parse("120m").map(|d| d.to_string()), Ok("2h".to_string()));
        assert_eq!(parse("48h").map(|d| d.to_string()), Ok("2d".to_string()));
        assert_eq!(parse("0").map(|d| d.to_string()), Ok("0m".to_string()));
        assert_eq!(GrantDuration::Infinite.to_string(), "permanent");
    }
}
