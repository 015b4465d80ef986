//! Lookback period parsing
//!
//! Accepts `"<n>d"` for whole days, or a duration made of number+unit
//! segments (`ns`, `us`/`µs`, `ms`, `s`, `m`, `h`) such as `"24h"` or
//! `"1h30m"`. Input is trimmed and case-insensitive.

use std::time::Duration;
use thiserror::Error;

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// Unit suffixes, longest first so `ms` wins over `m`
const UNITS: &[(&str, f64)] = &[
    ("ns", 1e-9),
    ("us", 1e-6),
    ("µs", 1e-6),
    ("μs", 1e-6),
    ("ms", 1e-3),
    ("s", 1.0),
    ("m", 60.0),
    ("h", 3600.0),
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PeriodError {
    #[error("period is empty")]
    Empty,
    #[error("invalid days format in {0:?}")]
    InvalidDays(String),
    #[error("invalid duration format in {0:?}")]
    InvalidDuration(String),
}

pub fn parse_period(period: &str) -> Result<Duration, PeriodError> {
    let period = period.trim().to_lowercase();
    if period.is_empty() {
        return Err(PeriodError::Empty);
    }

    if let Some(days) = period.strip_suffix('d') {
        let days = days
            .strip_prefix('+')
            .unwrap_or(days)
            .parse::<u64>()
            .map_err(|_| PeriodError::InvalidDays(period.clone()))?;
        let secs = days
            .checked_mul(SECONDS_PER_DAY)
            .ok_or_else(|| PeriodError::InvalidDays(period.clone()))?;
        return Ok(Duration::from_secs(secs));
    }

    parse_duration(&period).ok_or(PeriodError::InvalidDuration(period))
}

fn parse_duration(input: &str) -> Option<Duration> {
    let mut rest = input.strip_prefix('+').unwrap_or(input);
    if rest == "0" {
        return Some(Duration::ZERO);
    }
    if rest.is_empty() {
        return None;
    }

    let mut total_secs = 0.0_f64;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let (number, tail) = rest.split_at(number_len);
        if number.is_empty() || number == "." {
            return None;
        }
        let value: f64 = number.parse().ok()?;

        let (unit, scale) = UNITS.iter().find(|(unit, _)| tail.starts_with(unit))?;
        total_secs += value * scale;
        rest = &tail[unit.len()..];
    }

    Duration::try_from_secs_f64(total_secs).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_day_periods() {
        assert_eq!(parse_period("30d"), Ok(Duration::from_secs(30 * SECONDS_PER_DAY)));
        assert_eq!(parse_period(" 7D "), Ok(Duration::from_secs(7 * SECONDS_PER_DAY)));
        assert_eq!(parse_period("0d"), Ok(Duration::ZERO));
    }

    #[test]
    fn test_duration_strings() {
        assert_eq!(parse_period("24h"), Ok(Duration::from_secs(86_400)));
        assert_eq!(parse_period("1h30m"), Ok(Duration::from_secs(5_400)));
        assert_eq!(parse_period("90s"), Ok(Duration::from_secs(90)));
        assert_eq!(parse_period("1.5h"), Ok(Duration::from_secs(5_400)));
        assert_eq!(parse_period("500ms"), Ok(Duration::from_millis(500)));
        assert_eq!(parse_period("0"), Ok(Duration::ZERO));
    }

    #[test]
    fn test_invalid_periods() {
        assert_eq!(parse_period(""), Err(PeriodError::Empty));
        assert!(matches!(parse_period("abcd"), Err(PeriodError::InvalidDays(_))));
        assert!(matches!(parse_period("-3d"), Err(PeriodError::InvalidDays(_))));
        assert!(matches!(parse_period("10"), Err(PeriodError::InvalidDuration(_))));
        assert!(matches!(parse_period("5w"), Err(PeriodError::InvalidDuration(_))));
        assert!(matches!(parse_period("-1h"), Err(PeriodError::InvalidDuration(_))));
        assert!(matches!(parse_period("h"), Err(PeriodError::InvalidDuration(_))));
    }
}
