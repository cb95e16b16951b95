//! Human-readable byte and duration formatting, plus size parsing for config

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("size '{0}' does not start with a number")]
    MissingNumber(String),

    #[error("size is not a whole number: {0}")]
    Number(#[from] std::num::ParseIntError),

    #[error("unknown size unit '{0}'")]
    UnknownUnit(String),

    #[error("size '{0}' does not fit in 64 bits")]
    Overflow(String),
}

/// Render a byte count using base-1024 steps (bytes, K, MB, GB).
///
/// Each step truncates to one decimal place before the next division, and
/// GB is the largest unit, so a terabyte renders as `1024 GB`.
pub fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        return format!("{} bytes", bytes);
    }

    let mut value = step_down(bytes as f64);
    for unit in ["K", "MB"] {
        if value < 1024.0 {
            return format!("{} {}", value, unit);
        }
        value = step_down(value);
    }

    format!("{} GB", value)
}

fn step_down(value: f64) -> f64 {
    ((value / 1024.0) * 10.0).trunc() / 10.0
}

/// Render a second count as a single relative-time unit.
///
/// Picks the largest of second/minute/hour/day/month (30-day months) whose
/// count is at least one. With a `quantum`, sub-minute values are rounded up
/// to the next multiple of it so a countdown does not flicker every second.
pub fn format_seconds(secs: i64, quantum: Option<u64>) -> String {
    let sign = if secs < 0 { "-" } else { "" };
    let secs = secs.unsigned_abs();

    let (amount, unit) = if secs < 60 {
        (quantize(secs, quantum), "second")
    } else {
        let minutes = secs / 60;
        if minutes < 60 {
            (minutes, "minute")
        } else {
            let hours = minutes / 60;
            if hours < 24 {
                (hours, "hour")
            } else {
                let days = hours / 24;
                if days < 30 {
                    (days, "day")
                } else {
                    (days / 30, "month")
                }
            }
        }
    };

    let plural = if amount == 1 { "" } else { "s" };
    format!("{}{} {}{}", sign, amount, unit, plural)
}

fn quantize(value: u64, quantum: Option<u64>) -> u64 {
    match quantum {
        Some(q) if q > 0 && value % q != 0 => value - value % q + q,
        _ => value,
    }
}

/// Byte count read from config or the command line as `1048576`, `512K` or `5MB`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "RawSize")]
pub struct ByteSize(pub u64);

impl ByteSize {
    pub fn as_u64(&self) -> u64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl From<u64> for ByteSize {
    fn from(bytes: u64) -> Self {
        ByteSize(bytes)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawSize {
    Count(u64),
    Text(String),
}

impl TryFrom<RawSize> for ByteSize {
    type Error = ParseError;

    fn try_from(raw: RawSize) -> Result<Self, Self::Error> {
        match raw {
            RawSize::Count(bytes) => Ok(ByteSize(bytes)),
            RawSize::Text(text) => text.parse(),
        }
    }
}

fn unit_multiplier(unit: &str) -> Option<u64> {
    let power = match unit {
        "" | "B" => 0,
        "K" | "KB" | "KIB" => 1,
        "M" | "MB" | "MIB" => 2,
        "G" | "GB" | "GIB" => 3,
        "T" | "TB" | "TIB" => 4,
        _ => return None,
    };
    Some(1024u64.pow(power))
}

impl FromStr for ByteSize {
    type Err = ParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let text = input.trim();
        let split = text
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(text.len());
        let (digits, unit) = text.split_at(split);
        if digits.is_empty() {
            return Err(ParseError::MissingNumber(input.to_string()));
        }

        let count: u64 = digits.parse()?;
        let unit = unit.trim().to_ascii_uppercase();
        let multiplier =
            unit_multiplier(&unit).ok_or_else(|| ParseError::UnknownUnit(unit.clone()))?;

        count
            .checked_mul(multiplier)
            .map(ByteSize)
            .ok_or_else(|| ParseError::Overflow(input.to_string()))
    }
}

impl fmt::Display for ByteSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_bytes(self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes_unit_boundaries() {
        assert_eq!(format_bytes(0), "0 bytes");
        assert_eq!(format_bytes(1023), "1023 bytes");
        assert_eq!(format_bytes(1024), "1 K");
        assert_eq!(format_bytes(1024 * 1024), "1 MB");
        assert_eq!(format_bytes(1024 * 1024 * 1024), "1 GB");
    }

    #[test]
    fn test_format_bytes_truncates() {
        // 1535 / 1024 = 1.499..., truncated rather than rounded
        assert_eq!(format_bytes(1535), "1.4 K");
        assert_eq!(format_bytes(1536), "1.5 K");
        assert_eq!(format_bytes(1024 * 1024 * 1024 * 1024), "1024 GB");
    }

    #[test]
    fn test_format_seconds_units() {
        assert_eq!(format_seconds(0, None), "0 seconds");
        assert_eq!(format_seconds(1, None), "1 second");
        assert_eq!(format_seconds(2, None), "2 seconds");
        assert_eq!(format_seconds(61, None), "1 minute");
        assert_eq!(format_seconds(150, None), "2 minutes");
        assert_eq!(format_seconds(3661, None), "1 hour");
        assert_eq!(format_seconds(90000, None), "1 day");
        assert_eq!(format_seconds(30 * 86400, None), "1 month");
        assert_eq!(format_seconds(90 * 86400, None), "3 months");
    }

    #[test]
    fn test_format_seconds_negative() {
        assert_eq!(format_seconds(-1, None), "-1 second");
        assert_eq!(format_seconds(-120, None), "-2 minutes");
    }

    #[test]
    fn test_format_seconds_quantized() {
        assert_eq!(format_seconds(3, Some(10)), "10 seconds");
        assert_eq!(format_seconds(20, Some(10)), "20 seconds");
        assert_eq!(format_seconds(55, Some(10)), "60 seconds");
        assert_eq!(format_seconds(0, Some(10)), "0 seconds");
        assert_eq!(format_seconds(3, Some(0)), "3 seconds");
        // minute and above render their own integer count
        assert_eq!(format_seconds(125, Some(10)), "2 minutes");
    }

    #[test]
    fn test_parse_sizes() {
        let cases = [
            ("1024", 1024),
            ("0", 0),
            ("12 B", 12),
            ("1K", 1024),
            ("512kb", 512 * 1024),
            ("5MiB", 5 * 1024 * 1024),
            (" 2 GB ", 2 * 1024 * 1024 * 1024),
            ("1T", 1024u64.pow(4)),
        ];
        for (input, expected) in cases {
            assert_eq!(input.parse::<ByteSize>().unwrap(), ByteSize(expected), "{}", input);
        }
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!("5XB".parse::<ByteSize>(), Err(ParseError::UnknownUnit(u)) if u == "XB"));
        assert!(matches!("MB".parse::<ByteSize>(), Err(ParseError::MissingNumber(_))));
        assert!(matches!("".parse::<ByteSize>(), Err(ParseError::MissingNumber(_))));
        assert!(matches!(
            "99999999999TB".parse::<ByteSize>(),
            Err(ParseError::Overflow(_))
        ));
    }

    #[test]
    fn test_deserialize_text_or_count() {
        #[derive(Deserialize)]
        struct Limits {
            soft: ByteSize,
            hard: ByteSize,
        }
        let limits: Limits = serde_json::from_str(r#"{"soft": "10MB", "hard": 4096}"#).unwrap();
        assert_eq!(limits.soft, ByteSize(10 * 1024 * 1024));
        assert_eq!(limits.hard, ByteSize(4096));

        assert!(serde_json::from_str::<Limits>(r#"{"soft": -1, "hard": 1}"#).is_err());
    }

    #[test]
    fn test_display_uses_format_bytes() {
        assert_eq!(ByteSize(1024).to_string(), "1 K");
        assert_eq!(ByteSize(5 * 1024 * 1024).to_string(), "5 MB");
        assert_eq!(ByteSize(100).to_string(), "100 bytes");
    }
}
