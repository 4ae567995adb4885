use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IntervalError {
    #[error("empty duration")]
    Empty,
    #[error("invalid duration {0:?}")]
    Invalid(String),
    #[error("missing unit in duration {0:?}")]
    MissingUnit(String),
    #[error("unknown unit {unit:?} in duration {input:?}")]
    UnknownUnit { unit: String, input: String },
    #[error("duration {0:?} must be positive")]
    NotPositive(String),
}

/// Nanoseconds per unit
fn unit_nanos(unit: &str) -> Option<u128> {
    match unit {
        "ns" => Some(1),
        "us" | "µs" | "μs" => Some(1_000),
        "ms" => Some(1_000_000),
        "s" => Some(1_000_000_000),
        "m" => Some(60 * 1_000_000_000),
        "h" => Some(3_600 * 1_000_000_000),
        _ => None,
    }
}

/// Parse a polling interval such as `"30s"`, `"1m"`, `"1h30m"` or `"1.5s"`.
///
/// The string is a sequence of `<decimal><unit>` terms. The total must be
/// greater than zero.
pub fn parse_interval(input: &str) -> Result<Duration, IntervalError> {
    let s = input.trim();
    if s.is_empty() {
        return Err(IntervalError::Empty);
    }

    let invalid = || IntervalError::Invalid(input.to_string());

    let (negative, mut rest) = match s.as_bytes()[0] {
        b'-' => (true, &s[1..]),
        b'+' => (false, &s[1..]),
        _ => (false, s),
    };
    if rest == "0" {
        return Err(IntervalError::NotPositive(input.to_string()));
    }
    if rest.is_empty() {
        return Err(invalid());
    }

    let mut total: u128 = 0;
    while !rest.is_empty() {
        let number_end = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let number = &rest[..number_end];
        let (whole, frac) = number.split_once('.').unwrap_or((number, ""));
        if (whole.is_empty() && frac.is_empty()) || frac.contains('.') {
            return Err(invalid());
        }
        rest = &rest[number_end..];

        let unit_end = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let unit = &rest[..unit_end];
        if unit.is_empty() {
            return Err(IntervalError::MissingUnit(input.to_string()));
        }
        let scale = unit_nanos(unit).ok_or_else(|| IntervalError::UnknownUnit {
            unit: unit.to_string(),
            input: input.to_string(),
        })?;
        rest = &rest[unit_end..];

        let whole: u128 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| invalid())?
        };
        let mut term = whole.checked_mul(scale).ok_or_else(invalid)?;
        if !frac.is_empty() {
            // Digits beyond nanosecond precision of an hour cannot matter
            let digits = &frac[..frac.len().min(18)];
            let value: u128 = digits.parse().map_err(|_| invalid())?;
            term += value * scale / 10u128.pow(digits.len() as u32);
        }
        total = total.checked_add(term).ok_or_else(invalid)?;
    }

    if negative || total == 0 {
        return Err(IntervalError::NotPositive(input.to_string()));
    }
    let nanos = u64::try_from(total).map_err(|_| invalid())?;
    Ok(Duration::from_nanos(nanos))
}
