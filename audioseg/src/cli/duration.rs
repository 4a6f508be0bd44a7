use std::fmt;
use std::time::Duration;

/// Parse a positive duration such as `5m`, `1m30s`, `2.5s` or `250ms`.
///
/// A duration is one or more `<number><unit>` components, optionally
/// separated by whitespace. Units are `ms`, `s`, `m` and `h`; numbers may
/// carry a decimal fraction. Precision beyond a nanosecond is truncated.
pub fn parse_duration(value: &str) -> Result<Duration, DurationParseError> {
    let duration = parse_duration_or_zero(value)?;
    if duration.is_zero() {
        return Err(DurationParseError::Zero);
    }
    Ok(duration)
}

/// Like [`parse_duration`], but accepts `0s` and friends.
pub fn parse_duration_or_zero(value: &str) -> Result<Duration, DurationParseError> {
    let input = value.trim();
    if input.is_empty() {
        return Err(DurationParseError::Empty);
    }

    let mut rest = input;
    let mut total_nanos: u128 = 0;

    loop {
        rest = rest.trim_start();
        if rest.is_empty() {
            break;
        }
        let position = input.len() - rest.len();

        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let (number, tail) = rest.split_at(number_len);
        if number.is_empty() {
            return Err(DurationParseError::ExpectedNumber {
                position,
                found: tail.chars().next(),
            });
        }

        let unit_len = tail
            .find(|c: char| !c.is_ascii_alphabetic())
            .unwrap_or(tail.len());
        let (symbol, tail) = tail.split_at(unit_len);
        let unit = Unit::from_symbol(symbol).ok_or_else(|| {
            if symbol.is_empty() {
                DurationParseError::MissingUnit {
                    position: position + number_len,
                }
            } else {
                DurationParseError::UnknownUnit(symbol.to_owned())
            }
        })?;

        let component = scale(number, unit, position)?;
        total_nanos = total_nanos
            .checked_add(component)
            .ok_or(DurationParseError::TooLarge)?;
        rest = tail;
    }

    let secs = u64::try_from(total_nanos / 1_000_000_000).map_err(|_| DurationParseError::TooLarge)?;
    Ok(Duration::new(secs, (total_nanos % 1_000_000_000) as u32))
}

/// Nanoseconds represented by `number` of `unit`.
fn scale(number: &str, unit: Unit, position: usize) -> Result<u128, DurationParseError> {
    let invalid = || DurationParseError::InvalidNumber {
        position,
        number: number.to_owned(),
    };

    let (whole, fraction) = match number.split_once('.') {
        Some((whole, fraction)) if !fraction.is_empty() && !fraction.contains('.') => {
            (whole, fraction)
        }
        Some(_) => return Err(invalid()),
        None => (number, ""),
    };
    if fraction.len() > MAX_FRACTION_DIGITS {
        return Err(invalid());
    }

    let whole: u128 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| invalid())?
    };
    let mut nanos = whole
        .checked_mul(unit.nanos())
        .ok_or(DurationParseError::TooLarge)?;

    if !fraction.is_empty() {
        let digits: u128 = fraction.parse().map_err(|_| invalid())?;
        let denominator = 10u128.pow(fraction.len() as u32);
        nanos += digits * unit.nanos() / denominator;
    }

    Ok(nanos)
}

const MAX_FRACTION_DIGITS: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Unit {
    Millisecond,
    Second,
    Minute,
    Hour,
}

impl Unit {
    fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "ms" => Some(Self::Millisecond),
            "s" => Some(Self::Second),
            "m" => Some(Self::Minute),
            "h" => Some(Self::Hour),
            _ => None,
        }
    }

    fn nanos(self) -> u128 {
        match self {
            Self::Millisecond => 1_000_000,
            Self::Second => 1_000_000_000,
            Self::Minute => 60 * 1_000_000_000,
            Self::Hour => 3_600 * 1_000_000_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DurationParseError {
    Empty,
    ExpectedNumber { position: usize, found: Option<char> },
    InvalidNumber { position: usize, number: String },
    MissingUnit { position: usize },
    UnknownUnit(String),
    Zero,
    TooLarge,
}

impl std::error::Error for DurationParseError {}

impl fmt::Display for DurationParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "duration cannot be empty"),
            Self::ExpectedNumber {
                position,
                found: Some(ch),
            } => write!(f, "expected a number at position {} but found '{ch}'", position + 1),
            Self::ExpectedNumber {
                position,
                found: None,
            } => write!(f, "expected a number at position {}", position + 1),
            Self::InvalidNumber { position, number } => {
                write!(f, "invalid number '{number}' at position {}", position + 1)
            }
            Self::MissingUnit { position } => write!(
                f,
                "expected a unit (ms, s, m, h) at position {}",
                position + 1
            ),
            Self::UnknownUnit(unit) => {
                write!(f, "unknown unit '{unit}', expected one of ms, s, m, h")
            }
            Self::Zero => write!(f, "duration must be greater than zero"),
            Self::TooLarge => write!(f, "duration is too large"),
        }
    }
}
