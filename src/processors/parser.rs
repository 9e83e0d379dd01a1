use memchr::memchr;

use crate::error::{ProcessingError, Result};
use crate::utils::constants::{
    FIELD_DELIMITER, LINE_TERMINATOR, MAX_ABS_TENTHS, MAX_STATION_NAME_LEN,
};

const MISSING_DELIMITER: &str = "missing ';' delimiter";
const EXTRA_DELIMITER: &str = "more than one ';' delimiter";
const EMPTY_NAME: &str = "empty station name";
const NAME_TOO_LONG: &str = "station name longer than 100 bytes";
const MISSING_POINT: &str = "value has no decimal point";
const BAD_FRACTION: &str = "value must have exactly one fractional digit";
const BAD_DIGIT: &str = "value contains a non-digit";
const OUT_OF_RANGE: &str = "value outside -999.9..=999.9";
const INVALID_UTF8: &str = "station name is not valid UTF-8";

/// Parse a `-?[0-9]+\.[0-9]` value straight into tenths. Magnitudes above
/// 999.9 are rejected, which keeps every sum far from `i64` overflow.
#[inline]
pub fn parse_value(bytes: &[u8]) -> std::result::Result<i32, &'static str> {
    let (negative, digits) = match bytes.split_first() {
        Some((b'-', rest)) => (true, rest),
        _ => (false, bytes),
    };

    let len = digits.len();
    if len < 3 || digits[len - 2] != b'.' {
        return Err(classify_value_error(digits));
    }

    let mut tenths: i32 = 0;
    for &byte in digits[..len - 2].iter().chain(std::iter::once(&digits[len - 1])) {
        if !byte.is_ascii_digit() {
            return Err(classify_value_error(digits));
        }
        tenths = tenths
            .checked_mul(10)
            .and_then(|t| t.checked_add((byte - b'0') as i32))
            .filter(|&t| t <= MAX_ABS_TENTHS)
            .ok_or(OUT_OF_RANGE)?;
    }

    Ok(if negative { -tenths } else { tenths })
}

// Slow path, only reached for malformed values.
fn classify_value_error(digits: &[u8]) -> &'static str {
    if digits.contains(&FIELD_DELIMITER) {
        return EXTRA_DELIMITER;
    }
    match digits.iter().position(|&b| b == b'.') {
        None if digits.iter().all(u8::is_ascii_digit) && !digits.is_empty() => MISSING_POINT,
        None => BAD_DIGIT,
        Some(0) => BAD_DIGIT,
        Some(point) if digits.len() - point != 2 => BAD_FRACTION,
        Some(_) => BAD_DIGIT,
    }
}

/// Split one line (without its terminator) into station name and tenths.
#[inline]
pub fn parse_record(line: &[u8]) -> std::result::Result<(&[u8], i32), &'static str> {
    let split = memchr(FIELD_DELIMITER, line).ok_or(MISSING_DELIMITER)?;
    let name = &line[..split];

    if name.is_empty() {
        return Err(EMPTY_NAME);
    }
    if name.len() > MAX_STATION_NAME_LEN {
        return Err(NAME_TOO_LONG);
    }
    if std::str::from_utf8(name).is_err() {
        return Err(INVALID_UTF8);
    }

    let value = parse_value(&line[split + 1..])?;
    Ok((name, value))
}

/// Feed every line of `data` to `on_record`. `base_offset` is the file offset
/// of `data[0]` and is only used for error reporting.
///
/// A final line without a terminator is accepted. Returns the number of lines.
pub fn parse_lines<F>(data: &[u8], base_offset: u64, mut on_record: F) -> Result<u64>
where
    F: FnMut(&[u8], i32) -> Result<()>,
{
    let mut start = 0;
    let mut lines = 0u64;

    while start < data.len() {
        let end = memchr(LINE_TERMINATOR, &data[start..])
            .map(|pos| start + pos)
            .unwrap_or(data.len());
        let line = &data[start..end];

        match parse_record(line) {
            Ok((name, value)) => on_record(name, value)?,
            Err(reason) => {
                return Err(ProcessingError::parse(
                    base_offset + start as u64,
                    line,
                    reason,
                ))
            }
        }

        lines += 1;
        start = end + 1;
    }

    Ok(lines)
}
