use std::fmt::Write;

/// Render a tenths value with exactly one decimal digit (-999 -> "-99.9").
pub fn format_tenths(tenths: i64) -> String {
    let mut out = String::with_capacity(8);
    write_tenths(&mut out, tenths);
    out
}

/// Append a tenths value to `out` without going through floating point.
pub fn write_tenths(out: &mut String, tenths: i64) {
    if tenths < 0 {
        out.push('-');
    }
    let magnitude = tenths.unsigned_abs();
    // Writing into a String cannot fail
    let _ = write!(out, "{}.{}", magnitude / 10, magnitude % 10);
}

/// Mean of `sum / count` in tenths, rounded half up.
///
/// Returns 0 for an empty accumulator.
pub fn mean_tenths(sum: i64, count: u64) -> i64 {
    if count == 0 {
        return 0;
    }
    let sum = sum as i128;
    let count = count as i128;
    (2 * sum + count).div_euclid(2 * count) as i64
}

/// Convert a tenths value to a float for display or JSON output.
pub fn tenths_to_f64(tenths: i64) -> f64 {
    tenths as f64 / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_tenths() {
        assert_eq!(format_tenths(0), "0.0");
        assert_eq!(format_tenths(5), "0.5");
        assert_eq!(format_tenths(-5), "-0.5");
        assert_eq!(format_tenths(-999), "-99.9");
        assert_eq!(format_tenths(200), "20.0");
        assert_eq!(format_tenths(i32::MIN as i64), "-214748364.8");
    }

    #[test]
    fn test_mean_rounding() {
        // (10.5 - 2.3 + 4.0) / 3 = 4.0666...
        assert_eq!(mean_tenths(122, 3), 41);
        assert_eq!(mean_tenths(200, 1), 200);
        // exact halves round up
        assert_eq!(mean_tenths(1, 2), 1);
        assert_eq!(mean_tenths(-1, 2), 0);
        assert_eq!(mean_tenths(-3, 2), -1);
        assert_eq!(mean_tenths(-7, 3), -2);
        assert_eq!(mean_tenths(0, 0), 0);
    }
}
