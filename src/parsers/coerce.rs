//! Lenient numeric coercion for noisy export fields.
//!
//! Values take the longest leading integer prefix, after optional
//! whitespace and sign. Anything without one coerces to 0 rather than
//! failing the record: `"60"` -> 60, `"60.00"` -> 60, `" -5x"` -> -5,
//! `"N/A"` -> 0.

/// Parse the leading integer of `value`, or 0.
pub fn lenient_i64(value: &str) -> i64 {
    let trimmed = value.trim_start();
    let (negative, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let end = digits
        .bytes()
        .position(|b| !b.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return 0;
    }

    // Overflowing values saturate instead of wrapping.
    let magnitude = digits[..end].parse::<i64>().unwrap_or(i64::MAX);
    if negative {
        -magnitude
    } else {
        magnitude
    }
}
