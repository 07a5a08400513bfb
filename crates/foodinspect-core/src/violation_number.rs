//! Violation number parsing for observation rows.
//!
//! Observation rows open with the violation number as printed, terminated by
//! a period: `"1."`, `"12."`. Anything else in that position (`"2a."`,
//! `"Note:"`, a bare `"3"`) marks a stray formatting row.

/// Character that terminates a printed violation number.
pub const VIOLATION_NUMBER_DELIMITER: char = '.';

/// Parse the leading token of an observation row into a violation number.
///
/// Returns `None` unless the token ends in [`VIOLATION_NUMBER_DELIMITER`] and
/// the remainder is a positive integer.
pub fn parse_violation_number(token: &str) -> Option<u32> {
    let digits = token.trim().strip_suffix(VIOLATION_NUMBER_DELIMITER)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse::<u32>().ok().filter(|&n| n > 0)
}

/// The cross-reference label for a violation number, e.g. `"7."`.
pub fn violation_label(number: u32) -> String {
    format!("{number}{VIOLATION_NUMBER_DELIMITER}")
}
