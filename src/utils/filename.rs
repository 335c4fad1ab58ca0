//! Naming helpers for date-bucketed directories and segment files.
//!
//! Stream titles come from external APIs and can contain anything; they are
//! reduced to a conservative allow-list before being embedded in file names.
//! Output files are grouped into `<mon>_<year>` directories with names of the
//! form `<day>_<title>_<unix ts>`.

use chrono::{Datelike, NaiveDate};

/// Characters allowed in a sanitized title besides ASCII letters and digits.
const TITLE_EXTRA_CHARS: &[char] = &['-', '.', '(', ')', ' '];

/// Lowercase three-letter month names used for directory buckets.
const MONTHS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

/// Reduce a stream title to the filename allow-list.
///
/// Every character of the output is an ASCII letter, digit, space, `-`, `.`,
/// `(` or `)`, and the output is a subsequence of the input: disallowed
/// characters are dropped, never replaced.
pub fn sanitize_title(input: &str) -> String {
    input
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || TITLE_EXTRA_CHARS.contains(c))
        .collect()
}

/// Directory bucket name for a date, e.g. `aug_2026`.
pub fn month_dir_name(date: NaiveDate) -> String {
    format!("{}_{}", MONTHS[date.month0() as usize], date.year())
}

/// File stem for one capture session: `<day>_<title>_<unix ts>`.
///
/// The caller appends the sequence placeholder and extension.
pub fn session_stem(date: NaiveDate, sanitized_title: &str, unix_ts: i64) -> String {
    format!("{}_{}_{}", date.day(), sanitized_title, unix_ts)
}
