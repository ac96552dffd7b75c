//! crates/compliance_core/src/dates.rs
//!
//! Date normalization: turns the heterogeneous deadline values found in the
//! tables into calendar dates. Nothing in here fails loudly; a value that
//! cannot be read is simply not usable.

use chrono::{NaiveDate, NaiveDateTime};

use crate::domain::FieldValue;

const DATE_LAYOUTS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%Y/%m/%d", "%d.%m.%Y"];

const DATETIME_LAYOUTS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%d-%m-%Y %H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
    "%d.%m.%Y %H:%M",
];

/// Characters stripped from both ends besides ordinary whitespace.
const EXOTIC_SPACES: &[char] = &['\u{00A0}', '\u{2007}', '\u{202F}', '\u{200B}', '\u{FEFF}'];

/// Placeholders meaning "not applicable", compared case-insensitively.
const PLACEHOLDERS: &[&str] = &[
    "a passer",
    "à passer",
    "dispensé",
    "dispense",
    "absent",
    "en cours",
    "pending",
    "exempt",
    "n/a",
    "na",
    "-",
];

/// Parses a raw field value into a calendar date.
pub fn parse(value: &FieldValue) -> Option<NaiveDate> {
    match value {
        FieldValue::Date(d) => Some(*d),
        FieldValue::DateTime(dt) => Some(dt.date()),
        FieldValue::Text(s) => parse_str(s),
        FieldValue::Null | FieldValue::Integer(_) | FieldValue::Real(_) => None,
    }
}

/// Parses a textual date in one of the accepted layouts. Extra tokens after
/// the date (a time, an annotation) are tolerated by retrying with the first
/// whitespace-delimited token.
pub fn parse_str(raw: &str) -> Option<NaiveDate> {
    let cleaned = clean(raw);
    if cleaned.is_empty() || is_placeholder(cleaned) {
        return None;
    }
    if let Some(date) = parse_layouts(cleaned) {
        return Some(date);
    }
    let first = cleaned.split_whitespace().next()?;
    if first.len() == cleaned.len() {
        return None;
    }
    parse_layouts(first)
}

/// True when the value is one of the known "not applicable" placeholders.
pub fn is_placeholder(raw: &str) -> bool {
    let lowered = clean(raw).to_lowercase();
    PLACEHOLDERS.iter().any(|p| *p == lowered)
}

fn clean(raw: &str) -> &str {
    raw.trim_matches(|c: char| c.is_whitespace() || EXOTIC_SPACES.contains(&c))
}

/// `%Y` in chrono also takes one to three digits; two-digit years such as
/// `07/03/25` must not be read as year 25.
fn has_four_digit_year(s: &str) -> bool {
    let date_part = s
        .split(|c: char| c.is_whitespace() || c == 'T')
        .next()
        .unwrap_or_default();
    let runs: Vec<usize> = date_part
        .split(|c: char| !c.is_ascii_digit())
        .filter(|run| !run.is_empty())
        .map(str::len)
        .collect();
    matches!(runs.as_slice(), [4, _, _] | [_, _, 4])
}

fn parse_layouts(s: &str) -> Option<NaiveDate> {
    if !has_four_digit_year(s) {
        return None;
    }
    DATE_LAYOUTS
        .iter()
        .find_map(|layout| NaiveDate::parse_from_str(s, layout).ok())
        .or_else(|| {
            DATETIME_LAYOUTS
                .iter()
                .find_map(|layout| NaiveDateTime::parse_from_str(s, layout).ok())
                .map(|dt| dt.date())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn accepts_every_supported_layout() {
        let expected = d(2025, 3, 7);
        for raw in ["2025-03-07", "07/03/2025", "07-03-2025", "2025/03/07", "07.03.2025"] {
            assert_eq!(parse_str(raw), Some(expected), "layout {raw}");
        }
    }

    #[test]
    fn discards_time_components() {
        assert_eq!(parse_str("2025-03-07 14:30:00"), Some(d(2025, 3, 7)));
        assert_eq!(parse_str("2025-03-07T14:30:00.250"), Some(d(2025, 3, 7)));
        assert_eq!(parse_str("07/03/2025 08:15"), Some(d(2025, 3, 7)));
    }

    #[test]
    fn short_years_are_not_dates() {
        assert_eq!(parse_str("07/03/25"), None);
        assert_eq!(parse_str("25-03-07"), None);
        assert_eq!(parse_str("07.03.25 08:15"), None);
        assert_eq!(parse_str("7/3/2025"), Some(d(2025, 3, 7)));
    }

    #[test]
    fn retries_with_first_token() {
        assert_eq!(parse_str("07/03/2025 renouvelé"), Some(d(2025, 3, 7)));
        assert_eq!(parse_str("2025-03-07 (à confirmer)"), Some(d(2025, 3, 7)));
    }

    #[test]
    fn strips_non_breaking_spaces() {
        assert_eq!(parse_str("\u{00A0}07/03/2025\u{202F}"), Some(d(2025, 3, 7)));
        assert_eq!(parse_str("  2025-03-07\n"), Some(d(2025, 3, 7)));
    }

    #[test]
    fn rejects_empty_null_and_placeholders() {
        assert_eq!(parse(&FieldValue::Null), None);
        assert_eq!(parse_str(""), None);
        assert_eq!(parse_str("   "), None);
        for raw in ["pending", "A PASSER", "Dispensé", "ABSENT", "en cours", "exempt"] {
            assert_eq!(parse_str(raw), None, "placeholder {raw}");
        }
    }

    #[test]
    fn rejects_garbage_without_panicking() {
        assert_eq!(parse_str("not a date"), None);
        assert_eq!(parse_str("31/02/2025"), None);
        assert_eq!(parse_str("2025-13-01"), None);
        assert_eq!(parse(&FieldValue::Integer(45000)), None);
    }

    #[test]
    fn native_values_pass_through() {
        let date = d(2025, 7, 20);
        assert_eq!(parse(&FieldValue::Date(date)), Some(date));
        let dt = date.and_hms_opt(9, 30, 0).unwrap();
        assert_eq!(parse(&FieldValue::DateTime(dt)), Some(date));
    }
}
