use crate::error::Result;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use lazy_static::lazy_static;
use polars::prelude::*;
use regex::Regex;

lazy_static! {
    static ref THOUSANDS: Regex = Regex::new(r"^[+-]?\d{1,3}(,\d{3})+(\.\d+)?$").unwrap();
}

/// Formats tried when deciding whether a text column *is* a date column
pub const STRICT_DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S%.f",
];

/// Extra formats for the explicit re-parse of date-named columns
pub const LENIENT_DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%d/%m/%Y",
    "%m/%d/%Y",
    "%d-%m-%Y",
    "%d.%m.%Y",
    "%d/%m/%Y %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%d %b %Y",
    "%b %d, %Y",
    "%d %B %Y",
    "%B %d, %Y",
];

/// How a column's dates are read back at execution time
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateParsing {
    /// Stored as Date/Datetime already
    Native,
    Strict,
    Lenient,
}

impl DateParsing {
    pub fn formats(self) -> &'static [&'static str] {
        match self {
            DateParsing::Native | DateParsing::Strict => STRICT_DATE_FORMATS,
            DateParsing::Lenient => LENIENT_DATE_FORMATS,
        }
    }
}

fn fold_digits(value: &str) -> String {
    value
        .chars()
        .map(|c| match c {
            '\u{0660}'..='\u{0669}' => char::from(b'0' + (c as u32 - 0x0660) as u8),
            '\u{06F0}'..='\u{06F9}' => char::from(b'0' + (c as u32 - 0x06F0) as u8),
            '\u{066B}' => '.',
            '\u{066C}' => ',',
            c => c,
        })
        .collect()
}

/// Coerce a cell to a number, or `None` when it is not one.
///
/// Accepts thousand separators (`1,200.50`), a leading or trailing currency
/// sign, a trailing percent sign, accounting negatives (`(100)`) and
/// Arabic-Indic digits.
pub fn parse_numeric(value: &str) -> Option<f64> {
    let folded = fold_digits(value.trim());
    let mut text = folded.as_str();

    let mut negate = false;
    if text.starts_with('(') && text.ends_with(')') && text.len() > 2 {
        negate = true;
        text = &text[1..text.len() - 1];
    }
    let text = text
        .trim_matches(|c: char| c.is_whitespace() || "$€£¥₹%".contains(c))
        .trim();
    if text.is_empty() || !text.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    let cleaned = if THOUSANDS.is_match(text) {
        text.replace(',', "")
    } else {
        text.to_string()
    };
    let parsed: f64 = cleaned.parse().ok()?;
    if !parsed.is_finite() {
        return None;
    }
    Some(if negate { -parsed } else { parsed })
}

/// Parse a cell as a date with the first format that fits the whole value
pub fn parse_date(value: &str, formats: &[&str]) -> Option<NaiveDate> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    for format in formats {
        let parsed = if format.contains("%H") {
            NaiveDateTime::parse_from_str(value, format).ok().map(|dt| dt.date())
        } else {
            NaiveDate::parse_from_str(value, format).ok()
        };
        if parsed.is_some() {
            return parsed;
        }
    }
    DateTime::parse_from_rfc3339(value).ok().map(|dt| dt.date_naive())
}

/// Column values as text; non-text columns are cast
pub fn string_values(series: &Series) -> Result<Vec<Option<String>>> {
    let text = if matches!(series.dtype(), DataType::String) {
        series.clone()
    } else {
        series.cast(&DataType::String)?
    };
    Ok(text
        .str()?
        .into_iter()
        .map(|v| v.map(|s| s.to_string()))
        .collect())
}

/// Column values as numbers plus the count of non-empty cells that failed coercion
pub fn numeric_values(series: &Series) -> Result<(Vec<Option<f64>>, usize)> {
    if series.dtype().is_numeric() {
        let cast = series.cast(&DataType::Float64)?;
        let values = cast.f64()?.into_iter().collect();
        return Ok((values, 0));
    }

    let mut skipped = 0;
    let values = string_values(series)?
        .into_iter()
        .map(|cell| {
            let cell = cell?;
            let parsed = parse_numeric(&cell);
            if parsed.is_none() && !cell.trim().is_empty() {
                skipped += 1;
            }
            parsed
        })
        .collect();
    Ok((values, skipped))
}

fn days_to_date(days: i32) -> Option<NaiveDate> {
    // 719_163 days from 0001-01-01 to 1970-01-01
    NaiveDate::from_num_days_from_ce_opt(days.checked_add(719_163)?)
}

fn timestamp_to_date(value: i64, unit: TimeUnit) -> Option<NaiveDate> {
    let per_second: i64 = match unit {
        TimeUnit::Milliseconds => 1_000,
        TimeUnit::Microseconds => 1_000_000,
        TimeUnit::Nanoseconds => 1_000_000_000,
    };
    let secs = value.div_euclid(per_second);
    let nanos = (value.rem_euclid(per_second) * (1_000_000_000 / per_second)) as u32;
    DateTime::from_timestamp(secs, nanos).map(|dt| dt.date_naive())
}

/// Column values as dates plus the count of non-empty cells that failed to parse
pub fn date_values(series: &Series, parsing: DateParsing) -> Result<(Vec<Option<NaiveDate>>, usize)> {
    match series.dtype() {
        DataType::Date => {
            let days = series.cast(&DataType::Int32)?;
            let values = days
                .i32()?
                .into_iter()
                .map(|d| d.and_then(days_to_date))
                .collect();
            Ok((values, 0))
        }
        DataType::Datetime(unit, _) => {
            let unit = *unit;
            let stamps = series.cast(&DataType::Int64)?;
            let values = stamps
                .i64()?
                .into_iter()
                .map(|v| v.and_then(|v| timestamp_to_date(v, unit)))
                .collect();
            Ok((values, 0))
        }
        _ => {
            let formats = parsing.formats();
            let mut skipped = 0;
            let values = string_values(series)?
                .into_iter()
                .map(|cell| {
                    let cell = cell?;
                    let parsed = parse_date(&cell, formats);
                    if parsed.is_none() && !cell.trim().is_empty() {
                        skipped += 1;
                    }
                    parsed
                })
                .collect();
            Ok((values, skipped))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_numeric_accepts_common_shapes() {
        assert_eq!(parse_numeric("100"), Some(100.0));
        assert_eq!(parse_numeric(" 1,200.50 "), Some(1200.5));
        assert_eq!(parse_numeric("$15"), Some(15.0));
        assert_eq!(parse_numeric("12%"), Some(12.0));
        assert_eq!(parse_numeric("(250)"), Some(-250.0));
        assert_eq!(parse_numeric("١٢٣"), Some(123.0));
        assert_eq!(parse_numeric("-3.5e2"), Some(-350.0));
    }

    #[test]
    fn test_parse_numeric_rejects_junk() {
        assert_eq!(parse_numeric(""), None);
        assert_eq!(parse_numeric("n/a"), None);
        assert_eq!(parse_numeric("NaN"), None);
        assert_eq!(parse_numeric("inf"), None);
        assert_eq!(parse_numeric("A1"), None);
        assert_eq!(parse_numeric("12,34"), None);
    }

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 7);
        assert_eq!(parse_date("2024-03-07", STRICT_DATE_FORMATS), expected);
        assert_eq!(parse_date("2024-03-07 14:05:00", STRICT_DATE_FORMATS), expected);
        assert_eq!(parse_date("07/03/2024", STRICT_DATE_FORMATS), None);
        assert_eq!(parse_date("07/03/2024", LENIENT_DATE_FORMATS), expected);
        assert_eq!(parse_date("not a date", LENIENT_DATE_FORMATS), None);
    }

    #[test]
    fn test_numeric_values_counts_skipped() {
        let series = Series::new("price", &["10", "oops", "", "2,500"]);
        let (values, skipped) = numeric_values(&series).unwrap();
        assert_eq!(values, vec![Some(10.0), None, None, Some(2500.0)]);
        assert_eq!(skipped, 1);
    }

    #[test]
    fn test_date_values_from_text() {
        let series = Series::new("date", &["2024-01-31", "junk"]);
        let (values, skipped) = date_values(&series, DateParsing::Strict).unwrap();
        assert_eq!(values[0], NaiveDate::from_ymd_opt(2024, 1, 31));
        assert_eq!(values[1], None);
        assert_eq!(skipped, 1);
    }

    #[test]
    fn test_timestamp_to_date() {
        // 2024-01-01T00:00:00Z
        let millis = 1_704_067_200_000;
        assert_eq!(
            timestamp_to_date(millis, TimeUnit::Milliseconds),
            NaiveDate::from_ymd_opt(2024, 1, 1)
        );
        assert_eq!(days_to_date(0), NaiveDate::from_ymd_opt(1970, 1, 1));
    }
}
