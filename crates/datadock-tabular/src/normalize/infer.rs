//! Column type inference
//!
//! Text columns are offered to an ordered list of strategies. A strategy's
//! result is accepted when it produced at least one value, or when the
//! column had no values to begin with; values a strategy cannot read become
//! missing. The first accepted conversion wins.

use crate::table::ColumnData;
use chrono::{DateTime, NaiveDate, NaiveDateTime};

/// Outcome of one conversion attempt
#[derive(Debug, Clone, PartialEq)]
pub struct Conversion {
    pub data: ColumnData,
    /// Converted values over values present before conversion; `0.0` when
    /// the column held no values.
    pub confidence: f64,
    converted: usize,
}

impl Conversion {
    fn new(data: ColumnData, converted: usize, present: usize) -> Self {
        let confidence = if present == 0 {
            0.0
        } else {
            converted as f64 / present as f64
        };
        Self {
            data,
            confidence,
            converted,
        }
    }

    pub fn converted(&self) -> usize {
        self.converted
    }
}

/// One way of reading a text column as a typed column
pub trait ConversionStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn convert(&self, values: &[Option<String>]) -> Conversion;
}

/// Plain numbers: `42`, `-3.5`, `1e3`
pub struct PlainNumeric;

/// Numbers with currency symbols, spaces and locale separators:
/// `€1.234,56`, `$ 1,234.56`, `2 000`
pub struct CurrencyNumeric;

/// Dates and date-times, day-first for ambiguous forms
pub struct DayFirstDate;

static STRATEGIES: [&dyn ConversionStrategy; 3] = [&PlainNumeric, &CurrencyNumeric, &DayFirstDate];

/// Strategies in the order they are tried
pub fn strategies() -> &'static [&'static dyn ConversionStrategy] {
    &STRATEGIES
}

/// Convert a text column to the first type a strategy accepts.
/// Non-text columns are returned untouched.
pub fn infer_column_type(data: ColumnData) -> ColumnData {
    let ColumnData::Text(values) = data else {
        return data;
    };
    let present = values.iter().filter(|v| v.is_some()).count();

    for strategy in strategies() {
        let conversion = strategy.convert(&values);
        if conversion.converted > 0 || present == 0 {
            tracing::trace!(
                strategy = strategy.name(),
                confidence = conversion.confidence,
                "Column conversion accepted"
            );
            return conversion.data;
        }
    }

    ColumnData::Text(values)
}

impl ConversionStrategy for PlainNumeric {
    fn name(&self) -> &'static str {
        "numeric"
    }

    fn convert(&self, values: &[Option<String>]) -> Conversion {
        numeric_conversion(values, |s| parse_plain(s.trim()))
    }
}

impl ConversionStrategy for CurrencyNumeric {
    fn name(&self) -> &'static str {
        "currency"
    }

    fn convert(&self, values: &[Option<String>]) -> Conversion {
        let decimal = column_decimal(values);
        numeric_conversion(values, |s| parse_localized(s, decimal))
    }
}

impl ConversionStrategy for DayFirstDate {
    fn name(&self) -> &'static str {
        "datetime"
    }

    fn convert(&self, values: &[Option<String>]) -> Conversion {
        let parsed: Vec<Option<i64>> = values
            .iter()
            .map(|v| v.as_deref().and_then(parse_datetime_millis))
            .collect();
        let converted = parsed.iter().filter(|v| v.is_some()).count();
        let present = values.iter().filter(|v| v.is_some()).count();
        Conversion::new(ColumnData::Timestamp(parsed), converted, present)
    }
}

/// A parsed number; `Int` only for integer literals that fit in `i64`.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    fn as_f64(self) -> f64 {
        match self {
            Number::Int(i) => i as f64,
            Number::Float(f) => f,
        }
    }
}

/// The result is an integer column only when every value is an integer and
/// none is missing; otherwise a float column.
fn numeric_conversion(
    values: &[Option<String>],
    parse: impl Fn(&str) -> Option<Number>,
) -> Conversion {
    let parsed: Vec<Option<Number>> = values
        .iter()
        .map(|v| v.as_deref().and_then(&parse))
        .collect();
    let converted = parsed.iter().filter(|v| v.is_some()).count();
    let present = values.iter().filter(|v| v.is_some()).count();

    let all_int = converted == values.len()
        && parsed.iter().all(|v| matches!(v, Some(Number::Int(_))));

    let data = if all_int && !values.is_empty() {
        ColumnData::Int(
            parsed
                .into_iter()
                .map(|v| match v {
                    Some(Number::Int(i)) => Some(i),
                    _ => None,
                })
                .collect(),
        )
    } else {
        ColumnData::Float(parsed.into_iter().map(|v| v.map(Number::as_f64)).collect())
    };

    Conversion::new(data, converted, present)
}

fn is_integer_literal(s: &str) -> bool {
    let digits = s.strip_prefix(['-', '+']).unwrap_or(s);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

fn parse_plain(s: &str) -> Option<Number> {
    if is_integer_literal(s) {
        if let Ok(i) = s.parse::<i64>() {
            return Some(Number::Int(i));
        }
    }
    // Rejects "inf", "NaN" and friends, which f64 parsing would accept
    if !s.bytes().any(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse::<f64>().ok().map(Number::Float)
}

/// Strip currency symbols and whitespace, then resolve thousands and decimal
/// separators. `decimal` is the column's decimal separator when one was
/// settled on; otherwise each value decides for itself: with both `.` and
/// `,` present the later one is the decimal separator, and a lone comma
/// followed by exactly three digits groups thousands.
fn parse_localized(raw: &str, decimal: Option<char>) -> Option<Number> {
    let (negative, body) = split_sign(raw)?;

    let number = match decimal {
        _ if !body.contains([',', '.']) => parse_plain(&body)?,
        Some(decimal) => with_decimal(&body, decimal)?,
        None => match parse_plain(&body) {
            Some(n) => n,
            None => with_decimal(&body, decimal_vote(&body).unwrap_or('.'))?,
        },
    };

    Some(match (negative, number) {
        (false, n) => n,
        (true, Number::Int(i)) => Number::Int(-i),
        (true, Number::Float(f)) => Number::Float(-f),
    })
}

fn split_sign(raw: &str) -> Option<(bool, String)> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, '€' | '$' | '£') && !c.is_whitespace())
        .collect();

    let (negative, body) = match cleaned.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, cleaned.strip_prefix('+').unwrap_or(cleaned.as_str())),
    };
    if body.is_empty() || body.starts_with(['-', '+']) {
        return None;
    }
    Some((negative, body.to_string()))
}

/// The decimal separator a single value implies, `None` when it could be
/// either (`1,250`, `1.250`) or has no separator at all
fn decimal_vote(body: &str) -> Option<char> {
    match (body.rfind('.'), body.rfind(',')) {
        (Some(dot), Some(comma)) => Some(if dot > comma { '.' } else { ',' }),
        (None, Some(_)) => lone_separator_vote(body, ','),
        (Some(_), None) => lone_separator_vote(body, '.'),
        (None, None) => None,
    }
}

fn lone_separator_vote(body: &str, separator: char) -> Option<char> {
    let other = if separator == ',' { '.' } else { ',' };
    if body.matches(separator).count() > 1 {
        Some(other)
    } else if body.rsplit(separator).next().map_or(0, str::len) == 3 {
        None
    } else {
        Some(separator)
    }
}

/// Majority decimal separator over the values that are unambiguous; `None`
/// on a tie
fn column_decimal(values: &[Option<String>]) -> Option<char> {
    let (mut dots, mut commas) = (0usize, 0usize);
    for (_, body) in values.iter().flatten().filter_map(|v| split_sign(v)) {
        match decimal_vote(&body) {
            Some('.') => dots += 1,
            Some(',') => commas += 1,
            _ => {}
        }
    }
    match dots.cmp(&commas) {
        std::cmp::Ordering::Greater => Some('.'),
        std::cmp::Ordering::Less => Some(','),
        std::cmp::Ordering::Equal => None,
    }
}

fn with_decimal(body: &str, decimal: char) -> Option<Number> {
    let thousands = if decimal == ',' { '.' } else { ',' };
    match body.split_once(decimal) {
        Some((integer, fraction)) => decimal_with_grouping(integer, fraction, thousands),
        None => grouped_integer(body, thousands),
    }
}

/// `1.234.567` with `.` as separator: first group 1-3 digits, then groups of 3
fn grouped_integer(s: &str, separator: char) -> Option<Number> {
    let mut groups = s.split(separator);
    let first = groups.next()?;
    if first.is_empty() || first.len() > 3 || !first.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let mut digits = first.to_string();
    for group in groups {
        if group.len() != 3 || !group.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.push_str(group);
    }
    match digits.parse::<i64>() {
        Ok(i) => Some(Number::Int(i)),
        Err(_) => digits.parse::<f64>().ok().map(Number::Float),
    }
}

fn decimal_with_grouping(integer: &str, fraction: &str, thousands: char) -> Option<Number> {
    if fraction.is_empty() || !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let integer_digits = if integer.is_empty() {
        "0".to_string()
    } else if integer.contains(thousands) {
        match grouped_integer(integer, thousands)? {
            Number::Int(i) => i.to_string(),
            Number::Float(_) => return None,
        }
    } else if integer.bytes().all(|b| b.is_ascii_digit()) {
        integer.to_string()
    } else {
        return None;
    };
    format!("{}.{}", integer_digits, fraction)
        .parse::<f64>()
        .ok()
        .map(Number::Float)
}

const DATE_FORMATS: &[&str] = &[
    "%d.%m.%Y", "%d/%m/%Y", "%d-%m-%Y", "%Y-%m-%d", "%Y/%m/%d", "%d.%m.%y", "%d/%m/%y",
    "%d %b %Y", "%d %B %Y",
];

const MONTH_FIRST_DATE_FORMATS: &[&str] = &["%m/%d/%Y"];

const MONTH_FIRST_DATETIME_FORMATS: &[&str] = &["%m/%d/%Y %H:%M:%S", "%m/%d/%Y %H:%M"];

const DATETIME_FORMATS: &[&str] = &[
    "%d.%m.%Y %H:%M:%S",
    "%d.%m.%Y %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%d-%m-%Y %H:%M:%S",
    "%d-%m-%Y %H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
];

/// Milliseconds since the epoch (UTC) for a recognised date or date-time
fn parse_datetime_millis(raw: &str) -> Option<i64> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp_millis());
    }
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt.and_utc().timestamp_millis());
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, format) {
            return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc().timestamp_millis());
        }
    }
    // Month-first only once no day-first reading exists
    for format in MONTH_FIRST_DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt.and_utc().timestamp_millis());
        }
    }
    for format in MONTH_FIRST_DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, format) {
            return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc().timestamp_millis());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn text(values: &[Option<&str>]) -> ColumnData {
        ColumnData::Text(values.iter().map(|v| v.map(str::to_string)).collect())
    }

    fn millis(y: i32, m: u32, d: u32) -> i64 {
        chrono::Utc
            .with_ymd_and_hms(y, m, d, 0, 0, 0)
            .unwrap()
            .timestamp_millis()
    }

    #[test]
    fn test_plain_integers() {
        assert_eq!(
            infer_column_type(text(&[Some("1"), Some("-2"), Some(" 30 ")])),
            ColumnData::Int(vec![Some(1), Some(-2), Some(30)])
        );
    }

    #[test]
    fn test_integers_with_missing_become_float() {
        assert_eq!(
            infer_column_type(text(&[Some("1"), None])),
            ColumnData::Float(vec![Some(1.0), None])
        );
    }

    #[test]
    fn test_european_decimals() {
        assert_eq!(
            infer_column_type(text(&[Some("1.234,56"), Some("2.000,00")])),
            ColumnData::Float(vec![Some(1234.56), Some(2000.0)])
        );
    }

    #[test]
    fn test_currency_symbols() {
        assert_eq!(
            infer_column_type(text(&[Some("€1.234,56"), Some("$ 99"), Some("£1,000.50")])),
            ColumnData::Float(vec![Some(1234.56), Some(99.0), Some(1000.5)])
        );
    }

    #[test]
    fn test_decimal_separator_is_settled_per_column() {
        assert_eq!(
            infer_column_type(text(&[Some("1,250"), Some("2,5")])),
            ColumnData::Float(vec![Some(1.25), Some(2.5)])
        );
        assert_eq!(
            infer_column_type(text(&[Some("1,250"), Some("3,000"), Some("1,234.5")])),
            ColumnData::Float(vec![Some(1250.0), Some(3000.0), Some(1234.5)])
        );
        assert_eq!(column_decimal(&[Some("1,250".to_string())]), None);
    }

    #[test]
    fn test_thousands_groups() {
        assert_eq!(parse_localized("1,234", None), Some(Number::Int(1234)));
        assert_eq!(parse_localized("1.234.567", None), Some(Number::Int(1_234_567)));
        assert_eq!(parse_localized("2\u{a0}000", None), Some(Number::Int(2000)));
        assert_eq!(parse_localized("12,5", None), Some(Number::Float(12.5)));
        assert_eq!(parse_localized("-1.234,5", None), Some(Number::Float(-1234.5)));
        assert_eq!(parse_localized("1.23.4", None), None);
        assert_eq!(parse_localized("12,34,5", None), None);
        assert_eq!(parse_localized("abc", None), None);
    }

    #[test]
    fn test_day_first_dates() {
        assert_eq!(
            infer_column_type(text(&[Some("31.12.2025"), Some("01.02.2025")])),
            ColumnData::Timestamp(vec![Some(millis(2025, 12, 31)), Some(millis(2025, 2, 1))])
        );
    }

    #[test]
    fn test_month_first_dates_when_day_first_is_impossible() {
        assert_eq!(
            infer_column_type(text(&[Some("12/31/2025"), Some("01/15/2025")])),
            ColumnData::Timestamp(vec![Some(millis(2025, 12, 31)), Some(millis(2025, 1, 15))])
        );
        let expected = chrono::Utc
            .with_ymd_and_hms(2025, 12, 31, 8, 15, 0)
            .unwrap()
            .timestamp_millis();
        assert_eq!(parse_datetime_millis("12/31/2025 08:15"), Some(expected));
        // Ambiguous values stay day-first
        assert_eq!(parse_datetime_millis("01/02/2025"), Some(millis(2025, 2, 1)));
    }

    #[test]
    fn test_iso_datetimes() {
        let expected = chrono::Utc
            .with_ymd_and_hms(2024, 3, 5, 14, 30, 0)
            .unwrap()
            .timestamp_millis();
        assert_eq!(parse_datetime_millis("2024-03-05 14:30:00"), Some(expected));
        assert_eq!(parse_datetime_millis("2024-03-05T15:30:00+01:00"), Some(expected));
        assert_eq!(parse_datetime_millis("2024-03-05"), Some(millis(2024, 3, 5)));
    }

    #[test]
    fn test_text_stays_text() {
        let data = text(&[Some("Köln"), Some("Bonn")]);
        assert_eq!(infer_column_type(data.clone()), data);
    }

    #[test]
    fn test_partial_conversion_is_accepted() {
        assert_eq!(
            infer_column_type(text(&[Some("5"), Some("n.a.")])),
            ColumnData::Float(vec![Some(5.0), None])
        );
    }

    #[test]
    fn test_all_missing_converts_to_float() {
        assert_eq!(
            infer_column_type(text(&[None, None])),
            ColumnData::Float(vec![None, None])
        );
    }

    #[test]
    fn test_confidence() {
        let values = vec![Some("1".to_string()), Some("x".to_string())];
        let conversion = PlainNumeric.convert(&values);
        assert_eq!(conversion.converted(), 1);
        assert!((conversion.confidence - 0.5).abs() < f64::EPSILON);
    }
}
