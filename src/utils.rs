use crate::error::FieldError;
use chrono::{Datelike, NaiveDate, NaiveTime};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Accepted date layouts, in priority order: ISO first, then day/month/year,
/// then month/day/year. The first layout that consumes the whole field wins.
pub const DATE_FORMATS: [&str; 7] = [
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%d/%m/%Y",
    "%d-%m-%Y",
    "%d.%m.%Y",
    "%m/%d/%Y",
    "%m-%d-%Y",
];

/// Time-of-day suffixes tolerated after a date.
const TIME_FORMATS: [&str; 5] = [
    "%H:%M",
    "%H:%M:%S",
    "%H:%M:%S%.f",
    "%I:%M %p",
    "%I:%M:%S %p",
];

/// Lowercases, strips accents and collapses anything that is not a letter or
/// digit into single spaces: `"  Categoría_Producto "` → `"categoria producto"`.
pub fn fold_key(raw: &str) -> String {
    let folded: String = raw
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();

    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn parse_flexible_date(raw: &str) -> Result<NaiveDate, FieldError> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(FieldError::Missing("date"));
    }

    // Exports sometimes carry a time of day after the date.
    let date_part = match value.split_once(|c: char| c == ' ' || c == 'T') {
        Some((date_part, time_part)) if is_time_of_day(time_part.trim()) => date_part,
        Some(_) => return Err(FieldError::InvalidDate(value.to_string())),
        None => value,
    };

    DATE_FORMATS
        .iter()
        .filter_map(|format| NaiveDate::parse_from_str(date_part, format).ok())
        // chrono reads "25" as year 25 under %Y; only four-digit years are dates here
        .find(|date| date.year() >= 1000)
        .ok_or_else(|| FieldError::InvalidDate(value.to_string()))
}

fn is_time_of_day(raw: &str) -> bool {
    TIME_FORMATS
        .iter()
        .any(|format| NaiveTime::parse_from_str(raw, format).is_ok())
}

/// Parses a non-negative monetary value, tolerating currency symbols or
/// codes around the number and either `,` or `.` as thousands separator.
pub fn parse_amount(raw: &str) -> Result<f64, FieldError> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(FieldError::Missing("amount"));
    }

    let (first, last) = match (
        value.find(|c: char| c.is_ascii_digit()),
        value.rfind(|c: char| c.is_ascii_digit()),
    ) {
        (Some(first), Some(last)) => (first, last),
        _ => return Err(FieldError::NotNumeric(value.to_string())),
    };

    let mut start = first;
    let prefix = &value[..first];
    if let Some(sep) = prefix.chars().last().filter(|c| *c == '.' || *c == ',') {
        let before = prefix[..prefix.len() - sep.len_utf8()].chars().last();
        if !before.is_some_and(char::is_alphabetic) {
            start -= sep.len_utf8();
        }
    }
    let prefix = &value[..start];
    let suffix = &value[last + 1..];
    let body = &value[start..=last];

    if prefix.contains(['-', '(']) || suffix.contains(['-', ')']) {
        return Err(FieldError::Negative(value.to_string()));
    }

    if !body
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | ',' | '\'') || c.is_whitespace())
    {
        return Err(FieldError::NotNumeric(value.to_string()));
    }

    let normalized =
        normalize_separators(body).ok_or_else(|| FieldError::NotNumeric(value.to_string()))?;

    normalized
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| FieldError::NotNumeric(value.to_string()))
}

pub fn parse_quantity(raw: &str) -> Result<u64, FieldError> {
    let value = match parse_amount(raw) {
        Err(FieldError::Missing(_)) => return Err(FieldError::Missing("quantity")),
        other => other?,
    };

    if value.fract() != 0.0 || value > u64::MAX as f64 {
        return Err(FieldError::Fractional(raw.trim().to_string()));
    }

    Ok(value as u64)
}

/// Rewrites a digits-and-separators string so `.` is the only (decimal)
/// separator. `None` if the separators cannot be read consistently.
///
/// Thousands separators (the chosen one, an apostrophe or a single space)
/// must split the integer part into groups of exactly three digits after the
/// first.
fn normalize_separators(body: &str) -> Option<String> {
    let dots = body.matches('.').count();
    let commas = body.matches(',').count();

    let (thousands, decimal) = match (dots, commas) {
        (0, 0) => (',', None),
        (_, 0) if dots > 1 => ('.', None),
        (_, 0) => (',', Some('.')),
        (0, 1) => {
            let decimals = body.len() - body.rfind(',')? - 1;
            if (1..=2).contains(&decimals) {
                ('.', Some(','))
            } else {
                (',', None)
            }
        }
        (0, _) => (',', None),
        _ => {
            if body.rfind('.')? > body.rfind(',')? {
                (',', Some('.'))
            } else {
                ('.', Some(','))
            }
        }
    };

    let (integer, fraction) = match decimal {
        Some(decimal) if body.matches(decimal).count() > 1 => return None,
        Some(decimal) => body.split_once(decimal)?,
        None => (body, ""),
    };
    if !fraction.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let groups: Vec<&str> = integer
        .split(|c: char| c == thousands || c == '\'' || c.is_whitespace())
        .collect();
    if !groups.iter().all(|g| g.chars().all(|c| c.is_ascii_digit())) {
        return None;
    }
    if let Some((first, rest)) = groups.split_first() {
        let grouped = (1..=3).contains(&first.len()) && rest.iter().all(|g| g.len() == 3);
        if !rest.is_empty() && !grouped {
            return None;
        }
    }

    let mut normalized = groups.concat();
    if decimal.is_some() {
        normalized.push('.');
        normalized.push_str(fraction);
    }
    Some(normalized)
}

/// `1234567.891` → `"1,234,567.89"`.
pub fn format_amount(value: f64) -> String {
    let formatted = format!("{:.2}", value.abs());
    let (integer, fraction) = formatted.split_once('.').unwrap_or((&formatted, "00"));

    let mut grouped = String::with_capacity(integer.len() + integer.len() / 3);
    for (idx, digit) in integer.chars().enumerate() {
        if idx > 0 && (integer.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if value < 0.0 && formatted != "0.00" { "-" } else { "" };
    format!("{}{}.{}", sign, grouped, fraction)
}

/// Relative change from `before` to `after`, `None` when `before` is zero.
pub fn relative_change(before: f64, after: f64) -> Option<f64> {
    if before == 0.0 {
        None
    } else {
        Some((after - before) / before)
    }
}
