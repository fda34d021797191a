//! Field coercion for free-text dates, Brazilian money strings, and documents.
//!
//! Every parser returns `None` on malformed input; callers decide whether to log.

use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde_json::Value;

/// Parse an ISO date (`YYYY-MM-DD`) or the date part of an ISO datetime.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .or_else(|| parse_datetime(s).map(|dt| dt.date()))
}

/// Parse an ISO datetime, normalised to UTC when an offset is present.
///
/// A bare ISO date is accepted as midnight.
pub fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%z"] {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.naive_utc());
        }
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Parse `MM/YYYY` into the first day of that month.
///
/// A full date (a spreadsheet date cell) maps to the first of its month.
pub fn parse_month_year(raw: &str) -> Option<NaiveDate> {
    let month_year = || {
        let (month, year) = raw.trim().split_once('/')?;
        let month: u32 = month.trim().parse().ok()?;
        let year: i32 = year.trim().parse().ok()?;
        NaiveDate::from_ymd_opt(year, month, 1)
    };
    month_year().or_else(|| parse_loose_date(raw).and_then(|d| d.with_day(1)))
}

/// Parse an ISO date/datetime or a Brazilian `DD/MM/YYYY` date.
pub fn parse_loose_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    parse_date(s).or_else(|| NaiveDate::parse_from_str(s, "%d/%m/%Y").ok())
}

/// Strip the currency symbol and all whitespace; `None` when nothing is left.
fn strip_currency(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .replace("R$", "")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    (!cleaned.is_empty()).then_some(cleaned)
}

fn decimal_text(normalized: &str) -> Option<Decimal> {
    if !normalized
        .chars()
        .all(|c| c.is_ascii_digit() || c == '.' || c == '-')
    {
        return None;
    }
    Decimal::from_str(normalized).ok()
}

/// Parse a Brazilian-formatted amount: `R$ 1.234,56`, `R$ 1.500`, `150.000`.
///
/// Dots are always thousands separators and the comma is the decimal mark.
/// Spreadsheet columns use this.
pub fn parse_brl(raw: &str) -> Option<Decimal> {
    let cleaned = strip_currency(raw)?;
    decimal_text(&cleaned.replace('.', "").replace(',', "."))
}

/// Parse a plain decimal such as the API's `1234.56`.
///
/// Text containing a comma is read as Brazilian formatting instead.
pub fn parse_decimal(raw: &str) -> Option<Decimal> {
    let cleaned = strip_currency(raw)?;
    if cleaned.contains(',') {
        return parse_brl(&cleaned);
    }
    decimal_text(&cleaned)
}

/// Whether `value` fits a `DECIMAL(18, 2)` money column once rounded to cents.
pub fn fits_money_column(value: &Decimal) -> bool {
    value.round_dp(2).abs() <= Decimal::new(999_999_999_999_999_999, 2)
}

/// Money from a JSON value that may be a string or a number.
pub fn money_from_json(value: &Value) -> Option<Decimal> {
    match value {
        Value::String(s) => parse_decimal(s),
        Value::Number(n) => Decimal::from_str(&n.to_string())
            .ok()
            .or_else(|| n.as_f64().and_then(|f| Decimal::try_from(f).ok())),
        _ => None,
    }
}

/// Integer from a JSON value that may be a number or numeric text.
pub fn int_from_json(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Format a decimal as Brazilian currency: `R$ 1.234,56`.
pub fn format_brl(value: Decimal) -> String {
    let rounded = value.round_dp(2);
    let text = format!("{:.2}", rounded.abs());
    let (int_part, frac_part) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }

    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };
    format!("{sign}R$ {grouped},{frac_part}")
}

/// Keep only ASCII digits.
pub fn digits(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Normalise a CPF/CNPJ: digits only, left-padded to 11 (CPF) or 14 (CNPJ).
///
/// The width is chosen from the raw text length. Empty or digit-free input
/// yields an empty string.
pub fn pad_document(raw: Option<&str>) -> String {
    let Some(raw) = raw else {
        return String::new();
    };
    let width = if raw.trim().chars().count() <= 11 { 11 } else { 14 };
    pad_digits(raw, width)
}

/// Digits of `raw` left-padded with zeros to `width`; empty when there are none.
pub fn pad_digits(raw: &str, width: usize) -> String {
    let d = digits(raw);
    if d.is_empty() {
        return d;
    }
    format!("{d:0>width$}")
}
