// Cell coercion into typed values.
// Each function answers Ok(None) for a blank cell and Err(InvalidCell) for a
// value of the wrong shape; callers attach the column name.

use chrono::NaiveDate;

use crate::sheet::{excel_serial_to_date, RawCell};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidCell;

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d.%m.%Y", "%d/%m/%Y"];

/// Integer identifier: int cells, integral floats, or integer text ("101", " 101.0 ").
pub fn integer(cell: &RawCell) -> Result<Option<i64>, InvalidCell> {
    match cell {
        RawCell::Empty => Ok(None),
        RawCell::Int(n) => Ok(Some(*n)),
        RawCell::Float(n) => float_to_integer(*n).map(Some),
        RawCell::Text(s) => {
            let s = s.trim();
            if s.is_empty() {
                return Ok(None);
            }
            if let Ok(n) = s.parse::<i64>() {
                return Ok(Some(n));
            }
            match s.strip_suffix(".0") {
                Some(head) => head.parse::<i64>().map(Some).map_err(|_| InvalidCell),
                None => Err(InvalidCell),
            }
        }
        RawCell::Bool(_) | RawCell::Date(_) => Err(InvalidCell),
    }
}

fn float_to_integer(n: f64) -> Result<i64, InvalidCell> {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 9.0e15 {
        Ok(n as i64)
    } else {
        Err(InvalidCell)
    }
}

/// Decimal number. Text may carry spaces, apostrophes or commas as
/// thousands separators; the decimal separator is always '.'.
pub fn decimal(cell: &RawCell) -> Result<Option<f64>, InvalidCell> {
    match cell {
        RawCell::Empty => Ok(None),
        RawCell::Int(n) => Ok(Some(*n as f64)),
        RawCell::Float(n) if n.is_finite() => Ok(Some(*n)),
        RawCell::Float(_) => Err(InvalidCell),
        RawCell::Text(s) => {
            let cleaned: String = s
                .trim()
                .chars()
                .filter(|c| !matches!(c, ' ' | '\'' | ',' | '\u{a0}'))
                .collect();
            if cleaned.is_empty() {
                return Ok(None);
            }
            match cleaned.parse::<f64>() {
                Ok(n) if n.is_finite() => Ok(Some(n)),
                _ => Err(InvalidCell),
            }
        }
        RawCell::Bool(_) | RawCell::Date(_) => Err(InvalidCell),
    }
}

/// Money in integer cents, rounded half away from zero.
pub fn cents(cell: &RawCell) -> Result<Option<i64>, InvalidCell> {
    match decimal(cell)? {
        None => Ok(None),
        Some(n) => {
            let cents = (n * 100.0).round();
            if cents.abs() < 9.0e15 {
                Ok(Some(cents as i64))
            } else {
                Err(InvalidCell)
            }
        }
    }
}

/// Calendar date from a date cell, an Excel serial, or text.
pub fn date(cell: &RawCell) -> Result<Option<NaiveDate>, InvalidCell> {
    match cell {
        RawCell::Empty => Ok(None),
        RawCell::Date(d) => Ok(Some(*d)),
        RawCell::Int(n) => excel_serial_to_date(*n as f64).map(Some).ok_or(InvalidCell),
        RawCell::Float(n) => excel_serial_to_date(*n).map(Some).ok_or(InvalidCell),
        RawCell::Text(s) => {
            let s = s.trim();
            if s.is_empty() {
                return Ok(None);
            }
            // ISO datetimes ("2024-03-01T00:00:00") carry the date up front
            let s = s.split_once('T').map(|(d, _)| d).unwrap_or(s);
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
                .map(Some)
                .ok_or(InvalidCell)
        }
        RawCell::Bool(_) => Err(InvalidCell),
    }
}

/// Trimmed text; blank cells give `None`. Never fails.
pub fn text(cell: &RawCell) -> Option<String> {
    if cell.is_blank() {
        return None;
    }
    let s = cell.to_string();
    let trimmed = s.trim();
    Some(trimmed.to_string())
}
