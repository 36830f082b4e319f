// Raw sheet loading: Excel/ODS through calamine, delimited text through csv.
// No typing happens here beyond what the container itself records.

use std::fmt;
use std::io::Cursor;
use std::path::Path;

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use chrono::{Days, NaiveDate};

use crate::error::MalformedFileError;

/// Sheets with more rows than this are rejected as a whole. Uploads are held
/// in memory, and a truncated sheet would delete its missing order numbers.
pub const MAX_ROWS: usize = 1_048_576;

/// One cell as the container stored it.
#[derive(Debug, Clone, PartialEq)]
pub enum RawCell {
    Empty,
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Date(NaiveDate),
}

impl RawCell {
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }
}

impl fmt::Display for RawCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => Ok(()),
            Self::Text(s) => f.write_str(s),
            Self::Int(n) => write!(f, "{n}"),
            // Integral floats print without the trailing ".0"
            Self::Float(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            Self::Float(n) => write!(f, "{n}"),
            Self::Bool(b) => f.write_str(if *b { "TRUE" } else { "FALSE" }),
            Self::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
        }
    }
}

/// A sheet line with its 1-based row number in the source file.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
    pub number: usize,
    pub cells: Vec<RawCell>,
}

impl RawRow {
    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(RawCell::is_blank)
    }

    pub fn cell(&self, col: usize) -> &RawCell {
        self.cells.get(col).unwrap_or(&RawCell::Empty)
    }

    /// Cell values as text, trailing empties dropped.
    pub fn values(&self) -> Vec<String> {
        let mut values: Vec<String> = self.cells.iter().map(|c| c.to_string()).collect();
        while values.last().is_some_and(|v| v.is_empty()) {
            values.pop();
        }
        values
    }
}

/// The first worksheet of an upload, non-blank rows only.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawSheet {
    pub rows: Vec<RawRow>,
}

/// Read an uploaded file. The name only decides between delimited text
/// and workbook containers; workbook flavours are sniffed from the bytes.
pub fn read(bytes: &[u8], file_name: &str) -> Result<RawSheet, MalformedFileError> {
    read_with_limit(bytes, file_name, MAX_ROWS)
}

pub(crate) fn read_with_limit(
    bytes: &[u8],
    file_name: &str,
    max_rows: usize,
) -> Result<RawSheet, MalformedFileError> {
    if bytes.is_empty() {
        return Err(MalformedFileError::EmptyFile);
    }

    let sheet = if is_delimited_name(file_name) {
        read_delimited(bytes, max_rows)?
    } else {
        read_workbook(bytes, max_rows)?
    };

    if sheet.rows.is_empty() {
        return Err(MalformedFileError::EmptyFile);
    }
    log::debug!("read {} non-blank rows from '{}'", sheet.rows.len(), file_name);
    Ok(sheet)
}

fn is_delimited_name(file_name: &str) -> bool {
    Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| matches!(e.to_ascii_lowercase().as_str(), "csv" | "tsv" | "txt"))
        .unwrap_or(false)
}

// ---------------------------------------------------------------------------
// Workbooks (xlsx, xlsm, xls, xlsb, ods)
// ---------------------------------------------------------------------------

fn read_workbook(bytes: &[u8], max_rows: usize) -> Result<RawSheet, MalformedFileError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| MalformedFileError::NotASpreadsheet(e.to_string()))?;

    let sheet_names: Vec<String> = workbook.sheet_names().to_vec();
    let first = sheet_names.first().ok_or(MalformedFileError::NoWorksheet)?;

    let range = workbook
        .worksheet_range(first)
        .map_err(|e| MalformedFileError::Unreadable(format!("sheet '{first}': {e}")))?;

    if range.height() > max_rows {
        return Err(MalformedFileError::TooManyRows { limit: max_rows });
    }

    // Range start offset (data may not begin at A1)
    let (start_row, _) = range.start().unwrap_or((0, 0));

    let mut rows = Vec::new();
    for (row_idx, row) in range.rows().enumerate() {
        let raw = RawRow {
            number: start_row as usize + row_idx + 1,
            cells: row.iter().map(convert_cell).collect(),
        };
        if !raw.is_blank() {
            rows.push(raw);
        }
    }

    Ok(RawSheet { rows })
}

fn convert_cell(cell: &Data) -> RawCell {
    match cell {
        Data::Empty => RawCell::Empty,
        Data::String(s) => RawCell::Text(s.clone()),
        Data::Int(n) => RawCell::Int(*n),
        Data::Float(n) => RawCell::Float(*n),
        Data::Bool(b) => RawCell::Bool(*b),
        // 1900 date system assumed, as for most exports
        Data::DateTime(dt) => match excel_serial_to_date(dt.as_f64()) {
            Some(date) => RawCell::Date(date),
            None => RawCell::Float(dt.as_f64()),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => RawCell::Text(s.clone()),
        Data::Error(e) => RawCell::Text(format!("#{:?}", e)),
    }
}

/// Convert an Excel serial day number (1900 system) to a calendar date.
pub fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 1.0 {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    epoch.checked_add_days(Days::new(serial.floor() as u64))
}

// ---------------------------------------------------------------------------
// Delimited text
// ---------------------------------------------------------------------------

fn read_delimited(bytes: &[u8], max_rows: usize) -> Result<RawSheet, MalformedFileError> {
    let content = decode_text(bytes);
    let delimiter = sniff_delimiter(&content)?;

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut rows = Vec::new();
    for (row_idx, result) in reader.records().enumerate() {
        if row_idx >= max_rows {
            return Err(MalformedFileError::TooManyRows { limit: max_rows });
        }
        let record = result.map_err(|e| MalformedFileError::Unreadable(e.to_string()))?;
        let number = record
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(row_idx + 1);
        let cells = record
            .iter()
            .map(|field| {
                if field.trim().is_empty() {
                    RawCell::Empty
                } else {
                    RawCell::Text(field.to_string())
                }
            })
            .collect();
        let raw = RawRow { number, cells };
        if !raw.is_blank() {
            rows.push(raw);
        }
    }

    Ok(RawSheet { rows })
}

/// Decode to UTF-8, falling back to Windows-1252 (common for Excel-exported CSVs).
fn decode_text(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            decoded.into_owned()
        }
    }
}

const DELIMITERS: [u8; 4] = [b'\t', b';', b',', b'|'];

/// Pick the delimiter from the header line, the first non-blank line.
///
/// Both exports carry several named columns, so the delimiter that splits the
/// header into the most fields wins. Two candidates splitting it into the
/// same number of fields cannot be told apart, and the file is rejected. A
/// header no candidate splits falls back to `,`; header binding then reports
/// the missing columns.
fn sniff_delimiter(content: &str) -> Result<u8, MalformedFileError> {
    let Some(header) = content.lines().find(|l| !l.trim().is_empty()) else {
        return Ok(b',');
    };

    let mut fields: Vec<(u8, usize)> = DELIMITERS
        .iter()
        .map(|&delim| (delim, header_fields(header, delim)))
        .filter(|&(_, n)| n > 1)
        .collect();
    fields.sort_by(|a, b| b.1.cmp(&a.1));

    match fields.as_slice() {
        [] => Ok(b','),
        [(first, n), (second, m), ..] if n == m => {
            Err(MalformedFileError::AmbiguousDelimiter(format!(
                "'{}' and '{}' both split the header into {n} columns",
                first.escape_ascii(),
                second.escape_ascii()
            )))
        }
        [(delim, _), ..] => Ok(*delim),
    }
}

/// Number of fields in one line, honoring quotes.
fn header_fields(line: &str, delimiter: u8) -> usize {
    csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(line.as_bytes())
        .records()
        .next()
        .and_then(|r| r.ok())
        .map_or(1, |r| r.len())
}
