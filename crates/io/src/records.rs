// Header binding and the per-row loop shared by the C11 and BW parsers.

use chrono::NaiveDate;
use serde::Serialize;

use crate::cell::{self, InvalidCell};
use crate::error::{MalformedFileError, RowError, RowErrorReason};
use crate::sheet::{RawRow, RawSheet};

/// Typed records and per-row errors from one file.
///
/// Every non-blank data row lands in exactly one of the two lists, in sheet order.
#[derive(Debug, Clone, Serialize)]
pub struct ParseOutput<T> {
    pub records: Vec<T>,
    pub errors: Vec<RowError>,
}

impl<T> ParseOutput<T> {
    pub fn data_rows(&self) -> usize {
        self.records.len() + self.errors.len()
    }
}

/// A data row with its configured columns resolved to sheet positions.
pub struct BoundRow<'a, const N: usize> {
    row: &'a RawRow,
    columns: &'a [usize; N],
    headers: &'a [(&'static str, &'a str); N],
}

impl<'a, const N: usize> BoundRow<'a, N> {
    pub fn number(&self) -> usize {
        self.row.number
    }

    fn cell(&self, field: usize) -> &crate::sheet::RawCell {
        self.row.cell(self.columns[field])
    }

    fn column(&self, field: usize) -> String {
        self.headers[field].1.trim().to_string()
    }

    pub fn order_number(&self, field: usize) -> Result<i64, RowErrorReason> {
        match cell::integer(self.cell(field)) {
            Ok(Some(n)) => Ok(n),
            Ok(None) => Err(RowErrorReason::MissingOrderNumber),
            Err(InvalidCell) => Err(RowErrorReason::InvalidOrderNumber),
        }
    }

    pub fn text(&self, field: usize) -> Option<String> {
        cell::text(self.cell(field))
    }

    pub fn required_text(&self, field: usize) -> Result<String, RowErrorReason> {
        self.text(field)
            .ok_or_else(|| RowErrorReason::MissingField { column: self.column(field) })
    }

    pub fn cents(&self, field: usize) -> Result<Option<i64>, RowErrorReason> {
        cell::cents(self.cell(field))
            .map_err(|_| RowErrorReason::InvalidAmount { column: self.column(field) })
    }

    pub fn decimal(&self, field: usize) -> Result<Option<f64>, RowErrorReason> {
        cell::decimal(self.cell(field))
            .map_err(|_| RowErrorReason::InvalidNumber { column: self.column(field) })
    }

    pub fn date(&self, field: usize) -> Result<Option<NaiveDate>, RowErrorReason> {
        cell::date(self.cell(field))
            .map_err(|_| RowErrorReason::InvalidDate { column: self.column(field) })
    }
}

/// Locate every configured header in the first non-blank row.
fn bind_header<const N: usize>(
    header: &RawRow,
    headers: &[(&'static str, &str); N],
) -> Result<[usize; N], MalformedFileError> {
    let names: Vec<String> = header
        .cells
        .iter()
        .map(|c| c.to_string().trim().to_lowercase())
        .collect();

    let mut columns = [0usize; N];
    for (slot, (_, wanted)) in columns.iter_mut().zip(headers.iter()) {
        let wanted_norm = wanted.trim().to_lowercase();
        *slot = names.iter().position(|n| *n == wanted_norm).ok_or_else(|| {
            MalformedFileError::MissingColumn {
                column: wanted.trim().to_string(),
            }
        })?;
    }
    Ok(columns)
}

/// Bind the header, then build one record per data row. A row whose builder
/// fails becomes a [`RowError`] and parsing continues with the next row.
pub fn parse_rows<T, const N: usize>(
    sheet: &RawSheet,
    headers: [(&'static str, &str); N],
    build: impl Fn(&BoundRow<'_, N>) -> Result<T, RowErrorReason>,
) -> Result<ParseOutput<T>, MalformedFileError> {
    let (header, data) = sheet.rows.split_first().ok_or(MalformedFileError::EmptyFile)?;
    let columns = bind_header(header, &headers)?;

    let mut output = ParseOutput {
        records: Vec::with_capacity(data.len()),
        errors: Vec::new(),
    };

    for row in data.iter().filter(|r| !r.is_blank()) {
        let bound = BoundRow {
            row,
            columns: &columns,
            headers: &headers,
        };
        match build(&bound) {
            Ok(record) => output.records.push(record),
            Err(reason) => output.errors.push(RowError {
                row: row.number,
                reason,
                values: row.values(),
            }),
        }
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheet::read;

    const HEADERS: [(&str, &str); 2] = [("order_number", "Order Number"), ("amount", "Amount")];

    fn parse(csv: &str) -> Result<ParseOutput<(i64, Option<i64>)>, MalformedFileError> {
        let sheet = read(csv.as_bytes(), "t.csv")?;
        parse_rows(&sheet, HEADERS, |row| Ok((row.order_number(0)?, row.cents(1)?)))
    }

    #[test]
    fn header_match_is_case_insensitive_and_order_free() {
        let out = parse("extra, AMOUNT ,order number\nx,1.50,7\n").unwrap();
        assert_eq!(out.records, vec![(7, Some(150))]);
    }

    #[test]
    fn missing_column_is_malformed() {
        let err = parse("Order Number,Total\n1,2\n").unwrap_err();
        assert_eq!(err, MalformedFileError::MissingColumn { column: "Amount".into() });
    }

    #[test]
    fn bad_rows_are_collected_not_fatal() {
        let out = parse("Order Number,Amount\n1,10\n,5\nabc,5\n4,lots\n5,\n").unwrap();
        assert_eq!(out.records, vec![(1, Some(1000)), (5, None)]);
        assert_eq!(out.data_rows(), 5);

        let reasons: Vec<_> = out.errors.iter().map(|e| (e.row, e.reason.clone())).collect();
        assert_eq!(
            reasons,
            vec![
                (3, RowErrorReason::MissingOrderNumber),
                (4, RowErrorReason::InvalidOrderNumber),
                (5, RowErrorReason::InvalidAmount { column: "Amount".into() }),
            ]
        );
        assert_eq!(out.errors[2].values, vec!["4", "lots"]);
    }

    #[test]
    fn header_only_file_has_no_data_rows() {
        let out = parse("Order Number,Amount\n").unwrap();
        assert_eq!(out.data_rows(), 0);
    }
}
