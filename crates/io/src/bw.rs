// BW export: bookings and invoicing per order.

use cdb_core::{BwColumns, BwRecord, OrderNumber};

use crate::error::MalformedFileError;
use crate::records::{parse_rows, ParseOutput};
use crate::sheet::{self, RawSheet};

// Field positions in `BwColumns::headers()`
const ORDER_NUMBER: usize = 0;
const COST_CENTER: usize = 1;
const INVOICED_AMOUNT: usize = 2;
const HOURS_BOOKED: usize = 3;
const LAST_BOOKING_DATE: usize = 4;

/// Parse an uploaded BW file.
pub fn parse_bw(
    bytes: &[u8],
    file_name: &str,
    columns: &BwColumns,
) -> Result<ParseOutput<BwRecord>, MalformedFileError> {
    let sheet = sheet::read(bytes, file_name)?;
    parse_bw_sheet(&sheet, columns)
}

pub fn parse_bw_sheet(
    sheet: &RawSheet,
    columns: &BwColumns,
) -> Result<ParseOutput<BwRecord>, MalformedFileError> {
    let output = parse_rows(sheet, columns.headers(), |row| {
        Ok(BwRecord {
            row: row.number(),
            order_number: OrderNumber(row.order_number(ORDER_NUMBER)?),
            cost_center: row.text(COST_CENTER),
            invoiced_cents: row.cents(INVOICED_AMOUNT)?,
            hours_booked: row.decimal(HOURS_BOOKED)?,
            last_booking_date: row.date(LAST_BOOKING_DATE)?,
        })
    })?;

    log::debug!(
        "BW: {} records, {} row errors",
        output.records.len(),
        output.errors.len()
    );
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RowErrorReason;
    use chrono::NaiveDate;
    use rust_xlsxwriter::Workbook;

    fn bw_workbook(rows: &[(&str, &str, f64, &str)]) -> Vec<u8> {
        let mut workbook = Workbook::new();
        let ws = workbook.add_worksheet();
        for (col, header) in BwColumns::default().headers().iter().enumerate() {
            ws.write_string(0, col as u16, header.1).unwrap();
        }
        for (i, (order, cost_center, invoiced, date)) in rows.iter().enumerate() {
            let r = i as u32 + 1;
            ws.write_string(r, 0, *order).unwrap();
            ws.write_string(r, 1, *cost_center).unwrap();
            ws.write_number(r, 2, *invoiced).unwrap();
            ws.write_number(r, 3, 12.5).unwrap();
            ws.write_string(r, 4, *date).unwrap();
        }
        workbook.save_to_buffer().unwrap()
    }

    #[test]
    fn parses_xlsx_upload() {
        let bytes = bw_workbook(&[
            ("101", "CC-10", 5000.25, "2024-04-30"),
            ("102", "CC-20", 0.0, ""),
            ("x", "CC-30", 1.0, ""),
        ]);
        let out = parse_bw(&bytes, "bw.xlsx", &BwColumns::default()).unwrap();
        assert_eq!(out.data_rows(), 3);
        assert_eq!(out.records.len(), 2);

        let first = &out.records[0];
        assert_eq!(first.order_number, OrderNumber(101));
        assert_eq!(first.cost_center.as_deref(), Some("CC-10"));
        assert_eq!(first.invoiced_cents, Some(500_025));
        assert_eq!(first.hours_booked, Some(12.5));
        assert_eq!(first.last_booking_date, NaiveDate::from_ymd_opt(2024, 4, 30));
        assert_eq!(out.records[1].last_booking_date, None);

        assert_eq!(out.errors[0].row, 4);
        assert_eq!(out.errors[0].reason, RowErrorReason::InvalidOrderNumber);
    }

    #[test]
    fn duplicate_order_numbers_are_all_kept() {
        let csv = "Order Number,Cost Center,Invoiced Amount,Hours Booked,Last Booking Date\n7,A,1,,\n7,B,2,,\n";
        let out = parse_bw(csv.as_bytes(), "bw.csv", &BwColumns::default()).unwrap();
        assert_eq!(out.records.len(), 2);
        assert_eq!(out.records[0].cost_center.as_deref(), Some("A"));
        assert_eq!(out.records[1].cost_center.as_deref(), Some("B"));
    }

    #[test]
    fn non_numeric_hours_are_a_row_error() {
        let csv = "Order Number,Cost Center,Invoiced Amount,Hours Booked,Last Booking Date\n7,A,1,many,\n";
        let out = parse_bw(csv.as_bytes(), "bw.csv", &BwColumns::default()).unwrap();
        assert_eq!(
            out.errors[0].reason,
            RowErrorReason::InvalidNumber { column: "Hours Booked".into() }
        );
    }

    #[test]
    fn pdf_renamed_to_xlsx_is_malformed() {
        let err = parse_bw(b"%PDF-1.7\n%binary", "bw.xlsx", &BwColumns::default()).unwrap_err();
        assert!(err.is_wrong_file_type(), "{err:?}");
    }
}
