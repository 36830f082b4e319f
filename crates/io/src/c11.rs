// C11 export: order intake, one row per customer order.

use cdb_core::{C11Columns, C11Record, OrderNumber};

use crate::error::MalformedFileError;
use crate::records::{parse_rows, ParseOutput};
use crate::sheet::{self, RawSheet};

// Field positions in `C11Columns::headers()`
const ORDER_NUMBER: usize = 0;
const CUSTOMER: usize = 1;
const PROJECT_NAME: usize = 2;
const SALES_MANAGER: usize = 3;
const ORDER_DATE: usize = 4;
const ORDER_VALUE: usize = 5;

/// Parse an uploaded C11 file.
pub fn parse_c11(
    bytes: &[u8],
    file_name: &str,
    columns: &C11Columns,
) -> Result<ParseOutput<C11Record>, MalformedFileError> {
    let sheet = sheet::read(bytes, file_name)?;
    parse_c11_sheet(&sheet, columns)
}

pub fn parse_c11_sheet(
    sheet: &RawSheet,
    columns: &C11Columns,
) -> Result<ParseOutput<C11Record>, MalformedFileError> {
    let output = parse_rows(sheet, columns.headers(), |row| {
        Ok(C11Record {
            row: row.number(),
            order_number: OrderNumber(row.order_number(ORDER_NUMBER)?),
            customer: row.required_text(CUSTOMER)?,
            project_name: row.text(PROJECT_NAME),
            sales_manager: row.text(SALES_MANAGER),
            order_date: row.date(ORDER_DATE)?,
            order_value_cents: row.cents(ORDER_VALUE)?,
        })
    })?;

    log::debug!(
        "C11: {} records, {} row errors",
        output.records.len(),
        output.errors.len()
    );
    Ok(output)
}
