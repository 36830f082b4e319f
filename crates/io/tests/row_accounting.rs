//! Every data row of a well-formed file becomes either a record or a row error.

use cdb_core::{BwColumns, C11Columns};
use cdb_io::{parse_bw, parse_c11, RowErrorReason};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Row {
    Valid(i64),
    MissingOrder,
    BadOrder(String),
    BadAmount(i64),
}

fn row_strategy() -> impl Strategy<Value = Row> {
    prop_oneof![
        4 => (1i64..100_000).prop_map(Row::Valid),
        1 => Just(Row::MissingOrder),
        1 => "[A-Z]{1,3}-[0-9]{1,4}".prop_map(Row::BadOrder),
        1 => (1i64..100_000).prop_map(Row::BadAmount),
    ]
}

fn c11_csv(rows: &[Row]) -> String {
    let mut out = String::from("Order Number,Customer,Project Name,Sales Manager,Order Date,Order Value\n");
    for row in rows {
        let line = match row {
            Row::Valid(n) => format!("{n},Acme,P{n},Mara,2024-01-01,{n}.50"),
            Row::MissingOrder => ",Acme,,,,".to_string(),
            Row::BadOrder(s) => format!("{s},Acme,,,,"),
            Row::BadAmount(n) => format!("{n},Acme,,,,n/a"),
        };
        out.push_str(&line);
        out.push('\n');
    }
    out
}

fn is_valid(row: &Row) -> bool {
    matches!(row, Row::Valid(_))
}

proptest! {
    #[test]
    fn c11_records_plus_errors_equal_data_rows(rows in prop::collection::vec(row_strategy(), 0..60)) {
        let csv = c11_csv(&rows);
        let out = parse_c11(csv.as_bytes(), "c11.csv", &C11Columns::default()).unwrap();

        let valid = rows.iter().filter(|r| is_valid(r)).count();
        prop_assert_eq!(out.records.len(), valid);
        prop_assert_eq!(out.errors.len(), rows.len() - valid);
        prop_assert_eq!(out.data_rows(), rows.len());

        // Sheet order is preserved on both sides
        let record_rows: Vec<usize> = out.records.iter().map(|r| r.row).collect();
        let mut sorted = record_rows.clone();
        sorted.sort_unstable();
        prop_assert_eq!(record_rows, sorted);
    }
}

#[test]
fn bw_counts_with_mixed_rows() {
    let csv = "\
Order Number;Cost Center;Invoiced Amount;Hours Booked;Last Booking Date
101;CC1;10.00;1.5;2024-02-01
;CC1;10.00;1.5;2024-02-01
102;CC2;;;
103;CC3;ten;;
";
    let out = parse_bw(csv.as_bytes(), "bw.csv", &BwColumns::default()).unwrap();
    assert_eq!(out.records.len(), 2);
    assert_eq!(out.errors.len(), 2);
    assert_eq!(out.data_rows(), 4);
    assert_eq!(out.errors[0].reason, RowErrorReason::MissingOrderNumber);
    assert_eq!(
        out.errors[1].reason,
        RowErrorReason::InvalidAmount { column: "Invoiced Amount".into() }
    );
}
