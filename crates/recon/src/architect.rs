use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use cdb_core::{BwRecord, C11Record, OrderNumber, Project, ProjectSource};

use crate::stats::{compute_statistics, SourceCounts, Statistics};

/// Merged projects (ascending order number) plus their statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Architecture {
    pub projects: Vec<Project>,
    pub statistics: Statistics,
}

/// Index records by order number. Later rows replace earlier ones with the
/// same order number; returns the index and the number of replaced rows.
fn index_last_wins<'a, T>(
    records: &'a [T],
    key: impl Fn(&T) -> OrderNumber,
) -> (BTreeMap<OrderNumber, &'a T>, usize) {
    let mut index = BTreeMap::new();
    let mut duplicates = 0;
    for record in records {
        if index.insert(key(record), record).is_some() {
            duplicates += 1;
        }
    }
    (index, duplicates)
}

/// Merge C11 and BW records into one project per distinct order number.
///
/// Deterministic: identical inputs (same content, same order) always give
/// identical output, since every map involved is ordered.
pub fn build_objects(c11: &[C11Record], bw: &[BwRecord]) -> Architecture {
    let (c11_index, c11_duplicates) = index_last_wins(c11, |r| r.order_number);
    let (bw_index, bw_duplicates) = index_last_wins(bw, |r| r.order_number);

    let order_numbers: BTreeSet<OrderNumber> =
        c11_index.keys().chain(bw_index.keys()).copied().collect();

    let projects: Vec<Project> = order_numbers
        .into_iter()
        .map(|order_number| {
            merge(
                order_number,
                c11_index.get(&order_number).copied(),
                bw_index.get(&order_number).copied(),
            )
        })
        .collect();

    if c11_duplicates + bw_duplicates > 0 {
        log::warn!(
            "duplicate order numbers resolved last-row-wins: {} in C11, {} in BW",
            c11_duplicates,
            bw_duplicates
        );
    }

    let statistics = compute_statistics(
        &projects,
        SourceCounts {
            c11_records: c11.len(),
            bw_records: bw.len(),
            c11_duplicates,
            bw_duplicates,
        },
    );

    Architecture { projects, statistics }
}

fn merge(order_number: OrderNumber, c11: Option<&C11Record>, bw: Option<&BwRecord>) -> Project {
    let source = match (c11.is_some(), bw.is_some()) {
        (true, true) => ProjectSource::Both,
        (true, false) => ProjectSource::C11Only,
        _ => ProjectSource::BwOnly,
    };

    Project {
        order_number,
        source,
        customer: c11.map(|r| r.customer.clone()),
        project_name: c11.and_then(|r| r.project_name.clone()),
        sales_manager: c11.and_then(|r| r.sales_manager.clone()),
        order_date: c11.and_then(|r| r.order_date),
        order_value_cents: c11.and_then(|r| r.order_value_cents).unwrap_or(0),
        cost_center: bw.and_then(|r| r.cost_center.clone()),
        invoiced_cents: bw.and_then(|r| r.invoiced_cents).unwrap_or(0),
        hours_booked: bw.and_then(|r| r.hours_booked).unwrap_or(0.0),
        last_booking_date: bw.and_then(|r| r.last_booking_date),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn c11(row: usize, order: i64, customer: &str, value: i64) -> C11Record {
        C11Record {
            row,
            order_number: OrderNumber(order),
            customer: customer.into(),
            project_name: Some(format!("Project {order}")),
            sales_manager: Some("Mara".into()),
            order_date: NaiveDate::from_ymd_opt(2024, 1, 15),
            order_value_cents: Some(value),
        }
    }

    fn bw(row: usize, order: i64, invoiced: i64, hours: f64) -> BwRecord {
        BwRecord {
            row,
            order_number: OrderNumber(order),
            cost_center: Some("CC-1".into()),
            invoiced_cents: Some(invoiced),
            hours_booked: Some(hours),
            last_booking_date: NaiveDate::from_ymd_opt(2024, 2, 1),
        }
    }

    #[test]
    fn merges_by_order_number() {
        let out = build_objects(
            &[c11(2, 101, "Acme", 10_000), c11(3, 102, "Globex", 5_000)],
            &[bw(2, 102, 2_000, 4.0), bw(3, 103, 700, 1.5)],
        );

        let numbers: Vec<i64> = out.projects.iter().map(|p| p.order_number.get()).collect();
        assert_eq!(numbers, vec![101, 102, 103]);

        let p101 = &out.projects[0];
        assert_eq!(p101.source, ProjectSource::C11Only);
        assert_eq!(p101.invoiced_cents, 0);
        assert_eq!(p101.cost_center, None);
        assert_eq!(p101.hours_booked, 0.0);

        let p102 = &out.projects[1];
        assert_eq!(p102.source, ProjectSource::Both);
        assert_eq!(p102.customer.as_deref(), Some("Globex"));
        assert_eq!(p102.invoiced_cents, 2_000);
        assert_eq!(p102.open_amount_cents(), 3_000);

        let p103 = &out.projects[2];
        assert_eq!(p103.source, ProjectSource::BwOnly);
        assert_eq!(p103.customer, None);
        assert_eq!(p103.order_value_cents, 0);

        let s = &out.statistics;
        assert_eq!((s.projects, s.matched, s.c11_only, s.bw_only), (3, 1, 1, 1));
    }

    #[test]
    fn duplicate_order_numbers_last_row_wins() {
        let out = build_objects(
            &[c11(2, 101, "First", 100), c11(5, 101, "Second", 200)],
            &[bw(2, 101, 10, 1.0), bw(3, 101, 20, 2.0), bw(4, 101, 30, 3.0)],
        );

        assert_eq!(out.projects.len(), 1);
        let p = &out.projects[0];
        assert_eq!(p.customer.as_deref(), Some("Second"));
        assert_eq!(p.order_value_cents, 200);
        assert_eq!(p.invoiced_cents, 30);
        assert_eq!(p.hours_booked, 3.0);
        assert_eq!(out.statistics.c11_duplicates, 1);
        assert_eq!(out.statistics.bw_duplicates, 2);
        assert_eq!(out.statistics.c11_records, 2);
        assert_eq!(out.statistics.bw_records, 3);
    }

    #[test]
    fn empty_inputs_give_empty_output() {
        let out = build_objects(&[], &[]);
        assert!(out.projects.is_empty());
        assert_eq!(out.statistics.projects, 0);
        assert_eq!(out.statistics.total_hours_booked, 0.0);
    }

    #[test]
    fn identical_inputs_serialize_identically() {
        let c = vec![c11(2, 9, "A", 1), c11(3, 4, "B", 2), c11(4, 9, "C", 3)];
        let b = vec![bw(2, 4, 5, 0.25), bw(3, 17, 6, 0.5)];
        let first = serde_json::to_string(&build_objects(&c, &b)).unwrap();
        let second = serde_json::to_string(&build_objects(&c, &b)).unwrap();
        assert_eq!(first, second);
    }
}
