use std::collections::BTreeMap;

use serde::Serialize;

use cdb_core::{Project, ProjectSource};

const UNASSIGNED_MANAGER: &str = "(unassigned)";

/// Reviewer-facing summary of one successful merge. Not persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statistics {
    pub c11_records: usize,
    pub bw_records: usize,
    /// Rows dropped because a later row carried the same order number.
    pub c11_duplicates: usize,
    pub bw_duplicates: usize,
    pub projects: usize,
    pub matched: usize,
    pub c11_only: usize,
    pub bw_only: usize,
    pub total_order_value_cents: i64,
    pub total_invoiced_cents: i64,
    pub total_open_cents: i64,
    pub total_hours_booked: f64,
    pub over_invoiced: usize,
    pub by_sales_manager: BTreeMap<String, ManagerSummary>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ManagerSummary {
    pub projects: usize,
    pub order_value_cents: i64,
}

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct SourceCounts {
    pub c11_records: usize,
    pub bw_records: usize,
    pub c11_duplicates: usize,
    pub bw_duplicates: usize,
}

/// Compute summary statistics from merged projects.
pub(crate) fn compute_statistics(projects: &[Project], counts: SourceCounts) -> Statistics {
    let mut stats = Statistics {
        c11_records: counts.c11_records,
        bw_records: counts.bw_records,
        c11_duplicates: counts.c11_duplicates,
        bw_duplicates: counts.bw_duplicates,
        projects: projects.len(),
        matched: 0,
        c11_only: 0,
        bw_only: 0,
        total_order_value_cents: 0,
        total_invoiced_cents: 0,
        total_open_cents: 0,
        total_hours_booked: 0.0,
        over_invoiced: 0,
        by_sales_manager: BTreeMap::new(),
    };

    for p in projects {
        match p.source {
            ProjectSource::Both => stats.matched += 1,
            ProjectSource::C11Only => stats.c11_only += 1,
            ProjectSource::BwOnly => stats.bw_only += 1,
        }

        // Money totals saturate instead of overflowing on absurd amounts
        stats.total_order_value_cents = stats.total_order_value_cents.saturating_add(p.order_value_cents);
        stats.total_invoiced_cents = stats.total_invoiced_cents.saturating_add(p.invoiced_cents);
        stats.total_open_cents = stats.total_open_cents.saturating_add(p.open_amount_cents());
        stats.total_hours_booked += p.hours_booked;
        if p.is_over_invoiced() {
            stats.over_invoiced += 1;
        }

        let manager = p.sales_manager.as_deref().unwrap_or(UNASSIGNED_MANAGER);
        let entry = stats.by_sales_manager.entry(manager.to_string()).or_default();
        entry.projects += 1;
        entry.order_value_cents = entry.order_value_cents.saturating_add(p.order_value_cents);
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdb_core::OrderNumber;

    fn project(order: i64, source: ProjectSource, manager: Option<&str>, value: i64, invoiced: i64) -> Project {
        Project {
            order_number: OrderNumber(order),
            source,
            customer: None,
            project_name: None,
            sales_manager: manager.map(Into::into),
            order_date: None,
            order_value_cents: value,
            cost_center: None,
            invoiced_cents: invoiced,
            hours_booked: 1.5,
            last_booking_date: None,
        }
    }

    #[test]
    fn summary_counts_and_totals() {
        let projects = vec![
            project(1, ProjectSource::Both, Some("Mara"), 10_000, 4_000),
            project(2, ProjectSource::Both, Some("Jon"), 1_000, 1_500),
            project(3, ProjectSource::C11Only, Some("Mara"), 2_000, 0),
            project(4, ProjectSource::BwOnly, None, 0, 300),
        ];
        let stats = compute_statistics(&projects, SourceCounts::default());

        assert_eq!(stats.projects, 4);
        assert_eq!((stats.matched, stats.c11_only, stats.bw_only), (2, 1, 1));
        assert_eq!(stats.total_order_value_cents, 13_000);
        assert_eq!(stats.total_invoiced_cents, 5_800);
        assert_eq!(stats.total_open_cents, 7_200);
        assert_eq!(stats.total_hours_booked, 6.0);
        assert_eq!(stats.over_invoiced, 2);

        let mara = &stats.by_sales_manager["Mara"];
        assert_eq!((mara.projects, mara.order_value_cents), (2, 12_000));
        assert_eq!(stats.by_sales_manager[UNASSIGNED_MANAGER].projects, 1);
        let keys: Vec<&str> = stats.by_sales_manager.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["(unassigned)", "Jon", "Mara"]);
    }

    #[test]
    fn huge_amounts_saturate_instead_of_overflowing() {
        let value = 89_000_000_000_000_000;
        let projects: Vec<Project> = (0..1_100)
            .map(|n| project(n, ProjectSource::C11Only, Some("Mara"), value, -value))
            .collect();
        let stats = compute_statistics(&projects, SourceCounts::default());

        assert_eq!(stats.projects, 1_100);
        assert_eq!(stats.total_order_value_cents, i64::MAX);
        assert_eq!(stats.total_invoiced_cents, i64::MIN);
        assert_eq!(stats.total_open_cents, i64::MAX);
        assert_eq!(stats.by_sales_manager["Mara"].order_value_cents, i64::MAX);
    }
}
