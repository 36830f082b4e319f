use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::{params, Connection};

use cdb_core::{OrderNumber, Project, ProjectSource};
use cdb_recon::{plan_reconcile, DeletionReport};

use crate::error::StoreError;
use crate::Store;

const DATE_FORMAT: &str = "%Y-%m-%d";

const PROJECT_SELECT_SQL: &str = "SELECT
    order_number,
    source,
    customer,
    project_name,
    sales_manager,
    order_date,
    order_value_cents,
    cost_center,
    invoiced_cents,
    hours_booked,
    last_booking_date
FROM projects";

const PROJECT_UPSERT_SQL: &str = "INSERT INTO projects (
    order_number, source, customer, project_name, sales_manager, order_date,
    order_value_cents, cost_center, invoiced_cents, hours_booked, last_booking_date, updated_at
) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
ON CONFLICT(order_number) DO UPDATE SET
    source = excluded.source,
    customer = excluded.customer,
    project_name = excluded.project_name,
    sales_manager = excluded.sales_manager,
    order_date = excluded.order_date,
    order_value_cents = excluded.order_value_cents,
    cost_center = excluded.cost_center,
    invoiced_cents = excluded.invoiced_cents,
    hours_booked = excluded.hours_booked,
    last_booking_date = excluded.last_booking_date,
    updated_at = excluded.updated_at";

impl Store {
    pub fn order_numbers(&self) -> Result<BTreeSet<OrderNumber>, StoreError> {
        order_numbers(self.connection())
    }

    /// All stored projects, ascending by order number.
    pub fn list_projects(&self) -> Result<Vec<Project>, StoreError> {
        list(self.connection())
    }
}

pub(crate) fn order_numbers(conn: &Connection) -> Result<BTreeSet<OrderNumber>, StoreError> {
    let mut stmt = conn.prepare("SELECT order_number FROM projects")?;
    let numbers = stmt
        .query_map([], |row| row.get::<_, i64>(0))?
        .map(|n| n.map(OrderNumber))
        .collect::<Result<BTreeSet<_>, _>>()?;
    Ok(numbers)
}

pub(crate) fn list(conn: &Connection) -> Result<Vec<Project>, StoreError> {
    let mut stmt = conn.prepare(&format!("{PROJECT_SELECT_SQL} ORDER BY order_number"))?;
    let rows = stmt
        .query_map([], |row| {
            Ok(ProjectRow {
                order_number: row.get(0)?,
                source: row.get(1)?,
                customer: row.get(2)?,
                project_name: row.get(3)?,
                sales_manager: row.get(4)?,
                order_date: row.get(5)?,
                order_value_cents: row.get(6)?,
                cost_center: row.get(7)?,
                invoiced_cents: row.get(8)?,
                hours_booked: row.get(9)?,
                last_booking_date: row.get(10)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter().map(Project::try_from).collect()
}

/// Apply a reconcile plan inside the caller's transaction.
pub(crate) fn reconcile(
    conn: &Connection,
    projects: &[Project],
    now: DateTime<Utc>,
) -> Result<DeletionReport, StoreError> {
    let existing = order_numbers(conn)?;
    let plan = plan_reconcile(&existing, projects);
    let updated_at = now.to_rfc3339_opts(SecondsFormat::Micros, true);

    {
        let mut upsert = conn.prepare(PROJECT_UPSERT_SQL)?;
        for p in projects {
            upsert.execute(params![
                p.order_number.get(),
                p.source.as_str(),
                p.customer,
                p.project_name,
                p.sales_manager,
                p.order_date.map(|d| d.format(DATE_FORMAT).to_string()),
                p.order_value_cents,
                p.cost_center,
                p.invoiced_cents,
                p.hours_booked,
                p.last_booking_date.map(|d| d.format(DATE_FORMAT).to_string()),
                updated_at,
            ])?;
        }
    }

    if !plan.stale.is_empty() {
        let listed: Vec<String> = plan.stale.iter().map(|n| n.to_string()).collect();
        log::info!(
            "deleting {} projects not present in the new upload: [{}]",
            plan.stale.len(),
            listed.join(", ")
        );
        let mut delete = conn.prepare("DELETE FROM projects WHERE order_number = ?1")?;
        for order_number in &plan.stale {
            delete.execute(params![order_number.get()])?;
        }
    }

    log::debug!(
        "reconcile: {} inserted, {} updated, {} deleted",
        plan.inserted.len(),
        plan.updated.len(),
        plan.stale.len()
    );
    Ok(DeletionReport::from(plan))
}

struct ProjectRow {
    order_number: i64,
    source: String,
    customer: Option<String>,
    project_name: Option<String>,
    sales_manager: Option<String>,
    order_date: Option<String>,
    order_value_cents: i64,
    cost_center: Option<String>,
    invoiced_cents: i64,
    hours_booked: f64,
    last_booking_date: Option<String>,
}

fn parse_date(order_number: i64, value: Option<String>) -> Result<Option<NaiveDate>, StoreError> {
    value
        .map(|s| {
            NaiveDate::parse_from_str(&s, DATE_FORMAT).map_err(|_| {
                StoreError::Corrupt(format!("project {order_number}: bad date '{s}'"))
            })
        })
        .transpose()
}

impl TryFrom<ProjectRow> for Project {
    type Error = StoreError;

    fn try_from(row: ProjectRow) -> Result<Self, Self::Error> {
        let source = ProjectSource::parse(&row.source).ok_or_else(|| {
            StoreError::Corrupt(format!(
                "project {}: unknown source '{}'",
                row.order_number, row.source
            ))
        })?;

        Ok(Project {
            order_number: OrderNumber(row.order_number),
            source,
            customer: row.customer,
            project_name: row.project_name,
            sales_manager: row.sales_manager,
            order_date: parse_date(row.order_number, row.order_date)?,
            order_value_cents: row.order_value_cents,
            cost_center: row.cost_center,
            invoiced_cents: row.invoiced_cents,
            hours_booked: row.hours_booked,
            last_booking_date: parse_date(row.order_number, row.last_booking_date)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project(order: i64, customer: &str) -> Project {
        Project {
            order_number: OrderNumber(order),
            source: ProjectSource::Both,
            customer: Some(customer.into()),
            project_name: None,
            sales_manager: Some("Mara".into()),
            order_date: NaiveDate::from_ymd_opt(2024, 3, 1),
            order_value_cents: 10_000,
            cost_center: Some("CC-1".into()),
            invoiced_cents: 2_500,
            hours_booked: 7.25,
            last_booking_date: None,
        }
    }

    /// Reconcile and commit on its own, as an upload does without the audit row.
    fn apply(store: &mut Store, projects: &[Project]) -> Result<DeletionReport, StoreError> {
        let tx = store.begin()?;
        let report = tx.reconcile(projects)?;
        tx.commit()?;
        Ok(report)
    }

    fn numbers(store: &Store) -> Vec<i64> {
        store.order_numbers().unwrap().into_iter().map(|n| n.get()).collect()
    }

    #[test]
    fn projects_round_trip_through_the_table() {
        let mut store = Store::open_in_memory().unwrap();
        let p = project(101, "Acme");
        apply(&mut store, std::slice::from_ref(&p)).unwrap();
        assert_eq!(store.list_projects().unwrap(), vec![p]);
    }

    #[test]
    fn reconcile_upserts_and_deletes_stale() {
        let mut store = Store::open_in_memory().unwrap();
        apply(&mut store, &[project(101, "Acme"), project(102, "Globex"), project(103, "Initech")])
            .unwrap();

        let report =
            apply(&mut store, &[project(101, "Acme Renamed"), project(104, "Umbrella")]).unwrap();

        assert_eq!(numbers(&store), vec![101, 104]);
        assert_eq!(report.deleted, vec![OrderNumber(102), OrderNumber(103)]);
        assert_eq!(report.inserted, vec![OrderNumber(104)]);
        assert_eq!(report.updated, vec![OrderNumber(101)]);

        let stored = store.list_projects().unwrap();
        assert_eq!(stored[0].customer.as_deref(), Some("Acme Renamed"));
    }

    #[test]
    fn failed_delete_rolls_back_the_whole_reconcile() {
        let mut store = Store::open_in_memory().unwrap();
        apply(&mut store, &[project(101, "Acme"), project(102, "Globex"), project(103, "Initech")])
            .unwrap();
        store
            .connection()
            .execute_batch(
                "CREATE TRIGGER keep_103 BEFORE DELETE ON projects WHEN old.order_number = 103
                 BEGIN SELECT RAISE(ABORT, 'locked'); END;",
            )
            .unwrap();

        let err = apply(&mut store, &[project(101, "Changed"), project(104, "Umbrella")]);
        assert!(matches!(err, Err(StoreError::Sqlite(_))));

        assert_eq!(numbers(&store), vec![101, 102, 103]);
        assert_eq!(store.list_projects().unwrap()[0].customer.as_deref(), Some("Acme"));
    }

    #[test]
    fn corrupt_source_is_reported() {
        let store = Store::open_in_memory().unwrap();
        store
            .connection()
            .execute(
                "INSERT INTO projects (order_number, source, updated_at) VALUES (1, 'sideways', 'x')",
                [],
            )
            .unwrap();
        assert!(matches!(store.list_projects(), Err(StoreError::Corrupt(_))));
    }
}
