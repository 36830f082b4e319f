use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Business identity of a project across both source files and the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderNumber(pub i64);

impl OrderNumber {
    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl From<i64> for OrderNumber {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

/// Which of the two spreadsheet exports a record or failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    C11,
    Bw,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::C11 => write!(f, "C11"),
            Self::Bw => write!(f, "BW"),
        }
    }
}

// ---------------------------------------------------------------------------
// Typed source rows
// ---------------------------------------------------------------------------

/// One validated row of the C11 (order intake) export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct C11Record {
    /// 1-based sheet row the record was read from.
    pub row: usize,
    pub order_number: OrderNumber,
    pub customer: String,
    pub project_name: Option<String>,
    pub sales_manager: Option<String>,
    pub order_date: Option<NaiveDate>,
    pub order_value_cents: Option<i64>,
}

/// One validated row of the BW (booking / invoicing) export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BwRecord {
    /// 1-based sheet row the record was read from.
    pub row: usize,
    pub order_number: OrderNumber,
    pub cost_center: Option<String>,
    pub invoiced_cents: Option<i64>,
    pub hours_booked: Option<f64>,
    pub last_booking_date: Option<NaiveDate>,
}

// ---------------------------------------------------------------------------
// Project
// ---------------------------------------------------------------------------

/// Which sources contributed to a merged project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectSource {
    Both,
    C11Only,
    BwOnly,
}

impl ProjectSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Both => "both",
            Self::C11Only => "c11_only",
            Self::BwOnly => "bw_only",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "both" => Some(Self::Both),
            "c11_only" => Some(Self::C11Only),
            "bw_only" => Some(Self::BwOnly),
            _ => None,
        }
    }
}

impl fmt::Display for ProjectSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The reconciled entity kept in the store, keyed by `order_number`.
///
/// Fields from a side that had no matching record stay at their defaults:
/// `None` for optional values, zero for amounts and hours.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub order_number: OrderNumber,
    pub source: ProjectSource,
    pub customer: Option<String>,
    pub project_name: Option<String>,
    pub sales_manager: Option<String>,
    pub order_date: Option<NaiveDate>,
    pub order_value_cents: i64,
    pub cost_center: Option<String>,
    pub invoiced_cents: i64,
    pub hours_booked: f64,
    pub last_booking_date: Option<NaiveDate>,
}

impl Project {
    /// Order value not yet invoiced. Negative when over-invoiced.
    pub fn open_amount_cents(&self) -> i64 {
        self.order_value_cents.saturating_sub(self.invoiced_cents)
    }

    pub fn is_over_invoiced(&self) -> bool {
        self.invoiced_cents > self.order_value_cents
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project(order_value: i64, invoiced: i64) -> Project {
        Project {
            order_number: OrderNumber(1),
            source: ProjectSource::Both,
            customer: None,
            project_name: None,
            sales_manager: None,
            order_date: None,
            order_value_cents: order_value,
            cost_center: None,
            invoiced_cents: invoiced,
            hours_booked: 0.0,
            last_booking_date: None,
        }
    }

    #[test]
    fn open_amount_and_over_invoicing() {
        let p = project(10_000, 2_500);
        assert_eq!(p.open_amount_cents(), 7_500);
        assert!(!p.is_over_invoiced());

        let p = project(1_000, 1_200);
        assert_eq!(p.open_amount_cents(), -200);
        assert!(p.is_over_invoiced());
    }

    #[test]
    fn project_source_round_trips_through_str() {
        for source in [ProjectSource::Both, ProjectSource::C11Only, ProjectSource::BwOnly] {
            assert_eq!(ProjectSource::parse(source.as_str()), Some(source));
        }
        assert_eq!(ProjectSource::parse("neither"), None);
    }

    #[test]
    fn order_number_serializes_as_plain_integer() {
        let json = serde_json::to_string(&OrderNumber(101)).unwrap();
        assert_eq!(json, "101");
    }
}
