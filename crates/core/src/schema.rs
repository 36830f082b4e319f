// Column schemas for the two source exports.
// Header names are matched case-insensitively after trimming.

use serde::{Deserialize, Serialize};

/// Header names of the C11 export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct C11Columns {
    pub order_number: String,
    pub customer: String,
    pub project_name: String,
    pub sales_manager: String,
    pub order_date: String,
    pub order_value: String,
}

impl Default for C11Columns {
    fn default() -> Self {
        Self {
            order_number: "Order Number".into(),
            customer: "Customer".into(),
            project_name: "Project Name".into(),
            sales_manager: "Sales Manager".into(),
            order_date: "Order Date".into(),
            order_value: "Order Value".into(),
        }
    }
}

impl C11Columns {
    /// `(field, header)` pairs in a fixed order.
    pub fn headers(&self) -> [(&'static str, &str); 6] {
        [
            ("order_number", &self.order_number),
            ("customer", &self.customer),
            ("project_name", &self.project_name),
            ("sales_manager", &self.sales_manager),
            ("order_date", &self.order_date),
            ("order_value", &self.order_value),
        ]
    }
}

/// Header names of the BW export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BwColumns {
    pub order_number: String,
    pub cost_center: String,
    pub invoiced_amount: String,
    pub hours_booked: String,
    pub last_booking_date: String,
}

impl Default for BwColumns {
    fn default() -> Self {
        Self {
            order_number: "Order Number".into(),
            cost_center: "Cost Center".into(),
            invoiced_amount: "Invoiced Amount".into(),
            hours_booked: "Hours Booked".into(),
            last_booking_date: "Last Booking Date".into(),
        }
    }
}

impl BwColumns {
    /// `(field, header)` pairs in a fixed order.
    pub fn headers(&self) -> [(&'static str, &str); 5] {
        [
            ("order_number", &self.order_number),
            ("cost_center", &self.cost_center),
            ("invoiced_amount", &self.invoiced_amount),
            ("hours_booked", &self.hours_booked),
            ("last_booking_date", &self.last_booking_date),
        ]
    }
}

/// Returns a description of the first problem in a header list, if any:
/// an empty header, or two fields mapped to the same header.
pub fn header_problem(headers: &[(&'static str, &str)]) -> Option<String> {
    for (i, (field, header)) in headers.iter().enumerate() {
        let normalized = header.trim().to_lowercase();
        if normalized.is_empty() {
            return Some(format!("column '{field}' has an empty header"));
        }
        if let Some((other, _)) = headers[..i]
            .iter()
            .find(|(_, h)| h.trim().to_lowercase() == normalized)
        {
            return Some(format!("columns '{other}' and '{field}' share header '{header}'"));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_consistent() {
        assert_eq!(header_problem(&C11Columns::default().headers()), None);
        assert_eq!(header_problem(&BwColumns::default().headers()), None);
    }

    #[test]
    fn duplicate_headers_are_reported() {
        let columns = BwColumns {
            cost_center: "order number".into(),
            ..BwColumns::default()
        };
        let problem = header_problem(&columns.headers()).unwrap();
        assert!(problem.contains("order_number"), "{problem}");
        assert!(problem.contains("cost_center"), "{problem}");
    }

    #[test]
    fn empty_header_is_reported() {
        let columns = C11Columns {
            customer: "  ".into(),
            ..C11Columns::default()
        };
        assert!(header_problem(&columns.headers()).unwrap().contains("customer"));
    }
}
