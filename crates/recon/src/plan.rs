use std::collections::BTreeSet;

use serde::Serialize;

use cdb_core::{OrderNumber, Project};

/// What a reconcile will do to the store, computed before touching it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcilePlan {
    /// Incoming order numbers the store does not have yet.
    pub inserted: Vec<OrderNumber>,
    /// Incoming order numbers already in the store.
    pub updated: Vec<OrderNumber>,
    /// Stored order numbers absent from the upload; these get deleted.
    pub stale: Vec<OrderNumber>,
}

impl ReconcilePlan {
    /// Order numbers present in the store once the plan is applied.
    pub fn surviving(&self) -> BTreeSet<OrderNumber> {
        self.inserted.iter().chain(self.updated.iter()).copied().collect()
    }
}

/// Outcome of a committed reconcile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeletionReport {
    pub deleted: Vec<OrderNumber>,
    pub inserted: Vec<OrderNumber>,
    pub updated: Vec<OrderNumber>,
}

impl From<ReconcilePlan> for DeletionReport {
    fn from(plan: ReconcilePlan) -> Self {
        Self {
            deleted: plan.stale,
            inserted: plan.inserted,
            updated: plan.updated,
        }
    }
}

/// Diff the store's order numbers against a freshly merged project set.
///
/// All three lists come back sorted ascending. Works on the typed projects
/// directly, never on a serialized form of them.
pub fn plan_reconcile(existing: &BTreeSet<OrderNumber>, incoming: &[Project]) -> ReconcilePlan {
    let incoming: BTreeSet<OrderNumber> = incoming.iter().map(|p| p.order_number).collect();

    let mut plan = ReconcilePlan::default();
    for order_number in &incoming {
        if existing.contains(order_number) {
            plan.updated.push(*order_number);
        } else {
            plan.inserted.push(*order_number);
        }
    }
    plan.stale = existing.difference(&incoming).copied().collect();
    plan
}
