//! `cdb-recon` — project merge and store reconciliation engine.
//!
//! Pure engine crate: receives typed records, returns merged projects,
//! statistics and reconcile plans. No IO.

pub mod architect;
pub mod cadence;
pub mod plan;
pub mod stats;

pub use architect::{build_objects, Architecture};
pub use cadence::{days_to_next_upload, UploadPolicy};
pub use plan::{plan_reconcile, DeletionReport, ReconcilePlan};
pub use stats::Statistics;
