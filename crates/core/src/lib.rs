//! `cdb-core` — domain types shared by the parser, engine, store and CLI.

pub mod actor;
pub mod model;
pub mod schema;

pub use actor::Actor;
pub use model::{BwRecord, C11Record, OrderNumber, Project, ProjectSource, SourceKind};
pub use schema::{BwColumns, C11Columns};
