//! `cdb-io` — Record Parser.
//!
//! Turns one uploaded spreadsheet blob into typed records plus per-row errors.
//! Whole-file problems (wrong container, missing columns) are a
//! [`MalformedFileError`]; bad rows never abort the parse.

pub mod bw;
pub mod c11;
pub mod cell;
pub mod error;
pub mod records;
pub mod sheet;

pub use bw::parse_bw;
pub use c11::parse_c11;
pub use error::{MalformedFileError, RowError, RowErrorReason};
pub use records::ParseOutput;
pub use sheet::{RawCell, RawRow, RawSheet};
