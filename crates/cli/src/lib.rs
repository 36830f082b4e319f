//! `cdb-cli` — upload pipeline and command-line surface for the project database.

pub mod error;
pub mod exit_codes;
pub mod logging;
pub mod upload;

pub use error::UploadError;
pub use upload::{
    content_digest, run_upload, run_upload_with, RecordParser, SpreadsheetParser, UploadFailure,
    UploadFile, UploadSuccess,
};
