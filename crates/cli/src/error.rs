use cdb_core::SourceKind;
use cdb_io::MalformedFileError;
use cdb_store::StoreError;

/// Why an upload did not reach the store.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("upload not possible for another {days_remaining} day(s)")]
    CadenceViolation { days_remaining: i64 },

    #[error("user {actor} is not allowed to upload")]
    PermissionDenied { actor: String },

    #[error("{file} file: {error}")]
    MalformedFile {
        file: SourceKind,
        #[source]
        error: MalformedFileError,
    },

    /// Reconcile or commit failed; nothing was applied.
    #[error("project store: {0}")]
    Store(#[source] StoreError),

    /// The attempt could not be recorded in the audit log.
    #[error("audit log: {0}")]
    Audit(#[source] StoreError),

    /// A pipeline stage panicked.
    #[error("upload aborted: {0}")]
    Aborted(String),
}

impl UploadError {
    /// Message shown to the person who uploaded.
    pub fn warning(&self) -> String {
        match self {
            Self::CadenceViolation { days_remaining } => format!(
                "A file upload is not possible at this time. \
                 Next upload will be possible after {days_remaining} day/s"
            ),
            Self::PermissionDenied { .. } => "User not allowed to perform this action".into(),
            Self::MalformedFile { error, .. } if error.is_wrong_file_type() => {
                "One of the files was not an Excel file. \
                 Please make sure files are correctly selected and composed."
                    .into()
            }
            Self::MalformedFile { .. } => "One of the files was not correctly uploaded. \
                 Please make sure files are correctly selected and composed."
                .into(),
            Self::Store(_) | Self::Audit(_) | Self::Aborted(_) => {
                format!("There was an error while uploading files: {self}")
            }
        }
    }
}
