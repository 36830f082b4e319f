//! CLI Exit Code Registry
//!
//! Single source of truth for `cdb` exit codes. Scripts that drive the
//! weekly upload rely on them.
//!
//! | Code | Meaning                                              |
//! |------|------------------------------------------------------|
//! | 0    | Success                                              |
//! | 1    | General error (unspecified, aborted upload)          |
//! | 2    | Usage error (bad args, unreadable input, bad config) |
//! | 3    | Upload refused: cooldown still running               |
//! | 4    | Upload refused: actor not permitted                  |
//! | 5    | A source file is not a usable C11/BW export          |
//! | 6    | Project store failure (nothing was applied)          |
//! | 7    | Audit record could not be written                    |

use crate::error::UploadError;

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing input file, invalid settings.
pub const EXIT_USAGE: u8 = 2;

/// Cooldown not yet expired for a non-privileged actor.
pub const EXIT_CADENCE: u8 = 3;

/// Actor is neither superuser nor in an allowed group.
pub const EXIT_PERMISSION: u8 = 4;

/// Wrong container or wrong sheet layout in one of the two files.
pub const EXIT_MALFORMED: u8 = 5;

/// Reconcile or its commit failed; the store is unchanged.
pub const EXIT_STORE: u8 = 6;

/// The audit log rejected the attempt record.
pub const EXIT_AUDIT: u8 = 7;

/// Map an upload failure to its exit code.
pub fn upload_exit_code(err: &UploadError) -> u8 {
    match err {
        UploadError::CadenceViolation { .. } => EXIT_CADENCE,
        UploadError::PermissionDenied { .. } => EXIT_PERMISSION,
        UploadError::MalformedFile { .. } => EXIT_MALFORMED,
        UploadError::Store(_) => EXIT_STORE,
        UploadError::Audit(_) => EXIT_AUDIT,
        UploadError::Aborted(_) => EXIT_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdb_core::SourceKind;
    use cdb_io::MalformedFileError;

    #[test]
    fn every_refusal_has_its_own_code() {
        let codes = [
            upload_exit_code(&UploadError::CadenceViolation { days_remaining: 2 }),
            upload_exit_code(&UploadError::PermissionDenied { actor: "bo".into() }),
            upload_exit_code(&UploadError::MalformedFile {
                file: SourceKind::Bw,
                error: MalformedFileError::EmptyFile,
            }),
        ];
        assert_eq!(codes, [EXIT_CADENCE, EXIT_PERMISSION, EXIT_MALFORMED]);
        assert_eq!(upload_exit_code(&UploadError::Aborted("boom".into())), EXIT_ERROR);
    }
}
