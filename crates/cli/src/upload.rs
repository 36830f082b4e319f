//! Upload pipeline: gate, parse, merge, reconcile, audit.
//!
//! Permission and cadence are checked before anything is read and leave no
//! trace in the audit log. Once those pass, every attempt ends in exactly one
//! audit record. On success that record commits in the same transaction as
//! the project changes; on any failure it is written on its own with
//! `read_successful = false`.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::thread;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

use cdb_config::{ColumnSettings, Settings};
use cdb_core::{Actor, BwColumns, BwRecord, C11Columns, C11Record, Project, SourceKind};
use cdb_io::{parse_bw, parse_c11, MalformedFileError, ParseOutput, RowError};
use cdb_recon::{build_objects, days_to_next_upload, DeletionReport, Statistics};
use cdb_store::{NewUpload, Store, StoreError, UploadRecord};

use crate::error::UploadError;

/// One uploaded file: its original name and raw bytes.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    /// Read a file from disk, keeping only its file name as the label.
    pub fn read(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self { name, bytes })
    }
}

#[derive(Debug, Serialize)]
pub struct UploadSuccess {
    pub statistics: Statistics,
    pub deletions: DeletionReport,
    pub c11_errors: Vec<RowError>,
    pub bw_errors: Vec<RowError>,
    pub record: UploadRecord,
}

#[derive(Debug)]
pub struct UploadFailure {
    pub error: UploadError,
    pub c11_errors: Vec<RowError>,
    pub bw_errors: Vec<RowError>,
    /// The `read_successful = false` record, when one was written.
    pub record: Option<UploadRecord>,
}

impl UploadFailure {
    fn refused(error: UploadError) -> Self {
        Self {
            error,
            c11_errors: Vec::new(),
            bw_errors: Vec::new(),
            record: None,
        }
    }

    pub fn warning(&self) -> String {
        self.error.warning()
    }
}

/// Turns the two uploaded files into typed records. Both run concurrently.
pub trait RecordParser: Sync {
    fn parse_c11(
        &self,
        file: &UploadFile,
        columns: &C11Columns,
    ) -> Result<ParseOutput<C11Record>, MalformedFileError>;

    fn parse_bw(
        &self,
        file: &UploadFile,
        columns: &BwColumns,
    ) -> Result<ParseOutput<BwRecord>, MalformedFileError>;
}

/// The spreadsheet readers from `cdb-io`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpreadsheetParser;

impl RecordParser for SpreadsheetParser {
    fn parse_c11(
        &self,
        file: &UploadFile,
        columns: &C11Columns,
    ) -> Result<ParseOutput<C11Record>, MalformedFileError> {
        parse_c11(&file.bytes, &file.name, columns)
    }

    fn parse_bw(
        &self,
        file: &UploadFile,
        columns: &BwColumns,
    ) -> Result<ParseOutput<BwRecord>, MalformedFileError> {
        parse_bw(&file.bytes, &file.name, columns)
    }
}

/// Run one upload for `actor` against `store`.
pub fn run_upload(
    store: &mut Store,
    settings: &Settings,
    actor: &Actor,
    c11: &UploadFile,
    bw: &UploadFile,
    now: DateTime<Utc>,
) -> Result<UploadSuccess, UploadFailure> {
    run_upload_with(&SpreadsheetParser, store, settings, actor, c11, bw, now)
}

/// [`run_upload`] with a custom parser in place of the spreadsheet readers.
pub fn run_upload_with<P: RecordParser>(
    parser: &P,
    store: &mut Store,
    settings: &Settings,
    actor: &Actor,
    c11: &UploadFile,
    bw: &UploadFile,
    now: DateTime<Utc>,
) -> Result<UploadSuccess, UploadFailure> {
    check_gate(store, settings, actor, now).map_err(UploadFailure::refused)?;

    let audit = AuditDraft::new(actor, c11, bw, now);
    log::info!("upload by {} started: {}", actor.name, audit.label);

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        attempt(parser, store, &settings.columns, c11, bw, &audit)
    }));

    match outcome {
        Ok(result) => result,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            log::error!("upload by {} aborted: {}", actor.name, message);
            Err(record_failure(
                store,
                &audit,
                audit_content(None, None),
                UploadError::Aborted(message),
                Vec::new(),
                Vec::new(),
            ))
        }
    }
}

/// Permission first, then cadence.
fn check_gate(
    store: &Store,
    settings: &Settings,
    actor: &Actor,
    now: DateTime<Utc>,
) -> Result<(), UploadError> {
    if !actor.may_upload(&settings.upload.allowed_groups) {
        log::error!("user {} is not allowed to upload", actor.name);
        return Err(UploadError::PermissionDenied {
            actor: actor.name.clone(),
        });
    }

    let last_upload = store
        .latest_upload_timestamp(!settings.upload.count_failed_uploads)
        .map_err(UploadError::Store)?;
    let days = days_to_next_upload(actor, last_upload, settings.upload.cooldown_days, now);
    if days > 0 {
        log::warn!("upload by {} refused: {} day(s) of cooldown left", actor.name, days);
        return Err(UploadError::CadenceViolation {
            days_remaining: days,
        });
    }
    Ok(())
}

fn attempt<P: RecordParser>(
    parser: &P,
    store: &mut Store,
    columns: &ColumnSettings,
    c11: &UploadFile,
    bw: &UploadFile,
    audit: &AuditDraft,
) -> Result<UploadSuccess, UploadFailure> {
    let (c11_parsed, bw_parsed) = parse_both(parser, c11, bw, columns);

    let content = audit_content(
        c11_parsed.as_ref().ok().map(|o| o.records.as_slice()),
        bw_parsed.as_ref().ok().map(|o| o.records.as_slice()),
    );
    let c11_errors = row_errors(&c11_parsed);
    let bw_errors = row_errors(&bw_parsed);

    let (c11_out, bw_out) = match (c11_parsed, bw_parsed) {
        (Ok(c11_out), Ok(bw_out)) => (c11_out, bw_out),
        (Err(error), _) => {
            let error = UploadError::MalformedFile {
                file: SourceKind::C11,
                error,
            };
            return Err(record_failure(store, audit, content, error, c11_errors, bw_errors));
        }
        (_, Err(error)) => {
            let error = UploadError::MalformedFile {
                file: SourceKind::Bw,
                error,
            };
            return Err(record_failure(store, audit, content, error, c11_errors, bw_errors));
        }
    };

    let architecture = build_objects(&c11_out.records, &bw_out.records);
    let success = audit.entry(content.clone(), true);

    match commit_upload(store, &architecture.projects, &success) {
        Ok((deletions, record)) => {
            log::info!(
                "upload #{} applied: {} projects, {} deleted",
                record.id,
                architecture.statistics.projects,
                deletions.deleted.len()
            );
            Ok(UploadSuccess {
                statistics: architecture.statistics,
                deletions,
                c11_errors,
                bw_errors,
                record,
            })
        }
        Err(err) => Err(record_failure(
            store,
            audit,
            content,
            UploadError::Store(err),
            c11_errors,
            bw_errors,
        )),
    }
}

/// Parse both files concurrently; neither result depends on the other.
fn parse_both<P: RecordParser>(
    parser: &P,
    c11: &UploadFile,
    bw: &UploadFile,
    columns: &ColumnSettings,
) -> (
    Result<ParseOutput<C11Record>, MalformedFileError>,
    Result<ParseOutput<BwRecord>, MalformedFileError>,
) {
    thread::scope(|scope| {
        let c11_job = scope.spawn(|| parser.parse_c11(c11, &columns.c11));
        let bw_parsed = parser.parse_bw(bw, &columns.bw);
        let c11_parsed = c11_job
            .join()
            .unwrap_or_else(|payload| panic::resume_unwind(payload));

        for (kind, parsed) in [
            (SourceKind::C11, c11_parsed.as_ref().map(|o| (o.records.len(), o.errors.len()))),
            (SourceKind::Bw, bw_parsed.as_ref().map(|o| (o.records.len(), o.errors.len()))),
        ] {
            match parsed {
                Ok((records, errors)) => {
                    log::info!("{kind}: {records} records, {errors} row errors")
                }
                Err(err) => log::warn!("{kind}: {err}"),
            }
        }
        (c11_parsed, bw_parsed)
    })
}

/// Upserts, stale deletes and the success record, all or nothing.
fn commit_upload(
    store: &mut Store,
    projects: &[Project],
    success: &NewUpload,
) -> Result<(DeletionReport, UploadRecord), StoreError> {
    let tx = store.begin()?;
    let deletions = tx.reconcile(projects)?;
    let record = tx.record_upload(success)?;
    tx.commit()?;
    Ok((deletions, record))
}

fn record_failure(
    store: &Store,
    audit: &AuditDraft,
    content: String,
    error: UploadError,
    c11_errors: Vec<RowError>,
    bw_errors: Vec<RowError>,
) -> UploadFailure {
    log::error!("upload by {} failed: {}", audit.creator, error);

    match store.record_upload(&audit.entry(content, false)) {
        Ok(record) => UploadFailure {
            error,
            c11_errors,
            bw_errors,
            record: Some(record),
        },
        Err(audit_err) => {
            log::error!("failed upload by {} could not be recorded: {}", audit.creator, audit_err);
            UploadFailure {
                error: UploadError::Audit(audit_err),
                c11_errors,
                bw_errors,
                record: None,
            }
        }
    }
}

fn row_errors<T>(parsed: &Result<ParseOutput<T>, MalformedFileError>) -> Vec<RowError> {
    parsed
        .as_ref()
        .map(|o| o.errors.clone())
        .unwrap_or_default()
}

/// Fields shared by the success and failure records of one attempt.
struct AuditDraft {
    creator: String,
    label: String,
    digest: String,
    timestamp: DateTime<Utc>,
}

impl AuditDraft {
    fn new(actor: &Actor, c11: &UploadFile, bw: &UploadFile, timestamp: DateTime<Utc>) -> Self {
        Self {
            creator: actor.name.clone(),
            label: format!("c11: {} - bw: {}", c11.name, bw.name),
            digest: content_digest(&c11.bytes, &bw.bytes),
            timestamp,
        }
    }

    fn entry(&self, content: String, read_successful: bool) -> NewUpload {
        NewUpload::new(
            self.creator.clone(),
            &self.label,
            content,
            self.digest.clone(),
            read_successful,
            self.timestamp,
        )
    }
}

/// `{"c11_data": [...], "bw_data": [...]}`, each side `null` when unparsed.
fn audit_content(c11: Option<&[C11Record]>, bw: Option<&[BwRecord]>) -> String {
    serde_json::json!({
        "c11_data": c11,
        "bw_data": bw,
    })
    .to_string()
}

/// SHA-256 over the C11 bytes followed by the BW bytes → "sha256:<64 hex>".
pub fn content_digest(c11: &[u8], bw: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(c11);
    hasher.update(bw);
    format!("sha256:{:x}", hasher.finalize())
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}
