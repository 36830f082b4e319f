//! `cdb-store` — SQLite persistence for projects and the upload log.
//!
//! Projects are keyed by order number and only change through
//! [`StoreTx::reconcile`]. The uploads table is append-only; triggers reject
//! any UPDATE or DELETE on it.

pub mod error;
pub mod projects;
pub mod uploads;

use std::path::Path;

use rusqlite::{Connection, Transaction};

use cdb_core::Project;
use cdb_recon::DeletionReport;

pub use error::StoreError;
pub use uploads::{truncate_label, NewUpload, UploadRecord, FILE_LABEL_MAX_CHARS};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS projects (
    order_number      INTEGER PRIMARY KEY,
    source            TEXT NOT NULL,        -- both | c11_only | bw_only
    customer          TEXT,
    project_name      TEXT,
    sales_manager     TEXT,
    order_date        TEXT,                 -- YYYY-MM-DD
    order_value_cents INTEGER NOT NULL DEFAULT 0,
    cost_center       TEXT,
    invoiced_cents    INTEGER NOT NULL DEFAULT 0,
    hours_booked      REAL NOT NULL DEFAULT 0,
    last_booking_date TEXT,                 -- YYYY-MM-DD
    updated_at        TEXT NOT NULL         -- RFC 3339, UTC
);

CREATE TABLE IF NOT EXISTS uploads (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    creator         TEXT NOT NULL,
    file_name       TEXT NOT NULL,
    file_content    TEXT NOT NULL,
    content_digest  TEXT NOT NULL,
    read_successful INTEGER NOT NULL,
    timestamp       TEXT NOT NULL          -- RFC 3339, UTC, microseconds
);

CREATE INDEX IF NOT EXISTS uploads_by_timestamp ON uploads (timestamp);

CREATE TRIGGER IF NOT EXISTS uploads_no_update BEFORE UPDATE ON uploads
BEGIN
    SELECT RAISE(ABORT, 'uploads are append-only');
END;

CREATE TRIGGER IF NOT EXISTS uploads_no_delete BEFORE DELETE ON uploads
BEGIN
    SELECT RAISE(ABORT, 'uploads are append-only');
END;
"#;

pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open (creating if needed) the store at `path`.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Raw connection, for read-only inspection and test setup.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Start a write transaction. Dropping the returned handle without
    /// calling [`StoreTx::commit`] rolls everything back.
    pub fn begin(&mut self) -> Result<StoreTx<'_>, StoreError> {
        Ok(StoreTx {
            tx: self.conn.transaction()?,
        })
    }
}

/// A write transaction spanning project reconciliation and the audit record.
pub struct StoreTx<'a> {
    tx: Transaction<'a>,
}

impl StoreTx<'_> {
    /// Upsert every incoming project and delete every stored project whose
    /// order number is absent from `projects`.
    pub fn reconcile(&self, projects: &[Project]) -> Result<DeletionReport, StoreError> {
        projects::reconcile(&self.tx, projects, chrono::Utc::now())
    }

    pub fn record_upload(&self, upload: &NewUpload) -> Result<UploadRecord, StoreError> {
        uploads::insert(&self.tx, upload)
    }

    pub fn commit(self) -> Result<(), StoreError> {
        self.tx.commit()?;
        Ok(())
    }
}
