// Append-only upload log: one row per upload attempt, successful or not.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use crate::error::StoreError;
use crate::Store;

/// Stored file labels are cut to this many characters.
pub const FILE_LABEL_MAX_CHARS: usize = 99;

/// An upload attempt as persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadRecord {
    pub id: i64,
    pub creator: String,
    pub file_name: String,
    pub file_content: String,
    pub content_digest: String,
    pub read_successful: bool,
    pub timestamp: DateTime<Utc>,
}

/// An upload attempt about to be persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUpload {
    pub creator: String,
    pub file_name: String,
    pub file_content: String,
    pub content_digest: String,
    pub read_successful: bool,
    pub timestamp: DateTime<Utc>,
}

impl NewUpload {
    /// `file_label` is truncated to [`FILE_LABEL_MAX_CHARS`]; nothing else is checked.
    pub fn new(
        creator: impl Into<String>,
        file_label: &str,
        file_content: String,
        content_digest: String,
        read_successful: bool,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            creator: creator.into(),
            file_name: truncate_label(file_label),
            file_content,
            content_digest,
            read_successful,
            timestamp,
        }
    }
}

/// Keep at most [`FILE_LABEL_MAX_CHARS`] characters (not bytes).
pub fn truncate_label(label: &str) -> String {
    label.chars().take(FILE_LABEL_MAX_CHARS).collect()
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|_| StoreError::Corrupt(format!("bad upload timestamp '{value}'")))
}

impl Store {
    /// Persist one audit record outside any reconcile transaction.
    pub fn record_upload(&self, upload: &NewUpload) -> Result<UploadRecord, StoreError> {
        insert(self.connection(), upload)
    }

    /// Timestamp of the newest upload, optionally counting successful ones only.
    pub fn latest_upload_timestamp(
        &self,
        successful_only: bool,
    ) -> Result<Option<DateTime<Utc>>, StoreError> {
        let sql = if successful_only {
            "SELECT timestamp FROM uploads WHERE read_successful = 1 ORDER BY timestamp DESC, id DESC LIMIT 1"
        } else {
            "SELECT timestamp FROM uploads ORDER BY timestamp DESC, id DESC LIMIT 1"
        };
        let raw: Option<String> = self
            .connection()
            .query_row(sql, [], |row| row.get(0))
            .optional()?;
        raw.as_deref().map(parse_timestamp).transpose()
    }

    /// Upload history, newest first.
    pub fn list_uploads(&self, limit: Option<usize>) -> Result<Vec<UploadRecord>, StoreError> {
        // SQLite treats a negative LIMIT as "no limit"
        let limit = limit.map(|n| n.min(i64::MAX as usize) as i64).unwrap_or(-1);
        let mut stmt = self.connection().prepare(
            "SELECT id, creator, file_name, file_content, content_digest, read_successful, timestamp
             FROM uploads ORDER BY timestamp DESC, id DESC LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![limit], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, bool>(5)?,
                    row.get::<_, String>(6)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, creator, file_name, file_content, content_digest, read_successful, ts)| {
                Ok(UploadRecord {
                    id,
                    creator,
                    file_name,
                    file_content,
                    content_digest,
                    read_successful,
                    timestamp: parse_timestamp(&ts)?,
                })
            })
            .collect()
    }
}

pub(crate) fn insert(conn: &Connection, upload: &NewUpload) -> Result<UploadRecord, StoreError> {
    conn.execute(
        "INSERT INTO uploads (creator, file_name, file_content, content_digest, read_successful, timestamp)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            upload.creator,
            upload.file_name,
            upload.file_content,
            upload.content_digest,
            upload.read_successful,
            format_timestamp(&upload.timestamp),
        ],
    )?;
    let id = conn.last_insert_rowid();

    log::info!(
        "recorded upload #{} by {} (successful: {})",
        id,
        upload.creator,
        upload.read_successful
    );

    Ok(UploadRecord {
        id,
        creator: upload.creator.clone(),
        file_name: upload.file_name.clone(),
        file_content: upload.file_content.clone(),
        content_digest: upload.content_digest.clone(),
        read_successful: upload.read_successful,
        timestamp: upload.timestamp,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, day, 9, 0, 0).unwrap()
    }

    fn upload(success: bool, ts: DateTime<Utc>) -> NewUpload {
        NewUpload::new("ana", "c11: a.xlsx - bw: b.xlsx", "{}".into(), "ab12".into(), success, ts)
    }

    #[test]
    fn labels_are_cut_at_99_characters() {
        let long = "é".repeat(150);
        assert_eq!(truncate_label(&long).chars().count(), FILE_LABEL_MAX_CHARS);
        assert_eq!(truncate_label("short"), "short");
    }

    #[test]
    fn latest_timestamp_respects_success_filter() {
        let store = Store::open_in_memory().unwrap();
        assert_eq!(store.latest_upload_timestamp(false).unwrap(), None);

        store.record_upload(&upload(true, at(3))).unwrap();
        store.record_upload(&upload(false, at(9))).unwrap();

        assert_eq!(store.latest_upload_timestamp(false).unwrap(), Some(at(9)));
        assert_eq!(store.latest_upload_timestamp(true).unwrap(), Some(at(3)));
    }

    #[test]
    fn history_is_newest_first_and_limited() {
        let store = Store::open_in_memory().unwrap();
        for day in [1, 5, 3] {
            store.record_upload(&upload(true, at(day))).unwrap();
        }
        let all = store.list_uploads(None).unwrap();
        let days: Vec<DateTime<Utc>> = all.iter().map(|u| u.timestamp).collect();
        assert_eq!(days, vec![at(5), at(3), at(1)]);
        assert_eq!(store.list_uploads(Some(2)).unwrap().len(), 2);
    }

    #[test]
    fn records_keep_subsecond_precision() {
        let store = Store::open_in_memory().unwrap();
        let ts = at(4) + Duration::microseconds(123_456);
        let record = store.record_upload(&upload(true, ts)).unwrap();
        assert_eq!(store.list_uploads(None).unwrap(), vec![record]);
    }

    #[test]
    fn uploads_cannot_be_mutated_or_deleted() {
        let store = Store::open_in_memory().unwrap();
        let record = store.record_upload(&upload(false, at(2))).unwrap();
        let conn = store.connection();

        assert!(conn
            .execute("UPDATE uploads SET read_successful = 1 WHERE id = ?1", params![record.id])
            .is_err());
        assert!(conn
            .execute("DELETE FROM uploads WHERE id = ?1", params![record.id])
            .is_err());
        assert_eq!(store.list_uploads(None).unwrap().len(), 1);
    }
}
