//! libSQL-backed feedback store
//!
//! One append-only table. Timestamps are stored as Unix milliseconds so range
//! scans for the refit job use the `created_at` index.

use super::FeedbackStore;
use crate::error::{AletheiaError, Result};
use crate::types::{FeedbackRecord, QueryId, Tier};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use libsql::{params, Builder, Connection, Database};
use std::path::Path;
use tracing::{debug, info};
use uuid::Uuid;

const SELECT_COLUMNS: &str = "id, query_id, raw_composite, calibrated, tier, model_version, \
                              user_correct, supersedes, created_at";

pub struct LibsqlFeedbackStore {
    // Keeps the database alive for the connection
    _db: Database,
    conn: Connection,
}

impl LibsqlFeedbackStore {
    /// Open (creating if needed) a database file
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    AletheiaError::Database(format!(
                        "Failed to create database directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let db = Builder::new_local(path)
            .build()
            .await
            .map_err(|e| AletheiaError::Database(format!("Failed to open database: {}", e)))?;
        let store = Self::from_database(db).await?;
        info!("Feedback store opened at {}", path.display());
        Ok(store)
    }

    /// Private in-memory database
    pub async fn in_memory() -> Result<Self> {
        let db = Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                AletheiaError::Database(format!("Failed to create in-memory database: {}", e))
            })?;
        Self::from_database(db).await
    }

    async fn from_database(db: Database) -> Result<Self> {
        let conn = db
            .connect()
            .map_err(|e| AletheiaError::Database(format!("Failed to get connection: {}", e)))?;
        init_schema(&conn).await?;
        Ok(Self { _db: db, conn })
    }
}

async fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS feedback_records (
            id TEXT PRIMARY KEY,
            query_id TEXT NOT NULL,
            raw_composite REAL NOT NULL,
            calibrated REAL NOT NULL,
            tier TEXT NOT NULL,
            model_version TEXT NOT NULL,
            user_correct INTEGER,
            supersedes TEXT,
            created_at INTEGER NOT NULL
        )
        "#,
        params![],
    )
    .await
    .map_err(|e| AletheiaError::Database(format!("Failed to create feedback_records table: {}", e)))?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_feedback_query ON feedback_records(query_id, created_at)",
        params![],
    )
    .await
    .map_err(|e| AletheiaError::Database(format!("Failed to create index: {}", e)))?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_feedback_created ON feedback_records(created_at)",
        params![],
    )
    .await
    .map_err(|e| AletheiaError::Database(format!("Failed to create index: {}", e)))?;

    debug!("Feedback schema ready");
    Ok(())
}

fn row_to_record(row: &libsql::Row) -> Result<FeedbackRecord> {
    let id: String = row.get(0)?;
    let query_id: String = row.get(1)?;
    let raw_composite: f64 = row.get(2)?;
    let calibrated: f64 = row.get(3)?;
    let tier: String = row.get(4)?;
    let model_version: String = row.get(5)?;
    let user_correct: Option<i64> = row.get(6)?;
    let supersedes: Option<String> = row.get(7)?;
    let created_at: i64 = row.get(8)?;

    let parse_uuid = |s: &str| {
        Uuid::parse_str(s).map_err(|e| AletheiaError::Database(format!("Invalid UUID {}: {}", s, e)))
    };

    Ok(FeedbackRecord {
        id: parse_uuid(&id)?,
        query_id: QueryId(parse_uuid(&query_id)?),
        raw_composite,
        calibrated_confidence: calibrated,
        tier: tier.parse::<Tier>().map_err(AletheiaError::Database)?,
        model_version,
        user_correct: user_correct.map(|v| v != 0),
        supersedes: supersedes.as_deref().map(parse_uuid).transpose()?,
        timestamp: Utc
            .timestamp_millis_opt(created_at)
            .single()
            .ok_or_else(|| AletheiaError::Database(format!("Invalid timestamp {}", created_at)))?,
    })
}

#[async_trait]
impl FeedbackStore for LibsqlFeedbackStore {
    async fn append(&self, record: &FeedbackRecord) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO feedback_records (id, query_id, raw_composite, calibrated, tier, \
                 model_version, user_correct, supersedes, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    record.id.to_string(),
                    record.query_id.to_string(),
                    record.raw_composite,
                    record.calibrated_confidence,
                    record.tier.to_string(),
                    record.model_version.clone(),
                    record.user_correct.map(|v| v as i64),
                    record.supersedes.map(|id| id.to_string()),
                    record.timestamp.timestamp_millis(),
                ],
            )
            .await
            .map_err(|e| AletheiaError::Database(format!("Failed to append feedback record: {}", e)))?;

        debug!("Appended feedback record {} for query {}", record.id, record.query_id);
        Ok(())
    }

    async fn latest_for_query(&self, query_id: QueryId) -> Result<Option<FeedbackRecord>> {
        let sql = format!(
            "SELECT {} FROM feedback_records WHERE query_id = ?1 \
             ORDER BY created_at DESC, rowid DESC LIMIT 1",
            SELECT_COLUMNS
        );
        let mut rows = self.conn.query(&sql, params![query_id.to_string()]).await?;

        match rows.next().await? {
            Some(row) => Ok(Some(row_to_record(&row)?)),
            None => Ok(None),
        }
    }

    async fn records_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<FeedbackRecord>> {
        let sql = format!(
            "SELECT {} FROM feedback_records WHERE created_at >= ?1 AND created_at < ?2 \
             ORDER BY created_at ASC, rowid ASC",
            SELECT_COLUMNS
        );
        let mut rows = self
            .conn
            .query(&sql, params![from.timestamp_millis(), to.timestamp_millis()])
            .await?;

        let mut records = Vec::new();
        while let Some(row) = rows.next().await? {
            records.push(row_to_record(&row)?);
        }
        Ok(records)
    }

    async fn count(&self) -> Result<usize> {
        let mut rows = self
            .conn
            .query("SELECT COUNT(*) FROM feedback_records", params![])
            .await?;

        let count = match rows.next().await? {
            Some(row) => row.get::<i64>(0)?,
            None => 0,
        };
        Ok(count.max(0) as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CalibratedConfidence, CalibrationMethod};
    use chrono::Duration;
    use tempfile::TempDir;

    fn pending(query_id: QueryId) -> FeedbackRecord {
        let confidence = CalibratedConfidence {
            raw_composite: 0.82,
            calibrated: 0.77,
            method: CalibrationMethod::Isotonic,
            model_version: "v2-isotonic".to_string(),
        };
        FeedbackRecord::pending(query_id, &confidence, Tier::Medium)
    }

    #[tokio::test]
    async fn test_round_trip_preserves_fields() {
        let store = LibsqlFeedbackStore::in_memory().await.unwrap();
        let query = QueryId::new();
        let original = pending(query);
        let mut label = original.labelled(false);
        label.timestamp = original.timestamp + Duration::milliseconds(10);

        store.append(&original).await.unwrap();
        store.append(&label).await.unwrap();

        let latest = store.latest_for_query(query).await.unwrap().unwrap();
        assert_eq!(latest.id, label.id);
        assert_eq!(latest.user_correct, Some(false));
        assert_eq!(latest.supersedes, Some(original.id));
        assert_eq!(latest.tier, Tier::Medium);
        assert_eq!(latest.model_version, "v2-isotonic");
        assert_eq!(latest.raw_composite, 0.82);
        assert_eq!(latest.timestamp.timestamp_millis(), label.timestamp.timestamp_millis());
    }

    #[tokio::test]
    async fn test_unlabelled_record_reads_back_null() {
        let store = LibsqlFeedbackStore::in_memory().await.unwrap();
        let record = pending(QueryId::new());
        store.append(&record).await.unwrap();

        let read = store.latest_for_query(record.query_id).await.unwrap().unwrap();
        assert_eq!(read.user_correct, None);
        assert_eq!(read.supersedes, None);
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("feedback.db");

        let record = pending(QueryId::new());
        {
            let store = LibsqlFeedbackStore::open(&path).await.unwrap();
            store.append(&record).await.unwrap();
        }

        let store = LibsqlFeedbackStore::open(&path).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 1);

        let from = record.timestamp - Duration::seconds(1);
        let to = record.timestamp + Duration::seconds(1);
        let records = store.records_between(from, to).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, record.id);
    }

    #[tokio::test]
    async fn test_duplicate_id_is_rejected() {
        let store = LibsqlFeedbackStore::in_memory().await.unwrap();
        let record = pending(QueryId::new());
        store.append(&record).await.unwrap();
        assert!(matches!(
            store.append(&record).await,
            Err(AletheiaError::Database(_))
        ));
    }
}
