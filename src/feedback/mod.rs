//! Append-only feedback storage
//!
//! Every delivered answer leaves an unlabelled [`FeedbackRecord`]. A label
//! arrives later as a *new* record that supersedes the latest one for the same
//! query; nothing is updated in place. [`resolve_labels`] collapses the log to
//! the newest record per query, which is what calibration trains on.

pub mod libsql;
pub mod memory;

pub use self::libsql::LibsqlFeedbackStore;
pub use self::memory::InMemoryFeedbackStore;

use crate::calibration::LabelledSample;
use crate::error::{AletheiaError, Result};
use crate::types::{FeedbackRecord, QueryId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Append-only record store, queryable by time range
#[async_trait]
pub trait FeedbackStore: Send + Sync {
    /// Persist a new record
    async fn append(&self, record: &FeedbackRecord) -> Result<()>;

    /// Most recent record for a query, if any
    async fn latest_for_query(&self, query_id: QueryId) -> Result<Option<FeedbackRecord>>;

    /// Records with `from <= timestamp < to`, oldest first
    async fn records_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<FeedbackRecord>>;

    /// Total number of records
    async fn count(&self) -> Result<usize>;
}

/// Append a label superseding the latest record for `query_id`
pub async fn record_label(
    store: &dyn FeedbackStore,
    query_id: QueryId,
    user_correct: bool,
) -> Result<FeedbackRecord> {
    let latest = store
        .latest_for_query(query_id)
        .await?
        .ok_or_else(|| AletheiaError::FeedbackNotFound(query_id.to_string()))?;

    let label = latest.labelled(user_correct);
    store.append(&label).await?;
    Ok(label)
}

/// Newest record per query that carries a label
///
/// Input order does not matter; among records of one query the latest
/// timestamp wins, with insertion order breaking timestamp ties.
pub fn resolve_labels(records: &[FeedbackRecord]) -> Vec<FeedbackRecord> {
    let mut latest: HashMap<QueryId, &FeedbackRecord> = HashMap::new();
    for record in records {
        match latest.get(&record.query_id) {
            Some(existing) if existing.timestamp > record.timestamp => {}
            _ => {
                latest.insert(record.query_id, record);
            }
        }
    }

    let mut resolved: Vec<FeedbackRecord> = latest
        .into_values()
        .filter(|r| r.user_correct.is_some())
        .cloned()
        .collect();
    resolved.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.query_id.cmp(&b.query_id)));
    resolved
}

/// Training samples from resolved records
pub fn labelled_samples(records: &[FeedbackRecord]) -> Vec<LabelledSample> {
    records
        .iter()
        .filter_map(|r| {
            r.user_correct
                .map(|correct| LabelledSample::new(r.raw_composite, correct))
        })
        .collect()
}
