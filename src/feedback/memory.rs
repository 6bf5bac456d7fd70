//! In-process feedback store for tests and single-run CLI use

use super::FeedbackStore;
use crate::error::Result;
use crate::types::{FeedbackRecord, QueryId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

#[derive(Default)]
pub struct InMemoryFeedbackStore {
    records: RwLock<Vec<FeedbackRecord>>,
}

impl InMemoryFeedbackStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every record in insertion order
    pub async fn all(&self) -> Vec<FeedbackRecord> {
        self.records.read().await.clone()
    }
}

#[async_trait]
impl FeedbackStore for InMemoryFeedbackStore {
    async fn append(&self, record: &FeedbackRecord) -> Result<()> {
        self.records.write().await.push(record.clone());
        Ok(())
    }

    async fn latest_for_query(&self, query_id: QueryId) -> Result<Option<FeedbackRecord>> {
        let records = self.records.read().await;
        // Last inserted wins among equal timestamps
        Ok(records
            .iter()
            .filter(|r| r.query_id == query_id)
            .fold(None::<&FeedbackRecord>, |best, r| match best {
                Some(b) if b.timestamp > r.timestamp => Some(b),
                _ => Some(r),
            })
            .cloned())
    }

    async fn records_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<FeedbackRecord>> {
        let records = self.records.read().await;
        let mut selected: Vec<FeedbackRecord> = records
            .iter()
            .filter(|r| r.timestamp >= from && r.timestamp < to)
            .cloned()
            .collect();
        selected.sort_by_key(|r| r.timestamp);
        Ok(selected)
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.records.read().await.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CalibratedConfidence, CalibrationMethod, Tier};
    use chrono::Duration;

    fn pending(query_id: QueryId) -> FeedbackRecord {
        let confidence = CalibratedConfidence {
            raw_composite: 0.65,
            calibrated: 0.65,
            method: CalibrationMethod::None,
            model_version: "v0-identity".to_string(),
        };
        FeedbackRecord::pending(query_id, &confidence, Tier::Medium)
    }

    #[tokio::test]
    async fn test_append_and_latest() {
        let store = InMemoryFeedbackStore::new();
        let query = QueryId::new();
        let original = pending(query);
        let mut label = original.labelled(true);
        label.timestamp = original.timestamp + Duration::milliseconds(5);

        store.append(&original).await.unwrap();
        store.append(&label).await.unwrap();
        store.append(&pending(QueryId::new())).await.unwrap();

        let latest = store.latest_for_query(query).await.unwrap().unwrap();
        assert_eq!(latest.id, label.id);
        assert_eq!(store.count().await.unwrap(), 3);
        assert!(store.latest_for_query(QueryId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_records_between_is_half_open() {
        let store = InMemoryFeedbackStore::new();
        let record = pending(QueryId::new());
        store.append(&record).await.unwrap();

        let at = record.timestamp;
        assert_eq!(store.records_between(at, at + Duration::seconds(1)).await.unwrap().len(), 1);
        assert!(store.records_between(at - Duration::seconds(1), at).await.unwrap().is_empty());
    }
}
