//! In-memory backend
//!
//! Same contract as the PostgreSQL backend, held behind async mutexes.
//! Used by `BULKLOAD_STORAGE=memory` and throughout the tests.

use async_trait::async_trait;
use bulkload_common::types::{AccountProduct, IngestionJob};
use futures::{
    stream::{self, BoxStream},
    StreamExt,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{BulkWriteOutcome, DbError, DbResult, JobRepository, RecordStore, WriteError};

/// Records keyed (and therefore exported) by composite id
#[derive(Clone, Default)]
pub struct InMemoryRecordStore {
    records: Arc<Mutex<BTreeMap<String, AccountProduct>>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn bulk_insert(&self, records: &[AccountProduct]) -> DbResult<BulkWriteOutcome> {
        let mut stored = self.records.lock().await;
        let mut inserted = 0;
        let mut errors = Vec::new();

        for (index, record) in records.iter().enumerate() {
            if stored.contains_key(&record.id) {
                errors.push(WriteError::duplicate_key(index, &record.id));
            } else {
                stored.insert(record.id.clone(), record.clone());
                inserted += 1;
            }
        }

        Ok(BulkWriteOutcome::from_parts(inserted, errors))
    }

    async fn count(&self) -> DbResult<i64> {
        Ok(self.records.lock().await.len() as i64)
    }

    async fn truncate(&self) -> DbResult<i64> {
        let mut stored = self.records.lock().await;
        let removed = stored.len() as i64;
        stored.clear();
        Ok(removed)
    }

    async fn delete_all(&self) -> DbResult<i64> {
        let mut stored = self.records.lock().await;
        let removed = stored.len() as i64;
        stored.retain(|_, _| false);
        Ok(removed)
    }

    fn stream_all(&self) -> BoxStream<'_, DbResult<AccountProduct>> {
        let records = Arc::clone(&self.records);
        stream::once(async move { records.lock().await.values().cloned().collect::<Vec<_>>() })
            .flat_map(|snapshot| stream::iter(snapshot.into_iter().map(Ok)))
            .boxed()
    }

    async fn health_check(&self) -> DbResult<()> {
        Ok(())
    }
}

/// Jobs keyed by id
#[derive(Clone, Default)]
pub struct InMemoryJobRepository {
    jobs: Arc<Mutex<HashMap<Uuid, IngestionJob>>>,
}

impl InMemoryJobRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn other_active(jobs: &HashMap<Uuid, IngestionJob>, id: Uuid) -> bool {
    jobs.values().any(|job| job.id != id && job.status.is_active())
}

#[async_trait]
impl JobRepository for InMemoryJobRepository {
    async fn has_active(&self) -> DbResult<bool> {
        Ok(self.jobs.lock().await.values().any(|job| job.status.is_active()))
    }

    async fn insert_pending(&self, job: &IngestionJob) -> DbResult<()> {
        let mut jobs = self.jobs.lock().await;
        if other_active(&jobs, job.id) {
            return Err(DbError::duplicate(
                "Another ingestion job is already PENDING or RUNNING",
            ));
        }
        if jobs.contains_key(&job.id) {
            return Err(DbError::duplicate(format!("Ingestion job '{}' already exists", job.id)));
        }
        jobs.insert(job.id, job.clone());
        Ok(())
    }

    async fn find(&self, id: Uuid) -> DbResult<Option<IngestionJob>> {
        Ok(self.jobs.lock().await.get(&id).cloned())
    }

    async fn list_active(&self) -> DbResult<Vec<IngestionJob>> {
        let mut active: Vec<_> = self
            .jobs
            .lock()
            .await
            .values()
            .filter(|job| job.status.is_active())
            .cloned()
            .collect();
        active.sort_by_key(|job| job.created_at);
        Ok(active)
    }

    async fn save(&self, job: &IngestionJob) -> DbResult<()> {
        let mut jobs = self.jobs.lock().await;
        if !jobs.contains_key(&job.id) {
            return Err(DbError::not_found("Ingestion job", &job.id.to_string()));
        }
        if job.status.is_active() && other_active(&jobs, job.id) {
            return Err(DbError::duplicate(
                "Another ingestion job is already PENDING or RUNNING",
            ));
        }
        jobs.insert(job.id, job.clone());
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> DbResult<bool> {
        Ok(self.jobs.lock().await.remove(&id).is_some())
    }
}
