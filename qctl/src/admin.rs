//! In-process admin operations surfaced to the CLI and dashboard.
//!
//! Every method is a single store call; no worker-loop logic lives
//! here. Mutating methods are exactly the ones the CLI exposes, the
//! dashboard only ever reads.

use crate::core::job::{Job, JobCounts, JobFilter, JobSpec, QueueMetrics, StateFilter};
use crate::core::store::{JobStore, StoreError};
use crate::core::Utc;

#[derive(Debug, Clone)]
pub struct Admin<S> {
    store: S,
}

impl<S> Admin<S>
where
    S: JobStore,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub async fn enqueue(&self, spec: JobSpec) -> Result<String, StoreError> {
        self.store.enqueue(spec).await
    }

    pub async fn list(&self, filter: JobFilter) -> Result<Vec<Job>, StoreError> {
        self.store.list(filter).await
    }

    pub async fn job(&self, job_id: &str) -> Result<Option<Job>, StoreError> {
        self.store.job(job_id).await
    }

    pub async fn counts(&self) -> Result<JobCounts, StoreError> {
        self.store.counts().await
    }

    pub async fn metrics(&self) -> Result<QueueMetrics, StoreError> {
        self.store.metrics().await
    }

    pub async fn purge_completed(&self) -> Result<u64, StoreError> {
        self.store.purge_completed().await
    }

    /// The dead letter queue is just a filtered view.
    pub async fn dlq_list(&self) -> Result<Vec<Job>, StoreError> {
        self.store
            .list(JobFilter::with_state(StateFilter::Dead))
            .await
    }

    pub async fn dlq_retry(&self, job_id: &str) -> Result<(), StoreError> {
        self.store.requeue_dead(job_id, Utc::now()).await
    }

    pub async fn config_get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.store.config_get(key).await
    }

    pub async fn config_set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.store.config_set(key, value).await
    }
}
