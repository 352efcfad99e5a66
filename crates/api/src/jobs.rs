use chrono::{DateTime, Utc};
use dashmap::DashMap;
use pipeline::OutputMetadata;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Complete,
    Error,
}

impl JobStatus {
    /// pending -> processing -> complete | error; pending may also fail directly
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Processing)
                | (JobStatus::Pending, JobStatus::Error)
                | (JobStatus::Processing, JobStatus::Complete)
                | (JobStatus::Processing, JobStatus::Error)
        )
    }

    pub fn is_finished(self) -> bool {
        matches!(self, JobStatus::Complete | JobStatus::Error)
    }
}

#[derive(Debug, Clone)]
pub struct Job {
    pub id: Uuid,
    pub status: JobStatus,
    pub use_case: String,
    pub file_count: usize,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub metadata: Option<OutputMetadata>,
    /// User-facing failure message
    pub error: Option<String>,
    pub archive: Option<Arc<Vec<u8>>>,
}

/// In-memory registry of processing jobs. Jobs expire `ttl` after creation.
pub struct JobStore {
    jobs: DashMap<Uuid, Job>,
    ttl: Duration,
}

impl JobStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            jobs: DashMap::new(),
            ttl,
        }
    }

    pub fn create(&self, use_case: &str, file_count: usize) -> Uuid {
        let id = Uuid::new_v4();
        self.jobs.insert(
            id,
            Job {
                id,
                status: JobStatus::Pending,
                use_case: use_case.to_string(),
                file_count,
                created_at: Utc::now(),
                completed_at: None,
                metadata: None,
                error: None,
                archive: None,
            },
        );
        id
    }

    pub fn get(&self, id: &Uuid) -> Option<Job> {
        self.jobs.get(id).map(|r| r.value().clone())
    }

    pub fn start(&self, id: &Uuid) -> bool {
        self.transition(id, JobStatus::Processing, |_| {})
    }

    pub fn complete(&self, id: &Uuid, metadata: OutputMetadata, archive: Vec<u8>) -> bool {
        self.transition(id, JobStatus::Complete, |job| {
            job.metadata = Some(metadata);
            job.archive = Some(Arc::new(archive));
        })
    }

    pub fn fail(&self, id: &Uuid, message: impl Into<String>) -> bool {
        let message = message.into();
        self.transition(id, JobStatus::Error, |job| job.error = Some(message))
    }

    fn transition(&self, id: &Uuid, next: JobStatus, update: impl FnOnce(&mut Job)) -> bool {
        let Some(mut job) = self.jobs.get_mut(id) else {
            tracing::warn!(job_id = %id, status = ?next, "Transition for unknown job");
            return false;
        };

        if !job.status.can_transition_to(next) {
            tracing::warn!(job_id = %id, from = ?job.status, to = ?next, "Rejected job transition");
            return false;
        }

        job.status = next;
        if next.is_finished() {
            job.completed_at = Some(Utc::now());
        }
        update(&mut job);
        true
    }

    /// Drop jobs older than the TTL; returns how many were removed
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let before = self.jobs.len();
        self.jobs.retain(|_, job| {
            now.signed_duration_since(job.created_at)
                .to_std()
                .map(|age| age < self.ttl)
                .unwrap_or(true)
        });
        before - self.jobs.len()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

/// Shortest sweep period; `tokio::time::interval` rejects zero
const MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Periodically purge expired jobs
pub fn spawn_sweeper(store: Arc<JobStore>, every: Duration) -> tokio::task::JoinHandle<()> {
    let every = every.max(MIN_SWEEP_INTERVAL);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            let removed = store.purge_expired(Utc::now());
            if removed > 0 {
                tracing::info!(removed, remaining = store.len(), "Expired jobs purged");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata() -> OutputMetadata {
        OutputMetadata {
            total_concepts: 2,
            total_links: 5,
            processing_time_ms: 10,
        }
    }

    #[test]
    fn test_lifecycle_to_complete() {
        let store = JobStore::new(Duration::from_secs(60));
        let id = store.create("research-library", 3);

        let job = store.get(&id).unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.file_count, 3);
        assert!(job.completed_at.is_none());

        assert!(store.start(&id));
        assert!(store.complete(&id, metadata(), vec![1, 2, 3]));

        let job = store.get(&id).unwrap();
        assert_eq!(job.status, JobStatus::Complete);
        assert_eq!(job.metadata, Some(metadata()));
        assert_eq!(job.archive.as_deref(), Some(&vec![1, 2, 3]));
        assert!(job.completed_at.is_some());
    }

    #[test]
    fn test_rejects_invalid_transitions() {
        let store = JobStore::new(Duration::from_secs(60));
        let id = store.create("meeting-notes", 1);

        // Cannot complete before processing
        assert!(!store.complete(&id, metadata(), Vec::new()));

        assert!(store.start(&id));
        assert!(store.fail(&id, "boom"));

        // Finished jobs stay finished
        assert!(!store.start(&id));
        assert!(!store.complete(&id, metadata(), Vec::new()));

        let job = store.get(&id).unwrap();
        assert_eq!(job.status, JobStatus::Error);
        assert_eq!(job.error.as_deref(), Some("boom"));

        assert!(!store.start(&Uuid::new_v4()));
    }

    #[test]
    fn test_purge_expired() {
        let store = JobStore::new(Duration::from_secs(60));
        let old = store.create("a", 1);
        let fresh = store.create("b", 1);

        let now = store.get(&fresh).unwrap().created_at;
        let later = now + chrono::Duration::seconds(61);

        assert_eq!(store.purge_expired(now), 0);
        assert_eq!(store.purge_expired(later), 2);
        assert!(store.get(&old).is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_zero_sweep_interval_keeps_sweeper_alive() {
        let store = Arc::new(JobStore::new(Duration::from_secs(60)));
        let handle = spawn_sweeper(store, Duration::ZERO);

        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(!handle.is_finished());
        handle.abort();
    }
}
