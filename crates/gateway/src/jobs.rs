//! In-memory registry of inference runs
//!
//! One job per started run. The latest job of each login is what profile
//! and graph requests read; starting a new run cancels the one it
//! supersedes. Only the last `RETAINED_PER_LOGIN` jobs of a login are kept.

use chrono::{DateTime, Utc};
use serde::Serialize;
use skillgraph_common::errors::{AppError, ErrorCode};
use skillgraph_search::InferenceRun;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Jobs kept per login: the latest run and the one it superseded
pub const RETAINED_PER_LOGIN: usize = 2;

/// Lifecycle of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Processing)
    }
}

/// Why a run failed
#[derive(Debug, Clone, Serialize)]
pub struct JobFailure {
    pub code: ErrorCode,
    pub message: String,
}

/// Point-in-time copy of a job
#[derive(Debug, Clone, Serialize)]
pub struct JobView {
    pub job_id: Uuid,
    pub login: String,
    pub status: JobStatus,
    pub message: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<JobFailure>,
    #[serde(skip)]
    pub run: Option<Arc<InferenceRun>>,
}

struct JobRecord {
    view: JobView,
    cancel: CancellationToken,
}

#[derive(Default)]
struct Registry {
    jobs: HashMap<Uuid, JobRecord>,
    /// Job ids per login, oldest first
    history: HashMap<String, VecDeque<Uuid>>,
}

impl Registry {
    fn latest_id(&self, login: &str) -> Option<Uuid> {
        self.history.get(login).and_then(|ids| ids.back().copied())
    }
}

/// Shared job registry
#[derive(Default)]
pub struct JobRegistry {
    inner: RwLock<Registry>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new run for `login`, cancelling any run it supersedes.
    ///
    /// Returns the new job and the token the run must observe.
    pub async fn begin(&self, login: &str) -> (JobView, CancellationToken) {
        let cancel = CancellationToken::new();
        let view = JobView {
            job_id: Uuid::new_v4(),
            login: login.to_string(),
            status: JobStatus::Processing,
            message: format!("Inferring skills for {}", login),
            created_at: Utc::now(),
            completed_at: None,
            failure: None,
            run: None,
        };

        let mut guard = self.inner.write().await;
        let inner = &mut *guard;
        if let Some(previous) = inner.latest_id(login) {
            if let Some(record) = inner.jobs.get_mut(&previous) {
                if !record.view.status.is_terminal() {
                    tracing::info!(job_id = %previous, login, "Superseding running inference");
                    record.cancel.cancel();
                }
            }
        }

        inner.jobs.insert(
            view.job_id,
            JobRecord {
                view: view.clone(),
                cancel: cancel.clone(),
            },
        );
        let ids = inner.history.entry(login.to_string()).or_default();
        ids.push_back(view.job_id);
        while ids.len() > RETAINED_PER_LOGIN {
            let Some(evicted) = ids.pop_front() else {
                break;
            };
            // already cancelled when it was superseded
            if let Some(record) = inner.jobs.remove(&evicted) {
                record.cancel.cancel();
                tracing::debug!(job_id = %evicted, login, "Dropped superseded job");
            }
        }
        (view, cancel)
    }

    /// Record the outcome of a run
    pub async fn finish(&self, job_id: Uuid, result: Result<InferenceRun, AppError>) {
        let mut inner = self.inner.write().await;
        let Some(record) = inner.jobs.get_mut(&job_id) else {
            return;
        };

        let view = &mut record.view;
        view.completed_at = Some(Utc::now());
        match result {
            Ok(run) => {
                view.status = JobStatus::Completed;
                view.message = format!("{} skills inferred", run.profile.skills.len());
                view.run = Some(Arc::new(run));
            }
            Err(AppError::Cancelled) => {
                view.status = JobStatus::Cancelled;
                view.message = "Inference run cancelled".to_string();
            }
            Err(e) => {
                view.status = JobStatus::Failed;
                view.message = "Inference run failed".to_string();
                view.failure = Some(JobFailure {
                    code: e.code(),
                    message: e.to_string(),
                });
            }
        }
    }

    pub async fn get(&self, job_id: Uuid) -> Option<JobView> {
        self.inner
            .read()
            .await
            .jobs
            .get(&job_id)
            .map(|r| r.view.clone())
    }

    /// Most recent job of a login
    pub async fn latest(&self, login: &str) -> Option<JobView> {
        let inner = self.inner.read().await;
        let id = inner.latest_id(login)?;
        inner.jobs.get(&id).map(|r| r.view.clone())
    }

    /// Cancel the in-flight run of a login. Returns false when none runs.
    pub async fn cancel(&self, login: &str) -> bool {
        let inner = self.inner.read().await;
        let Some(id) = inner.latest_id(login) else {
            return false;
        };
        match inner.jobs.get(&id) {
            Some(record) if !record.view.status.is_terminal() => {
                record.cancel.cancel();
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_new_run_supersedes_previous() {
        let jobs = JobRegistry::new();
        let (first, first_cancel) = jobs.begin("octocat").await;
        let (second, second_cancel) = jobs.begin("octocat").await;

        assert!(first_cancel.is_cancelled());
        assert!(!second_cancel.is_cancelled());
        assert_eq!(jobs.latest("octocat").await.unwrap().job_id, second.job_id);
        assert!(jobs.get(first.job_id).await.is_some());
    }

    #[tokio::test]
    async fn test_finish_records_failure() {
        let jobs = JobRegistry::new();
        let (job, _) = jobs.begin("octocat").await;
        jobs.finish(job.job_id, Err(AppError::inconsistency("repo:a/b", "bad edge")))
            .await;

        let view = jobs.get(job.job_id).await.unwrap();
        assert_eq!(view.status, JobStatus::Failed);
        assert_eq!(view.failure.unwrap().code, ErrorCode::GraphInconsistency);
        assert!(view.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_cancel_only_running_jobs() {
        let jobs = JobRegistry::new();
        assert!(!jobs.cancel("octocat").await);

        let (job, token) = jobs.begin("octocat").await;
        assert!(jobs.cancel("octocat").await);
        assert!(token.is_cancelled());

        jobs.finish(job.job_id, Err(AppError::Cancelled)).await;
        assert_eq!(jobs.get(job.job_id).await.unwrap().status, JobStatus::Cancelled);
        assert!(!jobs.cancel("octocat").await);
    }

    #[tokio::test]
    async fn test_superseded_jobs_are_dropped() {
        let jobs = JobRegistry::new();
        let mut ids = Vec::new();
        for _ in 0..1000 {
            let (job, _) = jobs.begin("octocat").await;
            jobs.finish(job.job_id, Err(AppError::Cancelled)).await;
            ids.push(job.job_id);
        }
        jobs.begin("hubot").await;

        {
            let inner = jobs.inner.read().await;
            assert_eq!(inner.jobs.len(), RETAINED_PER_LOGIN + 1);
            assert_eq!(inner.history["octocat"].len(), RETAINED_PER_LOGIN);
        }
        assert!(jobs.get(ids[999]).await.is_some());
        assert!(jobs.get(ids[998]).await.is_some());
        assert!(jobs.get(ids[997]).await.is_none());
        assert_eq!(jobs.latest("octocat").await.unwrap().job_id, ids[999]);
    }

    #[tokio::test]
    async fn test_finish_after_eviction_is_ignored() {
        let jobs = JobRegistry::new();
        let (oldest, oldest_cancel) = jobs.begin("octocat").await;
        jobs.begin("octocat").await;
        let (latest, _) = jobs.begin("octocat").await;

        assert!(oldest_cancel.is_cancelled());
        jobs.finish(oldest.job_id, Err(AppError::Cancelled)).await;
        assert!(jobs.get(oldest.job_id).await.is_none());
        assert_eq!(jobs.latest("octocat").await.unwrap().job_id, latest.job_id);
    }
}
