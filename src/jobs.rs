//! Background job manager (§4.9, C9): a mutex-protected in-memory job table
//! mirrored to per-job JSON files, with crash recovery and best-effort
//! cancellation.

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;
use tokio::fs;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::models::{Job, JobStatus, JobType};

/// The error message recorded for jobs recovered mid-`running` on startup.
pub const RESTART_FAILURE_MESSAGE: &str = "Job failed due to server restart.";

/// Boxed unit of work handed to [`JobManager::submit`]. Receives a
/// cancellation token the task should poll/select against for best-effort
/// interruption, and a [`ProgressHandle`] for reporting `processed/total`.
pub type JobTask = Pin<Box<dyn Future<Output = anyhow::Result<Value>> + Send>>;

/// Lets a running task report progress on its own job without holding a
/// reference to the [`JobManager`] itself.
#[derive(Clone)]
pub struct ProgressHandle {
    jobs: Arc<Mutex<HashMap<String, Job>>>,
    state_dir: PathBuf,
    job_id: String,
}

impl ProgressHandle {
    /// Atomically sets `processed_items`/`total_items` (and the derived
    /// `progress` percentage) and persists the job.
    pub async fn update(&self, processed_items: u64, total_items: u64) {
        let mut jobs = self.jobs.lock().await;
        if let Some(job) = jobs.get_mut(&self.job_id) {
            job.update_progress(processed_items, total_items);
            let _ = persist_job(&self.state_dir, job).await;
        }
    }
}

#[derive(Default, Clone)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    pub job_type: Option<JobType>,
    pub created_by: Option<String>,
}

pub struct JobManager {
    jobs: Arc<Mutex<HashMap<String, Job>>>,
    tokens: Arc<Mutex<HashMap<String, CancellationToken>>>,
    state_dir: PathBuf,
}

impl JobManager {
    pub fn new(state_dir: PathBuf) -> Self {
        Self {
            jobs: Arc::new(Mutex::new(HashMap::new())),
            tokens: Arc::new(Mutex::new(HashMap::new())),
            state_dir,
        }
    }

    /// Loads every persisted job file under `state_dir/jobs/`. Any job whose
    /// persisted status was `running` is transitioned to `failed` (its
    /// worker is gone) and re-persisted; `queued` jobs are loaded as-is and
    /// are not auto-resubmitted.
    pub async fn recover(&self) -> anyhow::Result<()> {
        let dir = self.jobs_dir();
        if fs::metadata(&dir).await.is_err() {
            return Ok(());
        }
        let mut entries = fs::read_dir(&dir).await?;
        let mut jobs = self.jobs.lock().await;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let bytes = fs::read(&path).await?;
            let mut job: Job = match serde_json::from_slice(&bytes) {
                Ok(j) => j,
                Err(e) => {
                    tracing::warn!(error = %e, path = %path.display(), "skipping unreadable job file");
                    continue;
                }
            };
            if job.status == JobStatus::Running {
                job.fail(RESTART_FAILURE_MESSAGE.to_string());
                self.persist(&job).await?;
            }
            jobs.insert(job.job_id.clone(), job);
        }
        Ok(())
    }

    /// Creates a new `queued` job and persists it.
    pub async fn create(&self, job_type: JobType, params: Value, created_by: Option<String>) -> anyhow::Result<Job> {
        let job = Job::new(crate::ids::new_job_id(), job_type, params, created_by);
        self.persist(&job).await?;
        self.jobs.lock().await.insert(job.job_id.clone(), job.clone());
        Ok(job)
    }

    /// Launches `task` against `job`: transitions `queued -> running`,
    /// persists, then on completion captures the result/error and
    /// transitions to `completed`/`failed`, persisting again. A cancellation
    /// observed mid-flight leaves the job in whatever state [`cancel`]
    /// already set.
    pub async fn submit<F>(&self, mut job: Job, task: F)
    where
        F: FnOnce(CancellationToken, ProgressHandle) -> JobTask + Send + 'static,
    {
        let job_id = job.job_id.clone();
        job.start();
        let _ = self.persist(&job).await;
        self.jobs.lock().await.insert(job_id.clone(), job);

        let token = CancellationToken::new();
        self.tokens.lock().await.insert(job_id.clone(), token.clone());

        let jobs = self.jobs.clone();
        let state_dir = self.state_dir.clone();
        let progress = ProgressHandle {
            jobs: jobs.clone(),
            state_dir: state_dir.clone(),
            job_id: job_id.clone(),
        };
        let fut = task(token.clone(), progress);

        tokio::spawn(async move {
            let outcome = tokio::select! {
                res = fut => Some(res),
                _ = token.cancelled() => None,
            };

            let mut guard = jobs.lock().await;
            let Some(job) = guard.get_mut(&job_id) else { return };
            match outcome {
                Some(Ok(result)) => job.complete(result),
                Some(Err(e)) => job.fail(e.to_string()),
                None => {}
            }
            let _ = persist_job(&state_dir, job).await;
        });
    }

    pub async fn get(&self, job_id: &str) -> Option<Job> {
        self.jobs.lock().await.get(job_id).cloned()
    }

    pub async fn list(&self, filter: &JobFilter) -> Vec<Job> {
        self.jobs
            .lock()
            .await
            .values()
            .filter(|j| filter.status.map(|s| j.status == s).unwrap_or(true))
            .filter(|j| filter.job_type.map(|t| j.job_type == t).unwrap_or(true))
            .filter(|j| {
                filter
                    .created_by
                    .as_ref()
                    .map(|who| j.created_by.as_deref() == Some(who.as_str()))
                    .unwrap_or(true)
            })
            .cloned()
            .collect()
    }

    /// Cancels a job if it is not already terminal. Best-effort interrupts
    /// the worker via its cancellation token.
    pub async fn cancel(&self, job_id: &str) -> anyhow::Result<bool> {
        let mut jobs = self.jobs.lock().await;
        let Some(job) = jobs.get_mut(job_id) else {
            return Ok(false);
        };
        if !job.cancel() {
            return Ok(false);
        }
        persist_job(&self.state_dir, job).await?;
        drop(jobs);

        if let Some(token) = self.tokens.lock().await.get(job_id) {
            token.cancel();
        }
        Ok(true)
    }

    /// Removes terminal jobs whose `completed_at` is older than
    /// `max_age_hours`, deleting their persisted files too. Returns the
    /// number removed.
    pub async fn cleanup(&self, max_age_hours: i64) -> anyhow::Result<usize> {
        let cutoff = chrono::Utc::now() - chrono::Duration::hours(max_age_hours);
        let mut jobs = self.jobs.lock().await;
        let stale: Vec<String> = jobs
            .values()
            .filter(|j| j.status.is_terminal())
            .filter(|j| j.completed_at.map(|t| t < cutoff).unwrap_or(false))
            .map(|j| j.job_id.clone())
            .collect();

        for id in &stale {
            jobs.remove(id);
            let path = self.job_path(id);
            if fs::metadata(&path).await.is_ok() {
                fs::remove_file(&path).await?;
            }
        }
        Ok(stale.len())
    }

    fn jobs_dir(&self) -> PathBuf {
        self.state_dir.join("jobs")
    }

    fn job_path(&self, job_id: &str) -> PathBuf {
        self.jobs_dir().join(format!("{job_id}.json"))
    }

    async fn persist(&self, job: &Job) -> anyhow::Result<()> {
        persist_job(&self.state_dir, job).await
    }
}

/// Serializes `job` to its file under `state_dir/jobs/`, writing to a
/// temporary path first and renaming into place so readers never observe a
/// partial write.
async fn persist_job(state_dir: &Path, job: &Job) -> anyhow::Result<()> {
    let dir = state_dir.join("jobs");
    fs::create_dir_all(&dir).await?;
    let final_path = dir.join(format!("{}.json", job.job_id));
    let tmp_path = dir.join(format!("{}.json.tmp", job.job_id));
    let bytes = serde_json::to_vec_pretty(job)?;
    fs::write(&tmp_path, &bytes).await?;
    fs::rename(&tmp_path, &final_path).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn create_persists_a_queued_job() {
        let dir = tempfile::tempdir().unwrap();
        let manager = JobManager::new(dir.path().to_path_buf());
        let job = manager.create(JobType::ProcessDocument, json!({}), None).await.unwrap();
        assert_eq!(job.status, JobStatus::Queued);
        assert!(dir.path().join("jobs").join(format!("{}.json", job.job_id)).exists());
    }

    #[tokio::test]
    async fn submit_runs_task_to_completion() {
        let dir = tempfile::tempdir().unwrap();
        let manager = JobManager::new(dir.path().to_path_buf());
        let job = manager.create(JobType::ProcessDocument, json!({}), None).await.unwrap();
        let job_id = job.job_id.clone();

        manager
            .submit(job, |_token, _progress| Box::pin(async { Ok(json!({"ok": true})) }))
            .await;

        // Give the spawned task a chance to run.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let finished = manager.get(&job_id).await.unwrap();
        assert_eq!(finished.status, JobStatus::Completed);
        assert_eq!(finished.result, Some(json!({"ok": true})));
    }

    #[tokio::test]
    async fn submit_records_failure() {
        let dir = tempfile::tempdir().unwrap();
        let manager = JobManager::new(dir.path().to_path_buf());
        let job = manager.create(JobType::ProcessDocument, json!({}), None).await.unwrap();
        let job_id = job.job_id.clone();

        manager
            .submit(job, |_token, _progress| Box::pin(async { anyhow::bail!("boom") }))
            .await;

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let finished = manager.get(&job_id).await.unwrap();
        assert_eq!(finished.status, JobStatus::Failed);
        assert_eq!(finished.error.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn cancel_is_rejected_for_terminal_jobs() {
        let dir = tempfile::tempdir().unwrap();
        let manager = JobManager::new(dir.path().to_path_buf());
        let job = manager.create(JobType::ProcessDocument, json!({}), None).await.unwrap();
        let job_id = job.job_id.clone();
        manager.submit(job, |_token, _progress| Box::pin(async { Ok(json!(null)) })).await;
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        assert!(!manager.cancel(&job_id).await.unwrap());
    }

    #[tokio::test]
    async fn recover_fails_jobs_left_running() {
        let dir = tempfile::tempdir().unwrap();
        let mut job = Job::new("job-stale".to_string(), JobType::ProcessFolder, json!({}), None);
        job.start();
        persist_job(dir.path(), &job).await.unwrap();

        let manager = JobManager::new(dir.path().to_path_buf());
        manager.recover().await.unwrap();

        let recovered = manager.get("job-stale").await.unwrap();
        assert_eq!(recovered.status, JobStatus::Failed);
        assert_eq!(recovered.error.as_deref(), Some(RESTART_FAILURE_MESSAGE));
    }
}
