// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-memory job store: the sole owner of `Job` records. Other components
// (the pipeline, the IPP handlers) hold only a `JobId` and call back into
// the store's ID-based mutation primitives -- no back-references, so the
// pipeline never needs a lock on anything but the store itself.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use thermal_core::error::{Result, ThermalError};
use thermal_core::types::{DocumentFormat, Job, JobId, JobState, PrinterState};
use tokio::sync::{Mutex, RwLock};
use tokio::time::sleep;
use tracing::{debug, instrument};

/// Jobs are evicted this long after reaching a terminal state.
pub const JOB_RETENTION: Duration = Duration::from_secs(300);

#[derive(Debug, Default)]
struct Inner {
    jobs: HashMap<JobId, Job>,
}

/// Thread-safe in-memory store for print jobs.
///
/// Cloning a `JobStore` is cheap; every clone shares the same underlying
/// map. No persistence -- jobs do not survive a restart.
#[derive(Clone)]
pub struct JobStore {
    inner: Arc<RwLock<Inner>>,
    next_id: Arc<Mutex<i32>>,
}

impl Default for JobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl JobStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner::default())),
            next_id: Arc::new(Mutex::new(0)),
        }
    }

    /// Allocate the next monotonic job id and insert a new pending job.
    /// Ids are never reused within a process lifetime.
    #[instrument(skip(self, document_bytes))]
    pub async fn accept(
        &self,
        name: String,
        requesting_user_name: String,
        format: DocumentFormat,
        document_bytes: bytes::Bytes,
    ) -> Job {
        let mut next_id = self.next_id.lock().await;
        *next_id += 1;
        let id = JobId(*next_id);
        drop(next_id);

        let job = Job::new(id, name, requesting_user_name, format, document_bytes);
        debug!(job_id = id.0, "job accepted");
        self.inner.write().await.jobs.insert(id, job.clone());
        job
    }

    /// Snapshot a single job by id (cheap clone; `document_bytes` is
    /// refcounted).
    pub async fn snapshot(&self, id: JobId) -> Option<Job> {
        self.inner.read().await.jobs.get(&id).cloned()
    }

    /// Snapshot every job currently known to the store, oldest first.
    pub async fn snapshot_all(&self) -> Vec<Job> {
        let inner = self.inner.read().await;
        let mut jobs: Vec<Job> = inner.jobs.values().cloned().collect();
        jobs.sort_by_key(|j| j.id);
        jobs
    }

    /// Transition a job to a new state, provided it is not already
    /// terminal. No-op (returns `Ok`) if the job is already terminal or
    /// missing, matching the pipeline's "no-op if not pending" contract at
    /// the call sites that need it.
    #[instrument(skip(self))]
    pub async fn transition(&self, id: JobId, state: JobState) -> Result<()> {
        let mut inner = self.inner.write().await;
        let job = inner
            .jobs
            .get_mut(&id)
            .ok_or_else(|| ThermalError::NotFound(format!("job {id} not found")))?;
        if job.state.is_terminal() {
            return Ok(());
        }
        job.transition(state);
        debug!(job_id = id.0, new_state = ?state, "job transitioned");
        Ok(())
    }

    /// Mark a job's error message without forcing a state transition (the
    /// pipeline sets both together via [`Self::transition`] followed by
    /// this, or a caller may prefer a single read-modify-write).
    pub async fn set_error(&self, id: JobId, error: String) {
        if let Some(job) = self.inner.write().await.jobs.get_mut(&id) {
            job.error = Some(error);
        }
    }

    /// Cancel a job. Fails with `NotFound` if the job is unknown and
    /// `NotPossible` if it is already terminal; otherwise transitions it
    /// to `Canceled` immediately, even mid-`Processing`.
    ///
    /// The pipeline does not learn of this synchronously -- it observes
    /// the cancellation cooperatively at its own checkpoints (before
    /// converting, before the device mutex, after each device-write
    /// burst) and abandons further work once it sees the job has gone
    /// terminal without its help.
    #[instrument(skip(self))]
    pub async fn cancel(&self, id: JobId) -> Result<()> {
        let mut inner = self.inner.write().await;
        let job = inner
            .jobs
            .get_mut(&id)
            .ok_or_else(|| ThermalError::NotFound(format!("job {id} not found")))?;
        if job.state.is_terminal() {
            return Err(ThermalError::NotPossible(format!(
                "job {id} is already in a terminal state"
            )));
        }
        job.transition(JobState::Canceled);
        Ok(())
    }

    /// Whether a job is flagged canceled -- checked at the pipeline's
    /// cooperative checkpoints before conversion and before the device
    /// write.
    pub async fn is_canceled(&self, id: JobId) -> bool {
        matches!(
            self.inner.read().await.jobs.get(&id).map(|j| j.state),
            Some(JobState::Canceled)
        )
    }

    /// Count of non-terminal jobs (`queued-job-count`, spec §6.2).
    pub async fn queued_job_count(&self) -> u32 {
        self.inner
            .read()
            .await
            .jobs
            .values()
            .filter(|j| !j.state.is_terminal())
            .count() as u32
    }

    /// Derived printer state: `processing` iff at least one job is
    /// currently `Processing`, else `idle`. `stopped` is only set by
    /// operator action and is out of scope here.
    pub async fn printer_state(&self) -> PrinterState {
        let processing = self
            .inner
            .read()
            .await
            .jobs
            .values()
            .any(|j| j.state == JobState::Processing);
        if processing { PrinterState::Processing } else { PrinterState::Idle }
    }

    /// Spawn a background eviction for a terminal job after the retention
    /// window. Safe to call more than once for the same job; eviction
    /// itself is idempotent (a missing key is simply a no-op remove).
    pub fn schedule_eviction(&self, id: JobId) {
        let store = self.clone();
        tokio::spawn(async move {
            sleep(JOB_RETENTION).await;
            store.inner.write().await.jobs.remove(&id);
            debug!(job_id = id.0, "job evicted after retention window");
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn doc() -> Bytes {
        Bytes::from_static(b"hello")
    }

    #[tokio::test]
    async fn ids_are_monotonic_and_unique() {
        let store = JobStore::new();
        let a = store.accept("a".into(), "u".into(), DocumentFormat::Pdf, doc()).await;
        let b = store.accept("b".into(), "u".into(), DocumentFormat::Pdf, doc()).await;
        assert_eq!(a.id, JobId(1));
        assert_eq!(b.id, JobId(2));
    }

    #[tokio::test]
    async fn cancel_pending_job_transitions_to_canceled() {
        let store = JobStore::new();
        let job = store.accept("a".into(), "u".into(), DocumentFormat::Pdf, doc()).await;
        store.cancel(job.id).await.unwrap();
        let snap = store.snapshot(job.id).await.unwrap();
        assert_eq!(snap.state, JobState::Canceled);
    }

    #[tokio::test]
    async fn cancel_processing_job_still_transitions_to_canceled() {
        let store = JobStore::new();
        let job = store.accept("a".into(), "u".into(), DocumentFormat::Pdf, doc()).await;
        store.transition(job.id, JobState::Processing).await.unwrap();
        store.cancel(job.id).await.unwrap();
        let snap = store.snapshot(job.id).await.unwrap();
        assert_eq!(snap.state, JobState::Canceled);
    }

    #[tokio::test]
    async fn cancel_terminal_job_fails() {
        let store = JobStore::new();
        let job = store.accept("a".into(), "u".into(), DocumentFormat::Pdf, doc()).await;
        store.transition(job.id, JobState::Completed).await.unwrap();
        assert!(store.cancel(job.id).await.is_err());
    }

    #[tokio::test]
    async fn terminal_job_never_transitions_again() {
        let store = JobStore::new();
        let job = store.accept("a".into(), "u".into(), DocumentFormat::Pdf, doc()).await;
        store.transition(job.id, JobState::Processing).await.unwrap();
        store.transition(job.id, JobState::Completed).await.unwrap();
        store.transition(job.id, JobState::Processing).await.unwrap();
        let snap = store.snapshot(job.id).await.unwrap();
        assert_eq!(snap.state, JobState::Completed);
    }

    #[tokio::test]
    async fn queued_job_count_excludes_terminal_jobs() {
        let store = JobStore::new();
        let a = store.accept("a".into(), "u".into(), DocumentFormat::Pdf, doc()).await;
        let _b = store.accept("b".into(), "u".into(), DocumentFormat::Pdf, doc()).await;
        store.transition(a.id, JobState::Processing).await.unwrap();
        store.transition(a.id, JobState::Completed).await.unwrap();
        assert_eq!(store.queued_job_count().await, 1);
    }

    #[tokio::test]
    async fn printer_state_reflects_processing_jobs() {
        let store = JobStore::new();
        let job = store.accept("a".into(), "u".into(), DocumentFormat::Pdf, doc()).await;
        assert_eq!(store.printer_state().await, PrinterState::Idle);
        store.transition(job.id, JobState::Processing).await.unwrap();
        assert_eq!(store.printer_state().await, PrinterState::Processing);
    }
}
