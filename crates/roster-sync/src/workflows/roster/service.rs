use super::domain::{NewUploadRun, RunSummary, UploadRun, UserId};
use super::normalizer::sanitize_filename;
use super::parser::{self, FeedRow};
use super::reconcile::reconcile;
use super::repository::{RepositoryError, RosterStore};
use super::review::ReviewQueueService;
use super::unit_of_work::UnitOfWork;
use super::IngestionError;
use chrono::{DateTime, Utc};
use std::io::Read;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{error, info};

/// Entry point for roster uploads. Each call produces exactly one upload run record.
pub struct RosterSyncService<S> {
    store: Arc<S>,
    // Held for a whole run and for every review write, so reviews never land between a
    // run's reads and its commit within this process.
    run_lock: Arc<Mutex<()>>,
}

impl<S> RosterSyncService<S>
where
    S: RosterStore + 'static,
{
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            run_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Review queue over the same store, serialized against this service's runs.
    pub fn reviews(&self) -> ReviewQueueService<S> {
        ReviewQueueService::with_run_lock(self.store.clone(), self.run_lock.clone())
    }

    pub fn process_path<P: AsRef<Path>>(
        &self,
        path: P,
        actor: UserId,
    ) -> Result<RunSummary, IngestionError> {
        let path = path.as_ref();
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        match std::fs::File::open(path) {
            Ok(file) => self.process_upload(&filename, file, actor),
            Err(err) => {
                let err = IngestionError::from(err);
                let _guard = self.run_lock.lock().unwrap_or_else(PoisonError::into_inner);
                self.record_failure(&sanitize_filename(&filename), actor, Utc::now(), &err);
                Err(err)
            }
        }
    }

    /// Parses a CSV upload and reconciles it against the store.
    pub fn process_upload<R: Read>(
        &self,
        filename: &str,
        reader: R,
        actor: UserId,
    ) -> Result<RunSummary, IngestionError> {
        let _guard = self.run_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let filename = sanitize_filename(filename);
        let started_at = Utc::now();
        info!(%filename, actor = actor.0, "roster upload started");

        let outcome = parser::parse_feed(reader)
            .map_err(IngestionError::from)
            .and_then(|feed| self.apply(&filename, &feed, actor, started_at));
        self.finish(&filename, actor, started_at, outcome)
    }

    /// Reconciles rows that were already parsed by the caller.
    pub fn reconcile_feed(
        &self,
        filename: &str,
        feed: &[FeedRow],
        actor: UserId,
    ) -> Result<RunSummary, IngestionError> {
        let _guard = self.run_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let filename = sanitize_filename(filename);
        let started_at = Utc::now();
        info!(%filename, actor = actor.0, rows = feed.len(), "roster reconciliation started");

        let outcome = self.apply(&filename, feed, actor, started_at);
        self.finish(&filename, actor, started_at, outcome)
    }

    pub fn recent_runs(&self, limit: usize) -> Result<Vec<UploadRun>, RepositoryError> {
        self.store.recent_runs(limit)
    }

    fn apply(
        &self,
        filename: &str,
        feed: &[FeedRow],
        actor: UserId,
        started_at: DateTime<Utc>,
    ) -> Result<RunSummary, IngestionError> {
        let mut work = UnitOfWork::new();
        let summary = reconcile(feed, actor, self.store.as_ref(), &mut work, started_at)?;
        let run = NewUploadRun::completed(filename, actor, started_at, summary);
        let run = self.store.commit(work, run)?;
        Ok(run.summary.unwrap_or(summary))
    }

    fn finish(
        &self,
        filename: &str,
        actor: UserId,
        started_at: DateTime<Utc>,
        outcome: Result<RunSummary, IngestionError>,
    ) -> Result<RunSummary, IngestionError> {
        match outcome {
            Ok(summary) => {
                info!(
                    %filename,
                    processed = summary.processed,
                    added = summary.added,
                    updated = summary.updated,
                    queued = summary.queued,
                    "roster upload completed"
                );
                Ok(summary)
            }
            Err(err) => {
                self.record_failure(filename, actor, started_at, &err);
                Err(err)
            }
        }
    }

    fn record_failure(
        &self,
        filename: &str,
        actor: UserId,
        started_at: DateTime<Utc>,
        err: &IngestionError,
    ) {
        error!(%filename, error = %err, "roster upload failed");
        let run = NewUploadRun::failed(filename, actor, started_at, err.to_string());
        if let Err(audit_err) = self.store.record_run(run) {
            error!(%filename, error = %audit_err, "could not record failed roster upload");
        }
    }
}
