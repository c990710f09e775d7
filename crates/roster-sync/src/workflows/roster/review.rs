use super::domain::{
    ContractorId, ContractorRecord, ContractorStatus, NewReviewEntry, ReviewDecision,
    ReviewEntryId, ReviewQueueEntry, ReviewResolution, UserId,
};
use super::repository::{RepositoryError, RosterStore};
use chrono::Utc;
use serde::Serialize;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{info, warn};

pub const MANUAL_REMOVAL_REASON: &str = "Manual deletion request";

/// Unresolved queue entry joined with the contractor it refers to.
#[derive(Debug, Clone, Serialize)]
pub struct PendingReview {
    pub entry: ReviewQueueEntry,
    pub contractor: ContractorRecord,
}

/// Human keep/remove decisions on contractors flagged by uploads or manual requests.
///
/// Services built through [`RosterSyncService::reviews`](super::service::RosterSyncService::reviews)
/// share that service's run lock; [`ReviewQueueService::new`] gets a lock of its own.
pub struct ReviewQueueService<S> {
    store: Arc<S>,
    run_lock: Arc<Mutex<()>>,
}

impl<S> ReviewQueueService<S>
where
    S: RosterStore + 'static,
{
    pub fn new(store: Arc<S>) -> Self {
        Self::with_run_lock(store, Arc::new(Mutex::new(())))
    }

    pub(super) fn with_run_lock(store: Arc<S>, run_lock: Arc<Mutex<()>>) -> Self {
        Self { store, run_lock }
    }

    /// Unresolved entries, newest first.
    pub fn pending(&self) -> Result<Vec<PendingReview>, ReviewError> {
        let mut entries = self.store.unresolved()?;
        entries.sort_by(|a, b| b.added_at.cmp(&a.added_at).then(b.id.cmp(&a.id)));

        let mut pending = Vec::with_capacity(entries.len());
        for entry in entries {
            match self.store.fetch(entry.contractor_id)? {
                Some(contractor) => pending.push(PendingReview { entry, contractor }),
                None => warn!(
                    entry_id = entry.id.0,
                    contractor_id = entry.contractor_id.0,
                    "review entry references a missing contractor"
                ),
            }
        }
        Ok(pending)
    }

    pub fn pending_count(&self) -> Result<usize, ReviewError> {
        Ok(self.store.unresolved()?.len())
    }

    pub fn resolve(
        &self,
        entry_id: ReviewEntryId,
        decision: ReviewDecision,
        actor: UserId,
    ) -> Result<ReviewQueueEntry, ReviewError> {
        let _guard = self.run_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = self
            .store
            .fetch_entry(entry_id)?
            .ok_or(ReviewError::NotFound(entry_id))?;
        if entry.is_resolved() {
            return Err(ReviewError::AlreadyResolved(entry_id));
        }

        let status = match decision {
            ReviewDecision::Remove => {
                if self.store.fetch(entry.contractor_id)?.is_none() {
                    return Err(ReviewError::ContractorNotFound(entry.contractor_id));
                }
                Some(ContractorStatus::Inactive)
            }
            ReviewDecision::Keep | ReviewDecision::Modify => None,
        };

        let resolution = ReviewResolution {
            action: decision.action(),
            reviewed_at: Utc::now(),
            reviewed_by: actor,
        };
        let resolved = self
            .store
            .resolve_review(entry_id, resolution, status)
            .map_err(|err| match err {
                RepositoryError::Conflict(_) => ReviewError::AlreadyResolved(entry_id),
                RepositoryError::NotFound => ReviewError::NotFound(entry_id),
                other => ReviewError::Repository(other),
            })?;

        info!(
            entry_id = entry_id.0,
            contractor_id = resolved.contractor_id.0,
            action = decision.action().label(),
            "review entry resolved"
        );
        Ok(resolved)
    }

    /// Queues a contractor for removal review; an existing open entry is returned as-is.
    pub fn request_removal(
        &self,
        contractor_id: ContractorId,
        actor: UserId,
    ) -> Result<ReviewQueueEntry, ReviewError> {
        let _guard = self.run_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if self.store.fetch(contractor_id)?.is_none() {
            return Err(ReviewError::ContractorNotFound(contractor_id));
        }
        if let Some(existing) = self.store.unresolved_for(contractor_id)? {
            return Ok(existing);
        }

        let entry = self.store.enqueue(NewReviewEntry {
            contractor_id,
            reason: MANUAL_REMOVAL_REASON.to_string(),
            added_at: Utc::now(),
            added_by: actor,
        })?;
        info!(
            entry_id = entry.id.0,
            contractor_id = contractor_id.0,
            "manual removal queued for review"
        );
        Ok(entry)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReviewError {
    #[error("review entry {0} not found")]
    NotFound(ReviewEntryId),
    #[error("review entry {0} was already resolved")]
    AlreadyResolved(ReviewEntryId),
    #[error("contractor {0} not found")]
    ContractorNotFound(ContractorId),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
