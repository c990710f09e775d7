use super::domain::{
    ContractorId, ContractorRecord, ContractorStatus, NewContractor, NewReviewEntry, NewUploadRun,
    ReviewEntryId, ReviewQueueEntry, ReviewResolution, UploadRun,
};
use super::unit_of_work::UnitOfWork;

/// Contractor table access used by the reconciliation engine.
pub trait ContractorRepository: Send + Sync {
    fn fetch(&self, id: ContractorId) -> Result<Option<ContractorRecord>, RepositoryError>;
    fn find_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<ContractorRecord>, RepositoryError>;
    /// Every contractor carrying a non-empty external identifier.
    fn with_external_id(&self) -> Result<Vec<ContractorRecord>, RepositoryError>;
    fn by_status(&self, status: ContractorStatus) -> Result<Vec<ContractorRecord>, RepositoryError>;
    fn insert(&self, contractor: NewContractor) -> Result<ContractorRecord, RepositoryError>;
    fn update(&self, record: ContractorRecord) -> Result<(), RepositoryError>;
}

pub trait ReviewQueueRepository: Send + Sync {
    fn fetch_entry(&self, id: ReviewEntryId) -> Result<Option<ReviewQueueEntry>, RepositoryError>;
    fn unresolved_for(
        &self,
        contractor: ContractorId,
    ) -> Result<Option<ReviewQueueEntry>, RepositoryError>;
    fn unresolved(&self) -> Result<Vec<ReviewQueueEntry>, RepositoryError>;
    /// Fails with [`RepositoryError::Conflict`] when the contractor already has an
    /// unresolved entry.
    fn enqueue(&self, entry: NewReviewEntry) -> Result<ReviewQueueEntry, RepositoryError>;
}

/// Append-only audit log of reconciliation runs.
pub trait UploadRunRepository: Send + Sync {
    fn record_run(&self, run: NewUploadRun) -> Result<UploadRun, RepositoryError>;
    /// Newest first.
    fn recent_runs(&self, limit: usize) -> Result<Vec<UploadRun>, RepositoryError>;
}

/// Store offering the cross-table writes that must land atomically.
pub trait RosterStore: ContractorRepository + ReviewQueueRepository + UploadRunRepository {
    /// Applies every staged change plus the run record, or nothing at all.
    ///
    /// A staged update whose stored row changed after it was read fails the whole commit
    /// with [`RepositoryError::Conflict`]. Staged review entries for contractors that were
    /// queued in the meantime are dropped, and the run's `queued` count is lowered to match.
    fn commit(&self, work: UnitOfWork, run: NewUploadRun) -> Result<UploadRun, RepositoryError>;

    /// Closes a queue entry. When `status` is set, the contractor's stored row is moved to
    /// it in the same write; every other field is left as the store currently holds it.
    fn resolve_review(
        &self,
        id: ReviewEntryId,
        resolution: ReviewResolution,
        status: Option<ContractorStatus>,
    ) -> Result<ReviewQueueEntry, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("record conflicts with existing data: {0}")]
    Conflict(String),
    #[error("record not found")]
    NotFound,
    #[error("record rejected: {0}")]
    Invalid(String),
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
