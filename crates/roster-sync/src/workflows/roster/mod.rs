//! Contractor roster reconciliation.
//!
//! An upload is parsed into [`FeedRow`]s, classified against a snapshot of stored
//! contractors by [`reconcile`], and committed through [`RosterStore::commit`] as one unit
//! together with its [`UploadRun`] audit record. Contractors missing from the feed are
//! routed to the review queue instead of being removed.

pub mod domain;
mod mapping;
pub mod memory;
mod normalizer;
pub mod parser;
pub mod reconcile;
pub mod repository;
pub mod review;
pub mod router;
pub mod service;
pub mod unit_of_work;

pub use domain::{
    ContractorId, ContractorProfile, ContractorRecord, ContractorStatus, NewContractor,
    NewReviewEntry, NewUploadRun, ReviewAction, ReviewDecision, ReviewEntryId, ReviewQueueEntry,
    ReviewResolution, RunSummary, UploadRun, UploadRunId, UploadStatus, UserId,
};
pub use mapping::{RowError, RowOutcome};
pub use memory::{InMemoryRosterStore, RosterSnapshot, SnapshotError};
pub use normalizer::{parse_date, parse_decimal, parse_service_days, sanitize_filename};
pub use parser::{parse_feed, FeedRow};
pub use reconcile::{reconcile, ABSENT_FROM_UPLOAD_REASON};
pub use repository::{
    ContractorRepository, RepositoryError, ReviewQueueRepository, RosterStore,
    UploadRunRepository,
};
pub use review::{PendingReview, ReviewError, ReviewQueueService, MANUAL_REMOVAL_REASON};
pub use router::{roster_router, RosterApi};
pub use service::RosterSyncService;
pub use unit_of_work::{StagedUpdate, UnitOfWork};

/// Failure that aborts a whole reconciliation run.
#[derive(Debug)]
pub enum IngestionError {
    Io(std::io::Error),
    Feed(csv::Error),
    Repository(RepositoryError),
}

impl std::fmt::Display for IngestionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IngestionError::Io(err) => write!(f, "failed to read roster upload: {}", err),
            IngestionError::Feed(err) => write!(f, "invalid roster CSV data: {}", err),
            IngestionError::Repository(err) => {
                write!(f, "could not apply roster upload to the record store: {}", err)
            }
        }
    }
}

impl std::error::Error for IngestionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            IngestionError::Io(err) => Some(err),
            IngestionError::Feed(err) => Some(err),
            IngestionError::Repository(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for IngestionError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for IngestionError {
    fn from(err: csv::Error) -> Self {
        Self::Feed(err)
    }
}

impl From<RepositoryError> for IngestionError {
    fn from(err: RepositoryError) -> Self {
        Self::Repository(err)
    }
}
