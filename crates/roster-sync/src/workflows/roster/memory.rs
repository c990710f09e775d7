//! Mutex-guarded in-memory roster store with JSON snapshots.
//!
//! Every multi-table write validates against the current tables before touching them, so a
//! rejected commit leaves the store exactly as it was.

use super::domain::{
    ContractorId, ContractorProfile, ContractorRecord, ContractorStatus, NewContractor,
    NewReviewEntry, NewUploadRun, ReviewEntryId, ReviewQueueEntry, ReviewResolution, UploadRun,
    UploadRunId,
};
use super::repository::{
    ContractorRepository, RepositoryError, ReviewQueueRepository, RosterStore, UploadRunRepository,
};
use super::unit_of_work::{StagedUpdate, UnitOfWork};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// Serializable copy of every table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterSnapshot {
    pub contractors: Vec<ContractorRecord>,
    pub review_queue: Vec<ReviewQueueEntry>,
    pub upload_runs: Vec<UploadRun>,
}

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("snapshot io failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

#[derive(Debug, Default)]
struct Tables {
    contractors: BTreeMap<ContractorId, ContractorRecord>,
    review_queue: BTreeMap<ReviewEntryId, ReviewQueueEntry>,
    upload_runs: Vec<UploadRun>,
    last_contractor_id: u64,
    last_review_id: u64,
    last_run_id: u64,
}

impl Tables {
    fn next_contractor_id(&mut self) -> ContractorId {
        self.last_contractor_id += 1;
        ContractorId(self.last_contractor_id)
    }

    fn next_review_id(&mut self) -> ReviewEntryId {
        self.last_review_id += 1;
        ReviewEntryId(self.last_review_id)
    }

    fn append_run(&mut self, run: NewUploadRun) -> UploadRun {
        self.last_run_id += 1;
        let run = run.into_run(UploadRunId(self.last_run_id));
        self.upload_runs.push(run.clone());
        run
    }

    fn external_id_owner(&self, external_id: &str) -> Option<ContractorId> {
        self.contractors
            .values()
            .find(|record| record.profile.external_id.as_deref() == Some(external_id))
            .map(|record| record.id)
    }

    fn has_unresolved(&self, contractor: ContractorId) -> bool {
        self.review_queue
            .values()
            .any(|entry| entry.contractor_id == contractor && !entry.is_resolved())
    }

    fn validate_insert(&self, contractor: &NewContractor) -> Result<(), RepositoryError> {
        validate_profile(&contractor.profile)?;
        if let Some(external_id) = contractor.profile.external_id.as_deref() {
            if self.external_id_owner(external_id).is_some() {
                return Err(RepositoryError::Conflict(format!(
                    "talent id '{external_id}' already exists"
                )));
            }
        }
        Ok(())
    }

    fn validate_update(&self, record: &ContractorRecord) -> Result<(), RepositoryError> {
        validate_profile(&record.profile)?;
        if !self.contractors.contains_key(&record.id) {
            return Err(RepositoryError::NotFound);
        }
        if let Some(external_id) = record.profile.external_id.as_deref() {
            if matches!(self.external_id_owner(external_id), Some(owner) if owner != record.id) {
                return Err(RepositoryError::Conflict(format!(
                    "talent id '{external_id}' already exists"
                )));
            }
        }
        Ok(())
    }

    fn validate_entry(&self, entry: &NewReviewEntry) -> Result<(), RepositoryError> {
        if !self.contractors.contains_key(&entry.contractor_id) {
            return Err(RepositoryError::NotFound);
        }
        if self.has_unresolved(entry.contractor_id) {
            return Err(RepositoryError::Conflict(format!(
                "contractor {} already awaiting review",
                entry.contractor_id
            )));
        }
        Ok(())
    }

    fn validate_staged(&self, staged: &StagedUpdate) -> Result<(), RepositoryError> {
        self.validate_update(&staged.record)?;
        match self.contractors.get(&staged.record.id) {
            Some(current) if current.updated_at != staged.read_at => {
                Err(RepositoryError::Conflict(format!(
                    "contractor {} changed after the upload read it",
                    staged.record.id
                )))
            }
            _ => Ok(()),
        }
    }

    fn validate_work(
        &self,
        inserts: &[NewContractor],
        updates: &[StagedUpdate],
        entries: &[NewReviewEntry],
    ) -> Result<(), RepositoryError> {
        let mut batch_ids = HashSet::new();
        for contractor in inserts {
            self.validate_insert(contractor)?;
            if let Some(external_id) = contractor.profile.external_id.as_deref() {
                if !batch_ids.insert(external_id) {
                    return Err(RepositoryError::Conflict(format!(
                        "talent id '{external_id}' staged twice"
                    )));
                }
            }
        }
        for staged in updates {
            self.validate_staged(staged)?;
            if let Some(external_id) = staged.record.profile.external_id.as_deref() {
                if !batch_ids.insert(external_id) {
                    return Err(RepositoryError::Conflict(format!(
                        "talent id '{external_id}' staged twice"
                    )));
                }
            }
        }
        let mut queued = HashSet::new();
        for entry in entries {
            self.validate_entry(entry)?;
            if !queued.insert(entry.contractor_id) {
                return Err(RepositoryError::Conflict(format!(
                    "contractor {} queued twice",
                    entry.contractor_id
                )));
            }
        }
        Ok(())
    }
}

fn validate_profile(profile: &ContractorProfile) -> Result<(), RepositoryError> {
    if profile.name.trim().is_empty() {
        return Err(RepositoryError::Invalid("talent name is required".to_string()));
    }
    if profile.external_id.as_deref().is_some_and(str::is_empty) {
        return Err(RepositoryError::Invalid(
            "talent id must be absent rather than blank".to_string(),
        ));
    }
    if profile
        .spread_amount
        .is_some_and(|amount| amount.is_sign_negative() && !amount.is_zero())
    {
        return Err(RepositoryError::Invalid(
            "spread amount must not be negative".to_string(),
        ));
    }
    Ok(())
}

#[derive(Debug, Default, Clone)]
pub struct InMemoryRosterStore {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryRosterStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>, RepositoryError> {
        self.tables
            .lock()
            .map_err(|_| RepositoryError::Unavailable("roster store mutex poisoned".to_string()))
    }

    pub fn from_snapshot(snapshot: RosterSnapshot) -> Self {
        let mut tables = Tables {
            last_contractor_id: snapshot.contractors.iter().map(|r| r.id.0).max().unwrap_or(0),
            last_review_id: snapshot.review_queue.iter().map(|e| e.id.0).max().unwrap_or(0),
            last_run_id: snapshot.upload_runs.iter().map(|r| r.id.0).max().unwrap_or(0),
            ..Tables::default()
        };
        tables.contractors = snapshot
            .contractors
            .into_iter()
            .map(|record| (record.id, record))
            .collect();
        tables.review_queue = snapshot
            .review_queue
            .into_iter()
            .map(|entry| (entry.id, entry))
            .collect();
        tables.upload_runs = snapshot.upload_runs;

        Self {
            tables: Arc::new(Mutex::new(tables)),
        }
    }

    pub fn snapshot(&self) -> Result<RosterSnapshot, RepositoryError> {
        let tables = self.tables()?;
        Ok(RosterSnapshot {
            contractors: tables.contractors.values().cloned().collect(),
            review_queue: tables.review_queue.values().cloned().collect(),
            upload_runs: tables.upload_runs.clone(),
        })
    }

    /// Loads a snapshot file, starting empty when the file does not exist yet.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, SnapshotError> {
        match std::fs::read(path) {
            Ok(bytes) => Ok(Self::from_snapshot(serde_json::from_slice(&bytes)?)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(err.into()),
        }
    }

    /// Writes the snapshot to a sibling temp file and renames it over `path`, so a crash
    /// mid-write never leaves a truncated snapshot behind.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), SnapshotError> {
        let path = path.as_ref();
        let snapshot = self.snapshot()?;
        let json = serde_json::to_vec_pretty(&snapshot)?;

        let mut staging = path.as_os_str().to_owned();
        staging.push(".tmp");
        let staging = PathBuf::from(staging);
        std::fs::write(&staging, json)?;
        if let Err(err) = std::fs::rename(&staging, path) {
            let _ = std::fs::remove_file(&staging);
            return Err(err.into());
        }
        Ok(())
    }
}

impl ContractorRepository for InMemoryRosterStore {
    fn fetch(&self, id: ContractorId) -> Result<Option<ContractorRecord>, RepositoryError> {
        Ok(self.tables()?.contractors.get(&id).cloned())
    }

    fn find_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<ContractorRecord>, RepositoryError> {
        let tables = self.tables()?;
        Ok(tables
            .external_id_owner(external_id)
            .and_then(|id| tables.contractors.get(&id).cloned()))
    }

    fn with_external_id(&self) -> Result<Vec<ContractorRecord>, RepositoryError> {
        Ok(self
            .tables()?
            .contractors
            .values()
            .filter(|record| {
                record
                    .profile
                    .external_id
                    .as_deref()
                    .is_some_and(|id| !id.is_empty())
            })
            .cloned()
            .collect())
    }

    fn by_status(&self, status: ContractorStatus) -> Result<Vec<ContractorRecord>, RepositoryError> {
        Ok(self
            .tables()?
            .contractors
            .values()
            .filter(|record| record.profile.status == status)
            .cloned()
            .collect())
    }

    fn insert(&self, contractor: NewContractor) -> Result<ContractorRecord, RepositoryError> {
        let mut tables = self.tables()?;
        tables.validate_insert(&contractor)?;
        let id = tables.next_contractor_id();
        let record = contractor.into_record(id);
        tables.contractors.insert(id, record.clone());
        Ok(record)
    }

    fn update(&self, record: ContractorRecord) -> Result<(), RepositoryError> {
        let mut tables = self.tables()?;
        tables.validate_update(&record)?;
        tables.contractors.insert(record.id, record);
        Ok(())
    }
}

impl ReviewQueueRepository for InMemoryRosterStore {
    fn fetch_entry(&self, id: ReviewEntryId) -> Result<Option<ReviewQueueEntry>, RepositoryError> {
        Ok(self.tables()?.review_queue.get(&id).cloned())
    }

    fn unresolved_for(
        &self,
        contractor: ContractorId,
    ) -> Result<Option<ReviewQueueEntry>, RepositoryError> {
        Ok(self
            .tables()?
            .review_queue
            .values()
            .find(|entry| entry.contractor_id == contractor && !entry.is_resolved())
            .cloned())
    }

    fn unresolved(&self) -> Result<Vec<ReviewQueueEntry>, RepositoryError> {
        Ok(self
            .tables()?
            .review_queue
            .values()
            .filter(|entry| !entry.is_resolved())
            .cloned()
            .collect())
    }

    fn enqueue(&self, entry: NewReviewEntry) -> Result<ReviewQueueEntry, RepositoryError> {
        let mut tables = self.tables()?;
        tables.validate_entry(&entry)?;
        let id = tables.next_review_id();
        let entry = entry.into_entry(id);
        tables.review_queue.insert(id, entry.clone());
        Ok(entry)
    }
}

impl UploadRunRepository for InMemoryRosterStore {
    fn record_run(&self, run: NewUploadRun) -> Result<UploadRun, RepositoryError> {
        Ok(self.tables()?.append_run(run))
    }

    fn recent_runs(&self, limit: usize) -> Result<Vec<UploadRun>, RepositoryError> {
        Ok(self
            .tables()?
            .upload_runs
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect())
    }
}

impl RosterStore for InMemoryRosterStore {
    fn commit(&self, work: UnitOfWork, mut run: NewUploadRun) -> Result<UploadRun, RepositoryError> {
        let (inserts, updates, entries) = work.into_parts();
        let mut tables = self.tables()?;

        let (entries, superseded): (Vec<_>, Vec<_>) = entries
            .into_iter()
            .partition(|entry| !tables.has_unresolved(entry.contractor_id));
        tables.validate_work(&inserts, &updates, &entries)?;

        if !superseded.is_empty() {
            debug!(
                dropped = superseded.len(),
                "contractors were queued for review before the commit"
            );
            if let Some(summary) = run.summary.as_mut() {
                let dropped = u32::try_from(superseded.len()).unwrap_or(u32::MAX);
                summary.queued = summary.queued.saturating_sub(dropped);
            }
        }

        for contractor in inserts {
            let id = tables.next_contractor_id();
            tables.contractors.insert(id, contractor.into_record(id));
        }
        for staged in updates {
            tables.contractors.insert(staged.record.id, staged.record);
        }
        for entry in entries {
            let id = tables.next_review_id();
            tables.review_queue.insert(id, entry.into_entry(id));
        }

        Ok(tables.append_run(run))
    }

    fn resolve_review(
        &self,
        id: ReviewEntryId,
        resolution: ReviewResolution,
        status: Option<ContractorStatus>,
    ) -> Result<ReviewQueueEntry, RepositoryError> {
        let mut tables = self.tables()?;
        let contractor_id = match tables.review_queue.get(&id) {
            None => return Err(RepositoryError::NotFound),
            Some(entry) if entry.is_resolved() => {
                return Err(RepositoryError::Conflict(format!(
                    "review entry {id} already resolved"
                )))
            }
            Some(entry) => entry.contractor_id,
        };

        if let Some(status) = status {
            let record = tables
                .contractors
                .get_mut(&contractor_id)
                .ok_or(RepositoryError::NotFound)?;
            record.profile.status = status;
            record.updated_at = resolution.reviewed_at;
        }
        let entry = tables
            .review_queue
            .get_mut(&id)
            .ok_or(RepositoryError::NotFound)?;
        entry.resolution = Some(resolution);
        Ok(entry.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::roster::domain::{ReviewAction, RunSummary, UserId};
    use crate::workflows::roster::parser::FeedRow;
    use crate::workflows::roster::reconcile::reconcile;
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;

    fn new_contractor(name: &str, external_id: Option<&str>) -> NewContractor {
        let mut profile = ContractorProfile::named(name);
        profile.external_id = external_id.map(str::to_string);
        NewContractor {
            profile,
            created_at: Utc::now(),
            created_by: Some(UserId(1)),
        }
    }

    fn completed_run() -> NewUploadRun {
        NewUploadRun::completed("roster.csv", UserId(1), Utc::now(), RunSummary::default())
    }

    fn removal(at: chrono::DateTime<Utc>) -> ReviewResolution {
        ReviewResolution {
            action: ReviewAction::Removed,
            reviewed_at: at,
            reviewed_by: UserId(9),
        }
    }

    fn review_entry(contractor_id: ContractorId, reason: &str) -> NewReviewEntry {
        NewReviewEntry {
            contractor_id,
            reason: reason.to_string(),
            added_at: Utc::now(),
            added_by: UserId(1),
        }
    }

    fn feed(pairs: &[&[(&str, &str)]]) -> Vec<FeedRow> {
        pairs
            .iter()
            .map(|row| FeedRow::from_pairs(row.iter().copied()))
            .collect()
    }

    #[test]
    fn insert_rejects_duplicate_talent_ids() {
        let store = InMemoryRosterStore::new();
        store
            .insert(new_contractor("Jane", Some("T1")))
            .expect("first insert");

        let err = store
            .insert(new_contractor("Janet", Some("T1")))
            .expect_err("duplicate id rejected");
        assert!(matches!(err, RepositoryError::Conflict(_)));
    }

    #[test]
    fn rejected_commit_leaves_tables_untouched() {
        let store = InMemoryRosterStore::new();
        let existing = store
            .insert(new_contractor("Jane", Some("T1")))
            .expect("seed");

        let mut work = UnitOfWork::new();
        work.stage_insert(new_contractor("John", Some("T2")));
        let mut negative = new_contractor("Ann", Some("T3"));
        negative.profile.spread_amount = Some(Decimal::new(-1, 0));
        work.stage_insert(negative);
        work.stage_review(NewReviewEntry {
            contractor_id: existing.id,
            reason: "test".to_string(),
            added_at: Utc::now(),
            added_by: UserId(1),
        });

        let err = store.commit(work, completed_run()).expect_err("invalid batch");
        assert!(matches!(err, RepositoryError::Invalid(_)));

        let snapshot = store.snapshot().expect("snapshot");
        assert_eq!(snapshot.contractors, vec![existing]);
        assert!(snapshot.review_queue.is_empty());
        assert!(snapshot.upload_runs.is_empty());
    }

    #[test]
    fn commit_assigns_ids_and_records_the_run() {
        let store = InMemoryRosterStore::new();
        let mut work = UnitOfWork::new();
        work.stage_insert(new_contractor("Jane", Some("T1")));
        work.stage_insert(new_contractor("Walk In", None));

        let run = store.commit(work, completed_run()).expect("commit");

        assert_eq!(run.id, UploadRunId(1));
        let snapshot = store.snapshot().expect("snapshot");
        let ids: Vec<_> = snapshot.contractors.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![ContractorId(1), ContractorId(2)]);
        assert_eq!(
            store
                .find_by_external_id("T1")
                .expect("lookup")
                .map(|r| r.profile.name),
            Some("Jane".to_string())
        );
        assert_eq!(store.with_external_id().expect("query").len(), 1);
    }

    #[test]
    fn runs_are_listed_newest_first() {
        let store = InMemoryRosterStore::new();
        store.record_run(completed_run()).expect("first");
        store
            .record_run(NewUploadRun::failed("bad.csv", UserId(2), Utc::now(), "boom"))
            .expect("second");

        let runs = store.recent_runs(10).expect("runs");
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].filename, "bad.csv");
        assert_eq!(store.recent_runs(1).expect("runs").len(), 1);
    }

    #[test]
    fn snapshot_restores_id_sequences() {
        let store = InMemoryRosterStore::new();
        store.insert(new_contractor("Jane", Some("T1"))).expect("seed");

        let restored = InMemoryRosterStore::from_snapshot(store.snapshot().expect("snapshot"));
        let next = restored
            .insert(new_contractor("John", Some("T2")))
            .expect("insert after restore");

        assert_eq!(next.id, ContractorId(2));
    }

    #[test]
    fn commit_rejects_updates_to_rows_changed_after_reconcile() {
        let store = InMemoryRosterStore::new();
        let jane = store
            .insert(new_contractor("Jane", Some("T1")))
            .expect("seed");
        let entry = store
            .enqueue(review_entry(jane.id, "Manual deletion request"))
            .expect("enqueue");

        let mut work = UnitOfWork::new();
        let rows = feed(&[&[("Talent Name", "Jane Doe"), ("Talent ID", "T1")]]);
        let summary =
            reconcile(&rows, UserId(1), &store, &mut work, Utc::now()).expect("reconcile");
        assert_eq!(summary.updated, 1);

        store
            .resolve_review(
                entry.id,
                removal(Utc::now() + Duration::seconds(1)),
                Some(ContractorStatus::Inactive),
            )
            .expect("resolve");

        let run = NewUploadRun::completed("roster.csv", UserId(1), Utc::now(), summary);
        let err = store.commit(work, run).expect_err("stale update");
        assert!(matches!(err, RepositoryError::Conflict(_)));

        let stored = store.fetch(jane.id).expect("fetch").expect("jane stored");
        assert_eq!(stored.profile.status, ContractorStatus::Inactive);
        assert_eq!(stored.profile.name, "Jane");
        assert!(store.recent_runs(10).expect("runs").is_empty());
    }

    #[test]
    fn entries_queued_before_commit_are_dropped_from_the_run() {
        let store = InMemoryRosterStore::new();
        let john = store
            .insert(new_contractor("John", Some("T2")))
            .expect("seed");

        let mut work = UnitOfWork::new();
        let summary = reconcile(&[], UserId(1), &store, &mut work, Utc::now()).expect("reconcile");
        assert_eq!(summary.queued, 1);

        let manual = store
            .enqueue(review_entry(john.id, "Manual deletion request"))
            .expect("manual request");

        let run = NewUploadRun::completed("roster.csv", UserId(1), Utc::now(), summary);
        let run = store.commit(work, run).expect("commit still lands");

        assert_eq!(run.summary.map(|summary| summary.queued), Some(0));
        let open = store.unresolved().expect("queue");
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].id, manual.id);
    }

    #[test]
    fn resolving_keeps_fields_written_after_the_entry_was_read() {
        let store = InMemoryRosterStore::new();
        let jane = store
            .insert(new_contractor("Jane", Some("T1")))
            .expect("seed");
        let entry = store
            .enqueue(review_entry(jane.id, "Manual deletion request"))
            .expect("enqueue");

        let mut work = UnitOfWork::new();
        let rows = feed(&[&[("Talent Name", "Jane Doe"), ("Talent ID", "T1")]]);
        let summary =
            reconcile(&rows, UserId(1), &store, &mut work, Utc::now()).expect("reconcile");
        let run = NewUploadRun::completed("roster.csv", UserId(1), Utc::now(), summary);
        store.commit(work, run).expect("commit");

        let reviewed_at = Utc::now();
        store
            .resolve_review(entry.id, removal(reviewed_at), Some(ContractorStatus::Inactive))
            .expect("resolve");

        let stored = store.fetch(jane.id).expect("fetch").expect("jane stored");
        assert_eq!(stored.profile.name, "Jane Doe");
        assert_eq!(stored.profile.status, ContractorStatus::Inactive);
        assert_eq!(stored.updated_at, reviewed_at);
    }

    #[test]
    fn save_replaces_the_snapshot_without_leaving_a_staging_file() {
        let path = std::env::temp_dir().join(format!(
            "roster-sync-memory-save-{}.json",
            std::process::id()
        ));
        let staging = path.with_extension("json.tmp");
        let store = InMemoryRosterStore::new();
        store.insert(new_contractor("Jane", Some("T1"))).expect("seed");

        store.save(&path).expect("first save");
        store.insert(new_contractor("John", Some("T2"))).expect("seed");
        store.save(&path).expect("second save");

        let restored = InMemoryRosterStore::load(&path).expect("load");
        assert_eq!(restored.snapshot().expect("snapshot").contractors.len(), 2);
        assert!(!staging.exists());
        std::fs::remove_file(&path).expect("cleanup");
    }
}
