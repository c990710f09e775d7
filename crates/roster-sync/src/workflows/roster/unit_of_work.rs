use super::domain::{ContractorId, ContractorRecord, NewContractor, NewReviewEntry};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Replacement record plus the `updated_at` the stored row carried when it was read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedUpdate {
    pub record: ContractorRecord,
    pub read_at: DateTime<Utc>,
}

/// Changes staged by a reconciliation run. Nothing reaches the store until the owner
/// hands the unit to [`RosterStore::commit`](super::repository::RosterStore::commit);
/// dropping it discards every staged change.
#[derive(Debug, Default)]
pub struct UnitOfWork {
    inserts: Vec<NewContractor>,
    updates: BTreeMap<ContractorId, StagedUpdate>,
    review_entries: Vec<NewReviewEntry>,
}

impl UnitOfWork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage_insert(&mut self, contractor: NewContractor) {
        self.inserts.push(contractor);
    }

    /// Replaces any earlier staged update for the same contractor. The first `read_at`
    /// staged for a contractor is the one the commit checks against.
    pub fn stage_update(&mut self, record: ContractorRecord, read_at: DateTime<Utc>) {
        self.updates
            .entry(record.id)
            .and_modify(|staged| staged.record = record.clone())
            .or_insert(StagedUpdate { record, read_at });
    }

    pub fn stage_review(&mut self, entry: NewReviewEntry) {
        self.review_entries.push(entry);
    }

    /// Staged insert carrying `external_id`, if this run already created one.
    pub fn staged_insert_mut(&mut self, external_id: &str) -> Option<&mut NewContractor> {
        self.inserts
            .iter_mut()
            .find(|staged| staged.profile.external_id.as_deref() == Some(external_id))
    }

    pub fn inserts(&self) -> &[NewContractor] {
        &self.inserts
    }

    pub fn updates(&self) -> impl Iterator<Item = &ContractorRecord> {
        self.updates.values().map(|staged| &staged.record)
    }

    pub fn review_entries(&self) -> &[NewReviewEntry] {
        &self.review_entries
    }

    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty() && self.updates.is_empty() && self.review_entries.is_empty()
    }

    pub fn into_parts(
        self,
    ) -> (
        Vec<NewContractor>,
        Vec<StagedUpdate>,
        Vec<NewReviewEntry>,
    ) {
        (
            self.inserts,
            self.updates.into_values().collect(),
            self.review_entries,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::roster::domain::ContractorProfile;
    use chrono::Duration;

    fn record(name: &str, updated_at: DateTime<Utc>) -> ContractorRecord {
        ContractorRecord {
            id: ContractorId(1),
            profile: ContractorProfile::named(name),
            created_at: updated_at,
            updated_at,
            created_by: None,
        }
    }

    #[test]
    fn restaging_keeps_the_first_read_version() {
        let read_at = Utc::now();
        let later = read_at + Duration::seconds(5);
        let mut work = UnitOfWork::new();

        work.stage_update(record("Jane", later), read_at);
        work.stage_update(record("Jane Doe", later), later);

        let (_, updates, _) = work.into_parts();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].read_at, read_at);
        assert_eq!(updates[0].record.profile.name, "Jane Doe");
    }
}
