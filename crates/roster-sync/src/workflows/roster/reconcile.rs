use super::domain::{
    ContractorRecord, ContractorStatus, NewContractor, NewReviewEntry, RunSummary, UserId,
};
use super::mapping::{self, RowOutcome, TALENT_ID, TALENT_NAME};
use super::parser::FeedRow;
use super::repository::{ContractorRepository, RepositoryError, ReviewQueueRepository};
use super::unit_of_work::UnitOfWork;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

pub const ABSENT_FROM_UPLOAD_REASON: &str = "Not found in latest upload - potential removal";

/// Classifies every feed row as an insert or update, then queues stored `Current`
/// contractors the feed no longer mentions. All writes are staged on `work`.
pub fn reconcile<S>(
    feed: &[FeedRow],
    actor: UserId,
    store: &S,
    work: &mut UnitOfWork,
    now: DateTime<Utc>,
) -> Result<RunSummary, RepositoryError>
where
    S: ContractorRepository + ReviewQueueRepository + ?Sized,
{
    // Each record keeps the `updated_at` it was read with so the commit can spot stale writes.
    let mut known: HashMap<String, (ContractorRecord, DateTime<Utc>)> = store
        .with_external_id()?
        .into_iter()
        .filter_map(|record| {
            let external_id = record.profile.external_id.clone()?;
            let read_at = record.updated_at;
            (!external_id.is_empty()).then_some((external_id, (record, read_at)))
        })
        .collect();
    let mut seen: HashSet<String> = HashSet::new();
    let mut summary = RunSummary::default();

    for (index, row) in feed.iter().enumerate() {
        summary.processed += 1;
        // Header occupies line 1.
        let line = index + 2;

        if row.text(TALENT_NAME).unwrap_or_default().is_empty() {
            debug!(line, "skipping roster row without a talent name");
            continue;
        }

        let external_id = row.text(TALENT_ID).unwrap_or_default();
        seen.insert(external_id.to_string());

        if !external_id.is_empty() {
            if let Some((stored, read_at)) = known.get_mut(external_id) {
                match mapping::merge_row(&stored.profile, row) {
                    RowOutcome::Record(profile) => {
                        stored.profile = profile;
                        stored.updated_at = now;
                        work.stage_update(stored.clone(), *read_at);
                        summary.updated += 1;
                    }
                    RowOutcome::Skipped(reason) => {
                        warn!(line, external_id, %reason, "roster row not applied");
                    }
                }
                continue;
            }

            if let Some(staged) = work.staged_insert_mut(external_id) {
                match mapping::merge_row(&staged.profile, row) {
                    RowOutcome::Record(profile) => {
                        staged.profile = profile;
                        summary.updated += 1;
                    }
                    RowOutcome::Skipped(reason) => {
                        warn!(line, external_id, %reason, "roster row not applied");
                    }
                }
                continue;
            }
        }

        match mapping::profile_from_row(row) {
            RowOutcome::Record(profile) => {
                work.stage_insert(NewContractor {
                    profile,
                    created_at: now,
                    created_by: Some(actor),
                });
                summary.added += 1;
            }
            RowOutcome::Skipped(reason) => {
                warn!(line, external_id, %reason, "roster row not applied");
            }
        }
    }

    for record in store.by_status(ContractorStatus::Current)? {
        // A stored record without a talent id matches any named feed row with a blank one.
        let external_id = record.profile.external_id.as_deref().unwrap_or_default();
        if seen.contains(external_id) {
            continue;
        }

        if store.unresolved_for(record.id)?.is_some() {
            debug!(contractor_id = record.id.0, "contractor already awaiting review");
            continue;
        }

        work.stage_review(NewReviewEntry {
            contractor_id: record.id,
            reason: ABSENT_FROM_UPLOAD_REASON.to_string(),
            added_at: now,
            added_by: actor,
        });
        summary.queued += 1;
    }

    Ok(summary)
}
