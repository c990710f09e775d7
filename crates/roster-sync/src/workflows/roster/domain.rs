use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContractorId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReviewEntryId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UploadRunId(pub u64);

/// Identifier of the application user performing an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl fmt::Display for ContractorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ReviewEntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractorStatus {
    #[default]
    Current,
    Inactive,
    Pending,
    Terminated,
}

impl ContractorStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Current => "Current",
            Self::Inactive => "Inactive",
            Self::Pending => "Pending",
            Self::Terminated => "Terminated",
        }
    }

    /// Case-insensitive match against the labels used by the vendor export.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "current" => Some(Self::Current),
            "inactive" => Some(Self::Inactive),
            "pending" => Some(Self::Pending),
            "terminated" => Some(Self::Terminated),
            _ => None,
        }
    }
}

/// Fields of a contractor that the roster feed is allowed to overwrite.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ContractorProfile {
    pub external_id: Option<String>,
    pub name: String,
    pub job_title: String,
    pub status: ContractorStatus,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub mobile: String,
    pub recruiter: String,
    pub peoplesoft_id: String,
    pub account_manager: String,
    pub account_name: String,
    pub spread_amount: Option<Decimal>,
    pub days_since_service: u32,
    pub opt_out_mobile: bool,
}

impl ContractorProfile {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_external_id(mut self, external_id: impl Into<String>) -> Self {
        self.external_id = Some(external_id.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractorRecord {
    pub id: ContractorId,
    pub profile: ContractorProfile,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: Option<UserId>,
}

impl ContractorRecord {
    pub fn is_active(&self) -> bool {
        self.profile.status == ContractorStatus::Current
    }

    pub fn contract_duration_days(&self) -> Option<i64> {
        match (self.profile.start_date, self.profile.end_date) {
            (Some(start), Some(end)) => Some((end - start).num_days()),
            _ => None,
        }
    }
}

/// A contractor staged for insertion; the store assigns the id on commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewContractor {
    pub profile: ContractorProfile,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<UserId>,
}

impl NewContractor {
    pub fn into_record(self, id: ContractorId) -> ContractorRecord {
        ContractorRecord {
            id,
            profile: self.profile,
            created_at: self.created_at,
            updated_at: self.created_at,
            created_by: self.created_by,
        }
    }
}

/// Outcome recorded when a reviewer closes a queue entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewAction {
    Kept,
    Removed,
    Modified,
}

impl ReviewAction {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Kept => "kept",
            Self::Removed => "removed",
            Self::Modified => "modified",
        }
    }
}

/// Reviewer instruction for a pending queue entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewDecision {
    Keep,
    Remove,
    Modify,
}

impl ReviewDecision {
    pub const fn action(self) -> ReviewAction {
        match self {
            Self::Keep => ReviewAction::Kept,
            Self::Remove => ReviewAction::Removed,
            Self::Modify => ReviewAction::Modified,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewResolution {
    pub action: ReviewAction,
    pub reviewed_at: DateTime<Utc>,
    pub reviewed_by: UserId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewQueueEntry {
    pub id: ReviewEntryId,
    pub contractor_id: ContractorId,
    pub reason: String,
    pub added_at: DateTime<Utc>,
    pub added_by: UserId,
    pub resolution: Option<ReviewResolution>,
}

impl ReviewQueueEntry {
    pub fn is_resolved(&self) -> bool {
        self.resolution.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReviewEntry {
    pub contractor_id: ContractorId,
    pub reason: String,
    pub added_at: DateTime<Utc>,
    pub added_by: UserId,
}

impl NewReviewEntry {
    pub fn into_entry(self, id: ReviewEntryId) -> ReviewQueueEntry {
        ReviewQueueEntry {
            id,
            contractor_id: self.contractor_id,
            reason: self.reason,
            added_at: self.added_at,
            added_by: self.added_by,
            resolution: None,
        }
    }
}

/// Aggregate counters returned by a reconciliation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RunSummary {
    pub processed: u32,
    pub added: u32,
    pub updated: u32,
    pub queued: u32,
}

impl RunSummary {
    /// Rows that were read but neither created nor updated a contractor.
    pub fn skipped(&self) -> u32 {
        self.processed
            .saturating_sub(self.added)
            .saturating_sub(self.updated)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    Completed,
    Failed,
}

impl UploadStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// Audit record of one reconciliation invocation. Written once, never updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadRun {
    pub id: UploadRunId,
    pub filename: String,
    pub uploaded_by: UserId,
    pub uploaded_at: DateTime<Utc>,
    /// Absent for failed runs.
    pub summary: Option<RunSummary>,
    pub status: UploadStatus,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUploadRun {
    pub filename: String,
    pub uploaded_by: UserId,
    pub uploaded_at: DateTime<Utc>,
    pub summary: Option<RunSummary>,
    pub status: UploadStatus,
    pub error_message: Option<String>,
}

impl NewUploadRun {
    pub fn completed(
        filename: impl Into<String>,
        uploaded_by: UserId,
        uploaded_at: DateTime<Utc>,
        summary: RunSummary,
    ) -> Self {
        Self {
            filename: filename.into(),
            uploaded_by,
            uploaded_at,
            summary: Some(summary),
            status: UploadStatus::Completed,
            error_message: None,
        }
    }

    pub fn failed(
        filename: impl Into<String>,
        uploaded_by: UserId,
        uploaded_at: DateTime<Utc>,
        error_message: impl Into<String>,
    ) -> Self {
        Self {
            filename: filename.into(),
            uploaded_by,
            uploaded_at,
            summary: None,
            status: UploadStatus::Failed,
            error_message: Some(error_message.into()),
        }
    }

    pub fn into_run(self, id: UploadRunId) -> UploadRun {
        UploadRun {
            id,
            filename: self.filename,
            uploaded_by: self.uploaded_by,
            uploaded_at: self.uploaded_at,
            summary: self.summary,
            status: self.status,
            error_message: self.error_message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parse_ignores_case_and_padding() {
        assert_eq!(
            ContractorStatus::parse("  current "),
            Some(ContractorStatus::Current)
        );
        assert_eq!(
            ContractorStatus::parse("TERMINATED"),
            Some(ContractorStatus::Terminated)
        );
        assert_eq!(ContractorStatus::parse("on leave"), None);
    }

    #[test]
    fn contract_duration_requires_both_dates() {
        let now = Utc::now();
        let mut profile = ContractorProfile::named("Jane Doe");
        profile.start_date = NaiveDate::from_ymd_opt(2024, 1, 1);
        let mut record = NewContractor {
            profile,
            created_at: now,
            created_by: None,
        }
        .into_record(ContractorId(1));
        assert_eq!(record.contract_duration_days(), None);

        record.profile.end_date = NaiveDate::from_ymd_opt(2024, 3, 1);
        assert_eq!(record.contract_duration_days(), Some(60));
        assert!(record.is_active());
    }
}
