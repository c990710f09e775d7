use super::domain::{ContractorProfile, ContractorStatus};
use super::normalizer::{parse_date, parse_decimal, parse_opt_out, parse_service_days};
use super::parser::FeedRow;
use rust_decimal::Decimal;
use std::fmt;

pub(crate) const TALENT_NAME: &str = "Talent Name";
pub(crate) const TALENT_ID: &str = "Talent ID";
const JOB_TITLE: &str = "Job Title";
const CANDIDATE_STATUS: &str = "Candidate Status";
const START_DATE: &str = "Talent Start Date";
const END_DATE: &str = "Talent End Date";
const MOBILE: &str = "Mobile";
const RECRUITER: &str = "Recruiter";
const PEOPLESOFT_ID: &str = "Peoplesoft ID";
const ACCOUNT_MANAGER: &str = "Account Manager";
const ACCOUNT_NAME: &str = "Account Name";
const DAYS_SINCE_SERVICE: &str = "Days Since Service";
const OPT_OUT_MOBILE: &str = "PrefCentre_Aerotek_OptOut_Mobile";

/// Spread amount headers seen across export versions, highest priority first.
pub(crate) const SPREAD_ALIASES: &[&str] = &["Spread Amount", "Weekly Spread", "Spread"];

/// Reason a feed row could not become a valid contractor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowError {
    BlankName,
    UnknownStatus(String),
    NegativeSpread(Decimal),
}

impl fmt::Display for RowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowError::BlankName => write!(f, "talent name is blank"),
            RowError::UnknownStatus(value) => write!(f, "unknown candidate status '{}'", value),
            RowError::NegativeSpread(amount) => {
                write!(f, "spread amount {} is negative", amount)
            }
        }
    }
}

impl std::error::Error for RowError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome<T> {
    Record(T),
    Skipped(RowError),
}

/// Builds a fresh profile from a feed row, applying create-time defaults.
pub(crate) fn profile_from_row(row: &FeedRow) -> RowOutcome<ContractorProfile> {
    let name = row.text(TALENT_NAME).unwrap_or_default();
    if name.is_empty() {
        return RowOutcome::Skipped(RowError::BlankName);
    }

    let status = match row.text(CANDIDATE_STATUS).unwrap_or_default() {
        "" => ContractorStatus::Current,
        raw => match ContractorStatus::parse(raw) {
            Some(status) => status,
            None => return RowOutcome::Skipped(RowError::UnknownStatus(raw.to_string())),
        },
    };

    let spread_amount = match spread_from_row(row) {
        Ok(amount) => amount,
        Err(err) => return RowOutcome::Skipped(err),
    };

    let external_id = row
        .text(TALENT_ID)
        .filter(|id| !id.is_empty())
        .map(str::to_string);

    RowOutcome::Record(ContractorProfile {
        external_id,
        name: name.to_string(),
        job_title: text_or_blank(row, JOB_TITLE),
        status,
        start_date: row.text(START_DATE).and_then(parse_date),
        end_date: row.text(END_DATE).and_then(parse_date),
        mobile: text_or_blank(row, MOBILE),
        recruiter: text_or_blank(row, RECRUITER),
        peoplesoft_id: text_or_blank(row, PEOPLESOFT_ID),
        account_manager: text_or_blank(row, ACCOUNT_MANAGER),
        account_name: text_or_blank(row, ACCOUNT_NAME),
        spread_amount,
        days_since_service: row
            .text(DAYS_SINCE_SERVICE)
            .and_then(parse_service_days)
            .unwrap_or(0),
        opt_out_mobile: row.text(OPT_OUT_MOBILE).is_some_and(parse_opt_out),
    })
}

/// Overlays a feed row onto an existing profile.
///
/// Text columns present in the feed always overwrite, even when blank. Dates, the spread
/// amount and the service-day counter only overwrite when the row carries a valid value.
/// A blank or unrecognised status keeps the stored status.
pub(crate) fn merge_row(current: &ContractorProfile, row: &FeedRow) -> RowOutcome<ContractorProfile> {
    let name = row.text(TALENT_NAME).unwrap_or_default();
    if name.is_empty() {
        return RowOutcome::Skipped(RowError::BlankName);
    }

    let spread_amount = match spread_from_row(row) {
        Ok(amount) => amount.or(current.spread_amount),
        Err(err) => return RowOutcome::Skipped(err),
    };

    let mut merged = current.clone();
    merged.name = name.to_string();
    overwrite_text(&mut merged.job_title, row, JOB_TITLE);
    overwrite_text(&mut merged.mobile, row, MOBILE);
    overwrite_text(&mut merged.recruiter, row, RECRUITER);
    overwrite_text(&mut merged.peoplesoft_id, row, PEOPLESOFT_ID);
    overwrite_text(&mut merged.account_manager, row, ACCOUNT_MANAGER);
    overwrite_text(&mut merged.account_name, row, ACCOUNT_NAME);

    if let Some(status) = row.text(CANDIDATE_STATUS).and_then(ContractorStatus::parse) {
        merged.status = status;
    }
    if let Some(date) = row.text(START_DATE).and_then(parse_date) {
        merged.start_date = Some(date);
    }
    if let Some(date) = row.text(END_DATE).and_then(parse_date) {
        merged.end_date = Some(date);
    }
    merged.spread_amount = spread_amount;
    if let Some(days) = row.text(DAYS_SINCE_SERVICE).and_then(parse_service_days) {
        merged.days_since_service = days;
    }
    if let Some(flag) = row.text(OPT_OUT_MOBILE) {
        merged.opt_out_mobile = parse_opt_out(flag);
    }

    RowOutcome::Record(merged)
}

fn spread_from_row(row: &FeedRow) -> Result<Option<Decimal>, RowError> {
    match row.first_present(SPREAD_ALIASES).and_then(parse_decimal) {
        Some(amount) if amount.is_sign_negative() && !amount.is_zero() => {
            Err(RowError::NegativeSpread(amount))
        }
        Some(amount) => Ok(Some(amount.round_dp(2))),
        None => Ok(None),
    }
}

fn text_or_blank(row: &FeedRow, column: &str) -> String {
    row.text(column).unwrap_or_default().to_string()
}

fn overwrite_text(field: &mut String, row: &FeedRow, column: &str) {
    if let Some(value) = row.text(column) {
        *field = value.to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn record(outcome: RowOutcome<ContractorProfile>) -> ContractorProfile {
        match outcome {
            RowOutcome::Record(profile) => profile,
            RowOutcome::Skipped(err) => panic!("expected record, row skipped: {err}"),
        }
    }

    #[test]
    fn new_profiles_default_missing_columns() {
        let row = FeedRow::from_pairs([
            (TALENT_NAME, "Jane Doe"),
            (TALENT_ID, "T1"),
            ("Spread Amount", "$500"),
        ]);

        let profile = record(profile_from_row(&row));
        assert_eq!(profile.external_id.as_deref(), Some("T1"));
        assert_eq!(profile.status, ContractorStatus::Current);
        assert_eq!(profile.spread_amount, Some(Decimal::new(50000, 2)));
        assert_eq!(profile.days_since_service, 0);
        assert!(!profile.opt_out_mobile);
        assert_eq!(profile.job_title, "");
    }

    #[test]
    fn blank_talent_id_is_stored_as_absent() {
        let row = FeedRow::from_pairs([(TALENT_NAME, "Walk In"), (TALENT_ID, "  ")]);
        assert_eq!(record(profile_from_row(&row)).external_id, None);
    }

    #[test]
    fn spread_aliases_are_checked_in_priority_order() {
        let row = FeedRow::from_pairs([
            (TALENT_NAME, "Jane Doe"),
            ("Spread", "$1"),
            ("Weekly Spread", "$2"),
            ("Spread Amount", ""),
        ]);
        assert_eq!(
            record(profile_from_row(&row)).spread_amount,
            Some(Decimal::new(2, 0))
        );
    }

    #[test]
    fn construction_rejects_invalid_rows() {
        let negative = FeedRow::from_pairs([(TALENT_NAME, "Jane Doe"), ("Spread", "-5")]);
        assert_eq!(
            profile_from_row(&negative),
            RowOutcome::Skipped(RowError::NegativeSpread(Decimal::new(-5, 0)))
        );

        let status = FeedRow::from_pairs([(TALENT_NAME, "Jane Doe"), (CANDIDATE_STATUS, "Alumni")]);
        assert_eq!(
            profile_from_row(&status),
            RowOutcome::Skipped(RowError::UnknownStatus("Alumni".to_string()))
        );

        let blank = FeedRow::from_pairs([(TALENT_NAME, " ")]);
        assert_eq!(
            profile_from_row(&blank),
            RowOutcome::Skipped(RowError::BlankName)
        );
    }

    #[test]
    fn merge_overwrites_text_but_keeps_unparseable_values() {
        let mut current = ContractorProfile::named("Jane Doe").with_external_id("T1");
        current.recruiter = "Sam".to_string();
        current.mobile = "555-0100".to_string();
        current.start_date = NaiveDate::from_ymd_opt(2024, 1, 2);
        current.spread_amount = Some(Decimal::new(40000, 2));
        current.days_since_service = 12;
        current.status = ContractorStatus::Pending;

        let row = FeedRow::from_pairs([
            (TALENT_NAME, "Jane Q. Doe"),
            (TALENT_ID, "T1"),
            (RECRUITER, ""),
            (START_DATE, "soon"),
            (END_DATE, "2024-12-31"),
            ("Weekly Spread", "n/a"),
            (DAYS_SINCE_SERVICE, "-1"),
            (CANDIDATE_STATUS, ""),
        ]);

        let merged = record(merge_row(&current, &row));
        assert_eq!(merged.name, "Jane Q. Doe");
        assert_eq!(merged.recruiter, "");
        assert_eq!(merged.mobile, "555-0100", "absent columns are preserved");
        assert_eq!(merged.start_date, NaiveDate::from_ymd_opt(2024, 1, 2));
        assert_eq!(merged.end_date, NaiveDate::from_ymd_opt(2024, 12, 31));
        assert_eq!(merged.spread_amount, Some(Decimal::new(40000, 2)));
        assert_eq!(merged.days_since_service, 12);
        assert_eq!(merged.status, ContractorStatus::Pending);
    }

    #[test]
    fn merge_applies_valid_numeric_values() {
        let current = ContractorProfile::named("Jane Doe").with_external_id("T1");
        let row = FeedRow::from_pairs([
            (TALENT_NAME, "Jane Doe"),
            ("Spread Amount", "$1,234.567"),
            (DAYS_SINCE_SERVICE, "30"),
            (CANDIDATE_STATUS, "Terminated"),
            (OPT_OUT_MOBILE, "Yes"),
        ]);

        let merged = record(merge_row(&current, &row));
        assert_eq!(merged.spread_amount, Some(Decimal::new(123457, 2)));
        assert_eq!(merged.days_since_service, 30);
        assert_eq!(merged.status, ContractorStatus::Terminated);
        assert!(merged.opt_out_mobile);
    }
}
