use crate::infra::{load_store, persist_store};
use clap::Args;
use roster_sync::config::{AppConfig, StorageConfig};
use roster_sync::error::AppError;
use roster_sync::telemetry;
use roster_sync::workflows::roster::{RosterSyncService, RunSummary, UserId};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct ReconcileArgs {
    /// Roster CSV export to reconcile
    #[arg(long)]
    pub(crate) csv: PathBuf,
    /// User id recorded as the uploader
    #[arg(long)]
    pub(crate) actor: u64,
    /// JSON state file to load before and save after the run (defaults to ROSTER_STATE_PATH)
    #[arg(long)]
    pub(crate) state: Option<PathBuf>,
}

pub(crate) fn run_reconcile(args: ReconcileArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let storage = match args.state {
        Some(path) => StorageConfig {
            state_path: Some(path),
        },
        None => config.storage,
    };

    let store = Arc::new(load_store(&storage)?);
    let sync = RosterSyncService::new(store.clone());
    let outcome = sync.process_path(&args.csv, UserId(args.actor));

    // Failed runs are part of the audit trail too.
    persist_store(&store, &storage)?;
    let summary = outcome?;

    let pending = sync.reviews().pending_count()?;
    println!("{}", render_summary(&args.csv, &summary, pending));
    Ok(())
}

fn render_summary(csv: &std::path::Path, summary: &RunSummary, pending: usize) -> String {
    format!(
        "Roster reconciliation for {}\n\
         - {} rows processed\n\
         - {} contractors added\n\
         - {} contractors updated\n\
         - {} rows skipped\n\
         - {} contractors queued for review ({} pending in total)",
        csv.display(),
        summary.processed,
        summary.added,
        summary.updated,
        summary.skipped(),
        summary.queued,
        pending
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn summary_lists_every_counter() {
        let summary = RunSummary {
            processed: 5,
            added: 2,
            updated: 2,
            queued: 1,
        };
        let rendered = render_summary(Path::new("roster.csv"), &summary, 3);

        assert!(rendered.starts_with("Roster reconciliation for roster.csv"));
        assert!(rendered.contains("- 5 rows processed"));
        assert!(rendered.contains("- 2 contractors added"));
        assert!(rendered.contains("- 2 contractors updated"));
        assert!(rendered.contains("- 1 rows skipped"));
        assert!(rendered.contains("- 1 contractors queued for review (3 pending in total)"));
    }
}
