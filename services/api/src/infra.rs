use metrics_exporter_prometheus::PrometheusHandle;
use roster_sync::config::StorageConfig;
use roster_sync::workflows::roster::{InMemoryRosterStore, SnapshotError};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Opens the roster store, hydrating it from the configured snapshot when there is one.
pub(crate) fn load_store(storage: &StorageConfig) -> Result<InMemoryRosterStore, SnapshotError> {
    match &storage.state_path {
        Some(path) => {
            let store = InMemoryRosterStore::load(path)?;
            info!(path = %path.display(), "roster state loaded");
            Ok(store)
        }
        None => Ok(InMemoryRosterStore::new()),
    }
}

pub(crate) fn persist_store(
    store: &InMemoryRosterStore,
    storage: &StorageConfig,
) -> Result<(), SnapshotError> {
    if let Some(path) = &storage.state_path {
        store.save(path)?;
        info!(path = %path.display(), "roster state saved");
    }
    Ok(())
}
