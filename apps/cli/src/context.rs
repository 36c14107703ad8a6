//! Replica session shared by every subcommand.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use safeman_db::{Database, DbConfig, LedgerStore};
use safeman_sync::{
    remote, SafemanConfig, SyncEventEmitter, SyncState, SyncStatus, Synchronizer,
    TransactionProcessor,
};
use tracing::{debug, info, warn};

/// Config, mirror and synchronizer for one command invocation.
pub struct CliContext {
    pub sync: Arc<Synchronizer>,
    pub processor: TransactionProcessor,
}

impl CliContext {
    /// Loads config, opens the mirror and brings the replica up to date.
    ///
    /// A failed initial pull is not fatal; the replica keeps its mirror
    /// contents and the sync status reads `error`.
    pub async fn initialize(config_path: Option<PathBuf>, db_path: Option<PathBuf>) -> Result<Self> {
        let mut config =
            SafemanConfig::load(config_path).context("failed to load configuration")?;
        if let Some(path) = db_path {
            config.store.database_path = Some(path);
        }

        let database_path = config.database_path();
        debug!(path = %database_path.display(), "Opening local mirror");
        let db = Database::new(DbConfig::new(database_path.clone()))
            .await
            .with_context(|| format!("failed to open mirror at {}", database_path.display()))?;

        let store = Arc::new(LedgerStore::new(db));
        let client = remote::client_from_settings(&config.remote)
            .context("failed to build remote client")?;

        let sync = Arc::new(Synchronizer::with_emitter(
            store,
            client,
            config,
            Arc::new(LogEmitter),
        ));
        sync.initialize().await;

        let processor = TransactionProcessor::new(sync.clone());
        Ok(Self { sync, processor })
    }

    pub fn store(&self) -> &Arc<LedgerStore> {
        self.sync.store()
    }
}

/// Reports sync status changes through tracing.
pub struct LogEmitter;

impl SyncEventEmitter for LogEmitter {
    fn emit_status(&self, state: &SyncState) {
        match state.status {
            SyncStatus::Synced => info!(
                endpoint = state.endpoint.as_deref().unwrap_or(""),
                last_sync = state.last_sync_display(),
                "Replica synced"
            ),
            SyncStatus::Error => {}
            status => debug!(%status, "Sync status changed"),
        }
    }

    fn emit_error(&self, message: &str, retryable: bool) {
        warn!(retryable, "Sync failed: {}", message);
    }
}
