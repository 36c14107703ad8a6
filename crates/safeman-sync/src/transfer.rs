//! # Snapshot Export / Import
//!
//! Backup files use the same `{items, logs, timestamp}` document as the
//! remote endpoint, pretty-printed. Reading one applies the pull rules:
//! `items` is required, `logs` defaults to empty.

use std::path::Path;

use chrono::NaiveDate;
use safeman_core::Snapshot;
use tracing::info;

use crate::error::{SyncError, SyncResult};

/// `safeman_backup_YYYY-MM-DD.json` for the given day.
pub fn default_export_file_name(date: NaiveDate) -> String {
    format!("safeman_backup_{}.json", date.format("%Y-%m-%d"))
}

/// Writes `snapshot` to `path` as pretty JSON.
pub async fn export_snapshot(snapshot: &Snapshot, path: &Path) -> SyncResult<()> {
    let body = serde_json::to_string_pretty(snapshot)?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    tokio::fs::write(path, body).await?;

    info!(
        path = %path.display(),
        items = snapshot.items.len(),
        logs = snapshot.logs.len(),
        "Snapshot exported"
    );
    Ok(())
}

/// Reads a snapshot file written by [`export_snapshot`] (or saved from the
/// remote endpoint).
pub async fn read_snapshot_file(path: &Path) -> SyncResult<Snapshot> {
    let body = tokio::fs::read_to_string(path).await?;
    Snapshot::from_json(&body).map_err(|e| SyncError::MalformedSnapshot(e.to_string()))
}
