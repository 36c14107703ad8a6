//! Subcommand handlers.
//!
//! Every handler runs against an initialized [`CliContext`]; mutating
//! handlers go through the [`safeman_sync::TransactionProcessor`] so they
//! refresh, apply and push like any other replica.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{Datelike, Local};
use safeman_core::{ledger, ItemDraft, Snapshot, TransactionType};
use safeman_sync::{transfer, IssuanceRequest, ReservationTracker, SyncStatus};
use serde::Serialize;
use tracing::warn;

use crate::context::CliContext;
use crate::render::{self, print_json};
use crate::{AddItemArgs, BasketLine, EditItemArgs, ItemFields, ItemsArgs, IssueArgs, RestockArgs};

// =============================================================================
// Status & Sync
// =============================================================================

#[derive(Serialize)]
struct StatusReport {
    #[serde(flatten)]
    sync: safeman_sync::SyncState,
    items: usize,
    logs: usize,
    low_stock: usize,
    snapshot_timestamp: i64,
}

pub async fn status(ctx: &CliContext, json: bool) -> Result<()> {
    let state = ctx.sync.state().await;
    let snapshot = ctx.store().snapshot().await;
    let low = ledger::low_stock(&snapshot.items).len();

    if json {
        return print_json(&StatusReport {
            sync: state,
            items: snapshot.items.len(),
            logs: snapshot.logs.len(),
            low_stock: low,
            snapshot_timestamp: snapshot.timestamp,
        });
    }

    render::print_state(&state);
    println!(
        "items:     {} ({} at or below minimum)",
        snapshot.items.len(),
        low
    );
    println!("logs:      {}", snapshot.logs.len());
    Ok(())
}

pub async fn pull(ctx: &CliContext, json: bool) -> Result<()> {
    let pulled = ctx.sync.pull().await.context("pull failed")?;
    report_snapshot(pulled.as_ref(), json)
}

pub async fn set_endpoint(ctx: &CliContext, url: &str, json: bool) -> Result<()> {
    let pulled = match ctx.sync.set_endpoint(url).await {
        Ok(pulled) => pulled,
        // The endpoint is stored even when the first pull fails.
        Err(e) if e.is_transport_error() => {
            warn!(error = %e, "Endpoint saved but the initial pull failed");
            None
        }
        Err(e) => return Err(e).context("endpoint rejected"),
    };

    if ctx.sync.config().remote_url().is_some() {
        warn!("[remote] url in the config file takes precedence over the stored endpoint");
    }

    if json {
        return print_json(&ctx.sync.state().await);
    }
    render::print_state(&ctx.sync.state().await);
    if let Some(snapshot) = pulled {
        println!("pulled {} items, {} log entries", snapshot.items.len(), snapshot.logs.len());
    }
    Ok(())
}

fn report_snapshot(snapshot: Option<&Snapshot>, json: bool) -> Result<()> {
    match (snapshot, json) {
        (Some(snapshot), true) => print_json(snapshot),
        (Some(snapshot), false) => {
            println!(
                "pulled {} items, {} log entries",
                snapshot.items.len(),
                snapshot.logs.len()
            );
            Ok(())
        }
        (None, true) => print_json(&serde_json::Value::Null),
        (None, false) => {
            println!("no endpoint configured; replica is local");
            Ok(())
        }
    }
}

/// Prints where the last mutation ended up: pushed, local only, or failed.
async fn report_sync(ctx: &CliContext) {
    let state = ctx.sync.state().await;
    match state.status {
        SyncStatus::Synced => println!("synced ({})", state.last_sync_display()),
        SyncStatus::Local => println!("saved locally (no endpoint)"),
        SyncStatus::Error => println!(
            "saved locally; sync failed: {}",
            state.last_error.as_deref().unwrap_or("unknown error")
        ),
        SyncStatus::Syncing => {}
    }
}

// =============================================================================
// Queries
// =============================================================================

pub async fn items(ctx: &CliContext, args: ItemsArgs, json: bool) -> Result<()> {
    let snapshot = ctx.store().snapshot().await;

    let mut selected: Vec<_> = match args.group {
        Some(group) => ledger::filter_group(&snapshot.items, group.into()),
        None => snapshot.items.iter().collect(),
    };
    if args.low {
        selected.retain(|item| item.is_low_stock());
    }

    if json {
        return print_json(&selected);
    }
    render::print_items(selected);
    Ok(())
}

pub async fn logs(ctx: &CliContext, limit: usize, json: bool) -> Result<()> {
    let snapshot = ctx.store().snapshot().await;
    let recent: Vec<_> = snapshot.logs.iter().take(limit).collect();

    if json {
        return print_json(&recent);
    }
    render::print_logs(recent);
    Ok(())
}

pub async fn report(ctx: &CliContext, year: Option<i32>, json: bool) -> Result<()> {
    let year = year.unwrap_or_else(|| Local::now().year());
    let snapshot = ctx.store().snapshot().await;
    let ranking = ledger::issued_by_department(&snapshot.logs, year, &Local);

    if json {
        return print_json(&ranking);
    }
    println!("issued in {}", year);
    if ranking.is_empty() {
        println!("  (nothing)");
    }
    for (dept, quantity) in ranking {
        println!("  {:>8}  {}", quantity, dept);
    }
    Ok(())
}

// =============================================================================
// Commits
// =============================================================================

pub async fn issue(ctx: &CliContext, args: IssueArgs, json: bool) -> Result<()> {
    let departments = &ctx.sync.config().issuance.departments;
    if !departments.iter().any(|d| d == args.dept.trim()) {
        warn!(dept = %args.dept, "Department is not in the configured list");
    }

    let request = IssuanceRequest::new(args.dept, args.person, args.reason);
    commit_lines(ctx, TransactionType::Out, &args.items, request, json).await
}

pub async fn restock(ctx: &CliContext, args: RestockArgs, json: bool) -> Result<()> {
    let request = IssuanceRequest::restock(args.person, args.reason);
    commit_lines(ctx, TransactionType::In, &args.items, request, json).await
}

async fn commit_lines(
    ctx: &CliContext,
    mode: TransactionType,
    lines: &[BasketLine],
    request: IssuanceRequest,
    json: bool,
) -> Result<()> {
    let tracker = ReservationTracker::new(ctx.store().clone(), mode);
    for line in lines {
        tracker
            .reserve(&line.item_id, line.quantity)
            .await
            .with_context(|| format!("cannot add {} x{} to the basket", line.item_id, line.quantity))?;
    }

    let batch = ctx
        .processor
        .commit(&tracker, request)
        .await
        .context("commit failed")?;

    if json {
        return print_json(&batch);
    }
    render::print_batch(&batch);
    report_sync(ctx).await;
    Ok(())
}

// =============================================================================
// Item Edits
// =============================================================================

fn apply_fields(draft: &mut ItemDraft, fields: ItemFields) {
    if let Some(category) = fields.category {
        draft.category = category.into();
    }
    if let Some(item_type) = fields.item_type {
        draft.item_type = item_type.into();
    }
    if let Some(group) = fields.group {
        draft.item_group = group.into();
    }
    if let Some(spec) = fields.spec {
        draft.spec = spec;
    }
    if let Some(quantity) = fields.quantity {
        draft.quantity = quantity;
    }
    if let Some(min_stock) = fields.min_stock {
        draft.min_stock = min_stock;
    }
    if let Some(date) = fields.purchase_date {
        draft.purchase_date = Some(date).filter(|d| !d.trim().is_empty());
    }
    if let Some(date) = fields.expiry_date {
        draft.expiry_date = Some(date).filter(|d| !d.trim().is_empty());
    }
    if let Some(description) = fields.description {
        draft.description = description;
    }
}

pub async fn add_item(ctx: &CliContext, args: AddItemArgs, json: bool) -> Result<()> {
    let mut draft = ItemDraft::new(args.name, args.unit);
    apply_fields(&mut draft, args.fields);

    let item = ctx.processor.add_item(draft).await.context("add failed")?;

    if json {
        return print_json(&item);
    }
    render::print_item(&item);
    report_sync(ctx).await;
    Ok(())
}

pub async fn edit_item(ctx: &CliContext, args: EditItemArgs, json: bool) -> Result<()> {
    let snapshot = ctx.store().snapshot().await;
    let Some(current) = snapshot.item(&args.id) else {
        bail!("item {} not found", args.id);
    };

    let mut draft = ItemDraft::from_item(current);
    if let Some(name) = args.name {
        draft.name = name;
    }
    if let Some(unit) = args.unit {
        draft.unit = unit;
    }
    apply_fields(&mut draft, args.fields);

    let item = ctx
        .processor
        .edit_item(&args.id, draft)
        .await
        .context("edit failed")?;

    if json {
        return print_json(&item);
    }
    render::print_item(&item);
    report_sync(ctx).await;
    Ok(())
}

pub async fn delete_item(ctx: &CliContext, id: &str, json: bool) -> Result<()> {
    let item = ctx.processor.delete_item(id).await.context("delete failed")?;

    if json {
        return print_json(&item);
    }
    println!("deleted {} ({})", item.name, item.id);
    report_sync(ctx).await;
    Ok(())
}

// =============================================================================
// Backup Files
// =============================================================================

pub async fn export(ctx: &CliContext, path: Option<PathBuf>, json: bool) -> Result<()> {
    let path = path.unwrap_or_else(|| {
        PathBuf::from(transfer::default_export_file_name(Local::now().date_naive()))
    });
    let snapshot = ctx.store().snapshot().await;

    transfer::export_snapshot(&snapshot, &path)
        .await
        .with_context(|| format!("failed to write {}", path.display()))?;

    if json {
        return print_json(&serde_json::json!({ "path": path, "items": snapshot.items.len() }));
    }
    println!("exported {} items to {}", snapshot.items.len(), path.display());
    Ok(())
}

pub async fn import(ctx: &CliContext, path: &Path, json: bool) -> Result<()> {
    let snapshot = transfer::read_snapshot_file(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;

    let stored = ctx
        .processor
        .import_snapshot(snapshot)
        .await
        .context("import failed")?;

    if json {
        return print_json(&stored);
    }
    println!(
        "imported {} items, {} log entries",
        stored.items.len(),
        stored.logs.len()
    );
    report_sync(ctx).await;
    Ok(())
}

// =============================================================================
// Watch
// =============================================================================

/// Runs the periodic pull until Ctrl-C.
pub async fn watch(ctx: &CliContext) -> Result<()> {
    let Some(endpoint) = ctx.sync.endpoint().await else {
        bail!("no endpoint configured; set one with `safeman endpoint set <url>`");
    };

    let handle = ctx.sync.spawn();
    println!(
        "watching {} every {}s, Ctrl-C to stop",
        endpoint,
        ctx.sync.config().remote.poll_interval_secs
    );

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;

    let state = handle.state().await;
    handle.shutdown().await.context("failed to stop synchronizer")?;
    render::print_state(&state);
    Ok(())
}
