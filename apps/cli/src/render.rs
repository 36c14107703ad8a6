//! Text and JSON output.

use anyhow::Result;
use chrono::{DateTime, Local};
use safeman_core::{IssuanceBatch, Item, Transaction};
use safeman_sync::SyncState;
use serde::Serialize;

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Epoch milliseconds as local `YYYY/MM/DD HH:MM`.
pub fn format_time(ms: i64) -> String {
    DateTime::from_timestamp_millis(ms)
        .map(|t| t.with_timezone(&Local).format("%Y/%m/%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

pub fn print_state(state: &SyncState) {
    println!("status:    {}", state.status);
    println!(
        "endpoint:  {}",
        state.endpoint.as_deref().unwrap_or("(none, local only)")
    );
    println!("last sync: {}", state.last_sync_display());
    if let Some(error) = &state.last_error {
        println!("error:     {}", error);
    }
}

pub fn print_items<'a>(items: impl IntoIterator<Item = &'a Item>) {
    println!(
        "{:<36}  {:<20}  {:<10}  {:>8}  {:>6}  {}",
        "ID", "NAME", "CATEGORY", "QTY", "MIN", "SPEC"
    );
    for item in items {
        let flag = if item.is_low_stock() { " !" } else { "" };
        println!(
            "{:<36}  {:<20}  {:<10}  {:>8}  {:>6}  {}{}",
            item.id,
            item.name,
            item.category.label(),
            format!("{} {}", item.quantity, item.unit),
            item.min_stock,
            item.spec,
            flag
        );
    }
}

pub fn print_item(item: &Item) {
    println!("{} ({})", item.name, item.id);
    println!("  category:  {}", item.category.label());
    println!("  quantity:  {} {} (min {})", item.quantity, item.unit, item.min_stock);
    if !item.spec.is_empty() {
        println!("  spec:      {}", item.spec);
    }
    if let Some(date) = &item.expiry_date {
        println!("  expires:   {}", date);
    }
}

pub fn print_logs<'a>(logs: impl IntoIterator<Item = &'a Transaction>) {
    for log in logs {
        println!(
            "{}  {:<3}  {:>5} {:<4}  {:<20}  {}  {}",
            format_time(log.timestamp),
            log.kind,
            log.quantity,
            log.unit,
            log.item_name,
            log.dept,
            log.person
        );
    }
}

pub fn print_batch(batch: &IssuanceBatch) {
    println!(
        "{} batch {} at {}  dept: {}  person: {}",
        batch.mode,
        batch.id,
        format_time(batch.timestamp),
        batch.dept,
        batch.person
    );
    for entry in &batch.entries {
        println!("  {:>5} {:<4}  {}  {}", entry.quantity, entry.unit, entry.name, entry.spec);
    }
    for id in &batch.missing_items {
        println!("  warning: item {} no longer exists; no log entry recorded", id);
    }
}
