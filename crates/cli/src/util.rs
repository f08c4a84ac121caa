//! Shared utilities for CLI commands

use chrono::{DateTime, Local, TimeZone, Utc};
use journal::{Checkpoint, Trigger};
use owo_colors::OwoColorize;

/// Format byte size as human-readable string
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Format timestamp as relative time ("2 hours ago")
pub fn format_relative_time(ts_ms: u64) -> String {
    format_relative_time_at(ts_ms, Utc::now())
}

fn format_relative_time_at(ts_ms: u64, now: DateTime<Utc>) -> String {
    let Some(then) = to_datetime(ts_ms) else {
        return "unknown".to_string();
    };

    let seconds = (now - then).num_seconds();
    if seconds < 0 {
        "in the future".to_string()
    } else if seconds < 60 {
        format!("{} seconds ago", seconds)
    } else if seconds < 3600 {
        format!("{} minutes ago", seconds / 60)
    } else if seconds < 86400 {
        format!("{} hours ago", seconds / 3600)
    } else if seconds < 604800 {
        format!("{} days ago", seconds / 86400)
    } else {
        format!("{} weeks ago", seconds / 604800)
    }
}

/// Format timestamp as local time ("2024-01-03 14:30:00")
pub fn format_absolute_time(ts_ms: u64) -> String {
    match to_datetime(ts_ms) {
        Some(utc) => utc
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string(),
        None => "unknown".to_string(),
    }
}

fn to_datetime(ts_ms: u64) -> Option<DateTime<Utc>> {
    let ms = i64::try_from(ts_ms).ok()?;
    Utc.timestamp_millis_opt(ms).single()
}

/// Colored label for a trigger
pub fn trigger_label(trigger: Trigger) -> String {
    let label = trigger.to_string();
    match trigger {
        Trigger::Manual => label.green().to_string(),
        Trigger::Prompt => label.cyan().to_string(),
        Trigger::ToolUse => label.yellow().to_string(),
        Trigger::SmartHeuristic => label.magenta().to_string(),
    }
}

/// Display a checkpoint as one timeline line
pub fn display_checkpoint_compact(cp: &Checkpoint, parent_retained: bool, absolute_time: bool) {
    let parent = match cp.parent_id {
        Some(parent) if parent_retained => format!("← #{}", parent),
        Some(parent) => format!("← #{} (pruned)", parent).dimmed().to_string(),
        None => "root".dimmed().to_string(),
    };
    let time = if absolute_time {
        format_absolute_time(cp.created_at_ms)
    } else {
        format_relative_time(cp.created_at_ms)
    };

    println!(
        "{:>6}  {}  {:<16}  {:>10}  {}  {}",
        format!("#{}", cp.id).bold(),
        cp.state_ref.short().dimmed(),
        trigger_label(cp.trigger),
        format_size(cp.size_bytes),
        time.dimmed(),
        parent
    );
}
