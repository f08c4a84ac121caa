//! Show the checkpoint timeline of a session

use super::Target;
use crate::util;
use anyhow::Result;
use owo_colors::OwoColorize;

pub async fn run(target: &Target, limit: Option<usize>, absolute: bool, json: bool) -> Result<()> {
    let ctx = target.open()?;
    let history = ctx.open.engine().history(ctx.session()).await?;
    let limit = limit.unwrap_or(20);

    // Newest first
    let shown: Vec<_> = history.iter().rev().take(limit).collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&shown)?);
        return Ok(());
    }

    if history.is_empty() {
        println!("{}", "No checkpoints yet".dimmed());
        return Ok(());
    }

    println!(
        "{} {}",
        "Checkpoint Timeline".bold(),
        format!("(session {}, {} of {})", ctx.session(), shown.len(), history.len()).dimmed()
    );
    println!("{} {}", "Project:".dimmed(), ctx.project.root().display());
    println!();

    for checkpoint in shown {
        let parent_retained = checkpoint.parent_in(&history).is_some();
        util::display_checkpoint_compact(checkpoint, parent_retained, absolute);
    }

    let total: u64 = history.iter().map(|c| c.size_bytes).sum();
    println!();
    println!("{} {}", "Total state size:".dimmed(), util::format_size(total));

    Ok(())
}
