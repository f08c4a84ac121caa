//! Delete old checkpoints of a session

use super::Target;
use anyhow::Result;
use journal::api::CleanupOldCheckpoints;
use owo_colors::OwoColorize;

/// `keep` defaults to `engine.auto_cleanup_keep` from the config file
pub async fn run(target: &Target, keep: Option<i64>) -> Result<()> {
    let ctx = target.open()?;
    let keep_count = keep.unwrap_or(ctx.config.engine.auto_cleanup_keep as i64);

    println!(
        "{} {}",
        "Cleaning up checkpoints...".bold(),
        format!("(keeping {})", keep_count).dimmed()
    );

    let removed = ctx
        .open
        .api
        .cleanup_old_checkpoints(CleanupOldCheckpoints {
            scope: ctx.scope.clone(),
            keep_count,
        })
        .await?;

    if removed == 0 {
        println!("{}", "Nothing to clean up".dimmed());
    } else {
        println!("{} Removed {} checkpoints", "✓".green(), removed.to_string().yellow());
    }

    Ok(())
}
