//! Change checkpoint settings of a session

use super::Target;
use anyhow::Result;
use journal::api::{GetCheckpointSettings, UpdateCheckpointSettings};
use owo_colors::OwoColorize;

pub async fn run(target: &Target, enabled: Option<bool>, strategy: Option<String>) -> Result<()> {
    if enabled.is_none() && strategy.is_none() {
        anyhow::bail!("Nothing to change: pass --enabled and/or --strategy");
    }

    let ctx = target.open()?;
    let current = ctx
        .open
        .api
        .get_checkpoint_settings(GetCheckpointSettings {
            scope: ctx.scope.clone(),
        })
        .await?;

    let auto_checkpoint_enabled = enabled.unwrap_or(current.auto_checkpoint_enabled);
    let checkpoint_strategy =
        strategy.unwrap_or_else(|| current.checkpoint_strategy.as_str().to_string());

    ctx.open.api.update_checkpoint_settings(UpdateCheckpointSettings {
        scope: ctx.scope.clone(),
        auto_checkpoint_enabled,
        checkpoint_strategy: checkpoint_strategy.clone(),
    })?;

    println!(
        "{} auto_checkpoint_enabled = {}, checkpoint_strategy = {}",
        "✓".green(),
        auto_checkpoint_enabled,
        checkpoint_strategy.cyan()
    );
    Ok(())
}
