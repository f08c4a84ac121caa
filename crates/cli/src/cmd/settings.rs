//! Show checkpoint settings of a session

use super::Target;
use anyhow::Result;
use journal::api::GetCheckpointSettings;
use owo_colors::OwoColorize;

pub async fn run(target: &Target, json: bool) -> Result<()> {
    let ctx = target.open()?;
    let response = ctx
        .open
        .api
        .get_checkpoint_settings(GetCheckpointSettings {
            scope: ctx.scope.clone(),
        })
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    println!(
        "{} {}",
        "Checkpoint Settings".bold(),
        format!("(session {})", ctx.session()).dimmed()
    );
    println!(
        "  {} = {}",
        "auto_checkpoint_enabled".cyan(),
        if response.auto_checkpoint_enabled {
            "true".green().to_string()
        } else {
            "false".yellow().to_string()
        }
    );
    println!("  {} = {}", "checkpoint_strategy".cyan(), response.checkpoint_strategy);
    println!("  {} = {}", "total_checkpoints".cyan(), response.total_checkpoints);

    Ok(())
}
