//! Delete a session with all its checkpoints and settings

use super::Target;
use anyhow::Result;
use owo_colors::OwoColorize;

pub async fn run(target: &Target, yes: bool) -> Result<()> {
    if !yes {
        anyhow::bail!(
            "This deletes every checkpoint of session '{}'. Re-run with --yes to confirm.",
            target.session
        );
    }

    let ctx = target.open()?;
    let removed = ctx.open.engine().delete_session(ctx.session()).await?;

    println!(
        "{} Forgot session {} ({} checkpoints removed)",
        "✓".green(),
        ctx.session().cyan(),
        removed
    );
    Ok(())
}
