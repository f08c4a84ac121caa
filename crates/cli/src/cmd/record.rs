//! Feed a session event to the engine

use super::Target;
use anyhow::{Context, Result};
use bytes::Bytes;
use journal::api::RecordEventResponse;
use journal::SessionEvent;
use owo_colors::OwoColorize;
use std::path::Path;

/// Record `event`; the checkpoint state is the contents of `state_file`, or
/// the event itself when no file is given
pub async fn run(target: &Target, event: SessionEvent, state_file: Option<&Path>) -> Result<()> {
    let state = match state_file {
        Some(path) => Bytes::from(
            std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?,
        ),
        None => Bytes::from(serde_json::to_vec(&event)?),
    };

    let ctx = target.open()?;
    let kind = event.kind();
    let response = ctx
        .open
        .api
        .record_event(&ctx.scope, event, move || state)
        .await?;

    match response {
        RecordEventResponse::Created { checkpoint_id } => {
            println!("{} Created checkpoint #{}", "✓".green(), checkpoint_id);
        }
        RecordEventResponse::Skipped => {
            println!(
                "{}",
                format!("No checkpoint: current settings do not checkpoint {}", kind).dimmed()
            );
        }
        RecordEventResponse::Dropped { reason } => {
            println!("{} Checkpoint dropped: {}", "⚠".yellow(), reason);
        }
    }

    Ok(())
}
