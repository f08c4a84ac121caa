//! Print the number of checkpoints of a session

use super::Target;
use anyhow::Result;
use journal::api::ListCheckpointCount;

pub async fn run(target: &Target) -> Result<()> {
    let ctx = target.open()?;
    let count = ctx
        .open
        .api
        .list_checkpoint_count(ListCheckpointCount {
            scope: ctx.scope.clone(),
        })
        .await?;

    println!("{}", count);
    Ok(())
}
