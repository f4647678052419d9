//! Stats command handler

use anyhow::Result;

use weekplan_core::TaskRepository;

use crate::output::Output;

/// Show completion counts, average score and categories
pub async fn show(repo: &TaskRepository, output: &Output) -> Result<()> {
    let stats = repo.stats().await?;
    output.print_stats(&stats);
    Ok(())
}
