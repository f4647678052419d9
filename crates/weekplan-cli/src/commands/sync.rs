//! Sync command handler

use anyhow::{bail, Result};

use weekplan_core::{SyncCoordinator, SyncError, SyncSummary};

use crate::context::AppContext;
use crate::output::Output;

/// Run one full sync and report the outcome
pub async fn sync(ctx: &AppContext, output: &Output) -> Result<()> {
    let coordinator = require_coordinator(ctx)?;

    output.message("Syncing...");
    report(coordinator.perform_sync().await, output)
}

/// The attached coordinator, or guidance on how to configure one
pub fn require_coordinator(ctx: &AppContext) -> Result<&SyncCoordinator> {
    if !ctx.config.sync_enabled {
        bail!(
            "Sync is not enabled. Enable it with:\n  \
             weekplan config set sync_enabled true"
        );
    }

    match ctx.coordinator() {
        Some(coordinator) => Ok(coordinator),
        None => bail!(
            "Remote not configured. Set it with:\n  \
             weekplan config set remote_url https://your-project.example.com\n  \
             weekplan config set api_key <anon-key>"
        ),
    }
}

/// Print a full sync outcome
///
/// Signed-out and already-running outcomes are informational, not failures.
pub fn report(result: Result<SyncSummary, SyncError>, output: &Output) -> Result<()> {
    match result {
        Ok(summary) => {
            output.print_sync_summary(&summary);
            Ok(())
        }
        Err(SyncError::AuthRequired) => {
            output.warn("Not signed in, nothing synced. Store a session with `weekplan auth set`.");
            Ok(())
        }
        Err(SyncError::AlreadyRunning) => {
            output.message("A sync is already running.");
            Ok(())
        }
        Err(e) => {
            if e.is_transient() {
                output.warn("Remote unreachable, local changes are kept for the next sync.");
            }
            Err(e.into())
        }
    }
}
