//! Watch command handler
//!
//! Keeps the local store in step with the remote until interrupted: one
//! full sync up front, then realtime change notifications and a periodic
//! full sync.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use weekplan_core::sync::SyncPhase;

use crate::context::AppContext;
use crate::output::Output;

use super::sync::{report, require_coordinator};

/// Sync continuously until Ctrl-C
pub async fn watch(ctx: &AppContext, output: &Output) -> Result<()> {
    let coordinator = require_coordinator(ctx)?;

    report(coordinator.perform_sync().await, output)?;

    coordinator.start().await;
    if let Some(interval) = ctx.config.sync_interval() {
        coordinator.start_periodic(interval);
    }

    if coordinator.is_subscribed() {
        output.message("Watching for remote changes. Press Ctrl-C to stop.");
    } else {
        output.message("Realtime updates unavailable. Press Ctrl-C to stop.");
    }

    let mut phase = coordinator.subscribe_phase();
    let mut last_reported = coordinator.last_synced();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            signal = &mut ctrl_c => {
                signal.context("Failed to listen for Ctrl-C")?;
                info!("Interrupted, stopping watch");
                break;
            }
            changed = phase.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = *phase.borrow_and_update();
                debug!("Sync phase: {:?}", current);
                if current != SyncPhase::Idle {
                    continue;
                }
                if let Some(at) = newly_synced(&mut last_reported, coordinator.last_synced()) {
                    output.message(&format!(
                        "Synced at {}",
                        at.with_timezone(&chrono::Local).format("%H:%M:%S")
                    ));
                }
            }
        }
    }

    output.message("Stopping...");
    coordinator.stop();
    coordinator.stop_periodic();
    Ok(())
}

/// The bookmark if it moved since the last report; failed syncs leave it put
fn newly_synced(
    reported: &mut Option<DateTime<Utc>>,
    current: Option<DateTime<Utc>>,
) -> Option<DateTime<Utc>> {
    if current == *reported {
        return None;
    }
    *reported = current;
    current
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_only_reports_when_bookmark_moves() {
        let first = Utc.timestamp_millis_opt(1_000).unwrap();
        let second = Utc.timestamp_millis_opt(2_000).unwrap();
        let mut reported = Some(first);

        // Failed sync: phase went back to Idle but the bookmark did not move
        assert_eq!(newly_synced(&mut reported, Some(first)), None);
        assert_eq!(newly_synced(&mut reported, Some(second)), Some(second));
        assert_eq!(newly_synced(&mut reported, Some(second)), None);
        assert_eq!(reported, Some(second));
    }

    #[test]
    fn test_first_success_after_never_synced() {
        let at = Utc.timestamp_millis_opt(5_000).unwrap();
        let mut reported = None;

        assert_eq!(newly_synced(&mut reported, None), None);
        assert_eq!(newly_synced(&mut reported, Some(at)), Some(at));
    }
}
