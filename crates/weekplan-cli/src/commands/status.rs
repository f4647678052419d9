//! Status command handler

use anyhow::Result;

use weekplan_core::AuthGate;

use crate::context::AppContext;
use crate::output::{Output, OutputFormat};

/// Show status information
pub async fn show(ctx: &AppContext, output: &Output) -> Result<()> {
    let config = &ctx.config;
    let total = ctx.store.count().await?;
    let pending = ctx.repo.pending_count().await?;
    let user = ctx.session.current_user();
    let last_synced = ctx.coordinator().and_then(|c| c.last_synced());

    let sync_status = if ctx.coordinator().is_some() {
        "enabled"
    } else if config.sync_enabled {
        "enabled (remote not configured)"
    } else {
        "disabled"
    };

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "data_dir": config.data_dir,
                    "sync": {
                        "enabled": config.sync_enabled,
                        "configured": ctx.coordinator().is_some(),
                        "remote_url": config.remote_url,
                        "last_synced": last_synced.map(|at| at.to_rfc3339()),
                    },
                    "user_id": user.as_ref().map(|u| &u.id),
                    "counts": {
                        "tasks": total,
                        "pending": pending
                    }
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", total);
        }
        OutputFormat::Human => {
            println!("weekplan Status");
            println!("===============");
            println!();
            println!("Account:");
            match user {
                Some(ref user) => println!(
                    "  Signed in: {}",
                    user.email.as_deref().unwrap_or(&user.id)
                ),
                None => println!("  Not signed in"),
            }
            println!();
            println!("Sync:");
            println!("  Status:      {}", sync_status);
            if let Some(ref url) = config.remote_url {
                println!("  Remote:      {}", url);
            }
            match last_synced {
                Some(at) => println!(
                    "  Last synced: {}",
                    at.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M:%S")
                ),
                None => println!("  Last synced: never"),
            }
            println!();
            println!("Storage:");
            println!("  Location: {}", config.data_dir.display());
            println!();
            println!("Contents:");
            println!("  Tasks:   {}", total);
            println!("  Pending: {}", pending);
        }
    }

    Ok(())
}
