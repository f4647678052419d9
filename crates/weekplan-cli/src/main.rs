//! weekplan CLI
//!
//! Command-line interface for weekplan - an offline-first weekly planner.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use weekplan_core::{Config, Priority, SessionGate, StorageError};

mod commands;
mod context;
mod output;

use commands::task::{ListFilter, NewTask, TaskEdit};
use context::AppContext;
use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "weekplan")]
#[command(about = "weekplan - Offline-first weekly task planner")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Verbose logging (repeat for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Use a specific config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage tasks
    Task {
        #[command(subcommand)]
        command: TaskCommands,
    },
    /// Show completion statistics
    Stats,
    /// Run a full sync with the remote
    Sync,
    /// Sync continuously (realtime + periodic) until Ctrl-C
    Watch,
    /// Manage the stored session
    Auth {
        #[command(subcommand)]
        command: Option<AuthCommands>,
    },
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
    /// Show status (account, sync, counts)
    Status,
}

#[derive(Subcommand)]
enum TaskCommands {
    /// Create a new task
    #[command(alias = "create")]
    Add {
        /// Task title
        title: String,
        /// Category
        #[arg(short, long, default_value = "general")]
        category: String,
        /// Priority (low, medium, high)
        #[arg(short, long, default_value = "medium")]
        priority: Priority,
        /// Due date (YYYY-MM-DD, today, tomorrow, +N, weekday)
        #[arg(short, long)]
        due: Option<String>,
        /// Due time (HH:MM)
        #[arg(short, long)]
        time: Option<String>,
        /// Longer description
        #[arg(short = 'D', long)]
        description: Option<String>,
    },
    /// List tasks
    #[command(alias = "ls")]
    List {
        /// Tasks due on this day
        #[arg(short, long)]
        date: Option<String>,
        /// The whole week (Monday to Sunday) containing --date or today
        #[arg(short, long)]
        week: bool,
        /// Range start (inclusive)
        #[arg(long)]
        from: Option<String>,
        /// Range end (inclusive)
        #[arg(long)]
        to: Option<String>,
        /// Filter by category
        #[arg(short, long)]
        category: Option<String>,
        /// Only completed tasks
        #[arg(long, conflicts_with = "pending")]
        done: bool,
        /// Only pending tasks
        #[arg(long)]
        pending: bool,
    },
    /// Show task details
    Show {
        /// Task ID (full or prefix)
        id: String,
    },
    /// Edit a task
    Edit {
        /// Task ID (full or prefix)
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(short = 'D', long)]
        description: Option<String>,
        #[arg(short, long)]
        category: Option<String>,
        #[arg(short, long)]
        priority: Option<Priority>,
        #[arg(short, long)]
        due: Option<String>,
        #[arg(short, long, conflicts_with = "clear_time")]
        time: Option<String>,
        /// Remove the due time
        #[arg(long)]
        clear_time: bool,
        /// Productivity score (1-5)
        #[arg(short, long, conflicts_with = "clear_score")]
        score: Option<i64>,
        /// Remove the productivity score
        #[arg(long)]
        clear_score: bool,
    },
    /// Mark a task done
    Done {
        /// Task ID (full or prefix)
        id: String,
        /// Productivity score (1-5)
        #[arg(short, long)]
        score: Option<i64>,
    },
    /// Mark a task pending again
    Undone {
        /// Task ID (full or prefix)
        id: String,
    },
    /// Delete a task
    #[command(alias = "delete")]
    Rm {
        /// Task ID (full or prefix)
        id: String,
        /// Skip confirmation
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Subcommand, Clone)]
enum AuthCommands {
    /// Store a session obtained from the auth service
    Set {
        /// User ID (the `sub` of the access token)
        user_id: String,
        /// Access token presented as bearer
        token: String,
        #[arg(long)]
        email: Option<String>,
    },
    /// Forget the stored session
    Clear,
    /// Show who is signed in
    Show,
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (data_dir, remote_url, api_key, sync_enabled, ...)
        key: String,
        /// Configuration value
        value: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:?}", e);
            if let Some(hint) = recovery_hint(&e) {
                eprintln!();
                eprintln!("Hint: {}", hint);
            }
            ExitCode::FAILURE
        }
    }
}

/// Suggestion attached to the first storage error in the chain
fn recovery_hint(error: &anyhow::Error) -> Option<&'static str> {
    error
        .chain()
        .find_map(|cause| cause.downcast_ref::<StorageError>())
        .and_then(StorageError::recovery_suggestion)
}

async fn run(cli: Cli) -> Result<()> {
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));
    let config_path = cli.config.as_ref();

    // `config set` loads and saves the file itself
    if let Commands::Config {
        command: Some(ConfigCommands::Set { key, value }),
    } = cli.command
    {
        return commands::config::set(key, value, config_path, &output);
    }

    let config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;
    init_logging(&config, cli.verbose);

    match cli.command {
        Commands::Config { .. } => commands::config::show(&config, config_path, &output),
        Commands::Auth { command } => {
            let gate = SessionGate::open(&config).context("Failed to load session")?;
            handle_auth_command(command, &gate, &output)
        }
        command => {
            let ctx = AppContext::open(config)?;
            let result = handle_command(command, &ctx, &output).await;
            ctx.shutdown().await;
            result
        }
    }
}

async fn handle_command(command: Commands, ctx: &AppContext, output: &Output) -> Result<()> {
    match command {
        Commands::Task { command } => handle_task_command(command, ctx, output).await,
        Commands::Stats => commands::stats::show(&ctx.repo, output).await,
        Commands::Sync => commands::sync::sync(ctx, output).await,
        Commands::Watch => commands::watch::watch(ctx, output).await,
        Commands::Status => commands::status::show(ctx, output).await,
        Commands::Auth { .. } | Commands::Config { .. } => unreachable!(), // Handled in main
    }
}

async fn handle_task_command(
    command: TaskCommands,
    ctx: &AppContext,
    output: &Output,
) -> Result<()> {
    let repo = &ctx.repo;
    match command {
        TaskCommands::Add {
            title,
            category,
            priority,
            due,
            time,
            description,
        } => {
            let new = NewTask {
                title,
                description,
                category,
                priority,
                due,
                time,
            };
            commands::task::add(repo, new, output).await
        }
        TaskCommands::List {
            date,
            week,
            from,
            to,
            category,
            done,
            pending,
        } => {
            let filter = ListFilter {
                date,
                week,
                from,
                to,
                category,
                done,
                pending,
            };
            commands::task::list(repo, filter, output).await
        }
        TaskCommands::Show { id } => commands::task::show(repo, id, output).await,
        TaskCommands::Edit {
            id,
            title,
            description,
            category,
            priority,
            due,
            time,
            clear_time,
            score,
            clear_score,
        } => {
            let changes = TaskEdit {
                title,
                description,
                category,
                priority,
                due,
                time,
                clear_time,
                score,
                clear_score,
            };
            commands::task::edit(repo, id, changes, output).await
        }
        TaskCommands::Done { id, score } => commands::task::done(repo, id, score, output).await,
        TaskCommands::Undone { id } => commands::task::undone(repo, id, output).await,
        TaskCommands::Rm { id, yes } => commands::task::delete(repo, id, yes, output).await,
    }
}

fn handle_auth_command(
    command: Option<AuthCommands>,
    gate: &SessionGate,
    output: &Output,
) -> Result<()> {
    match command {
        Some(AuthCommands::Set {
            user_id,
            token,
            email,
        }) => commands::auth::set(gate, user_id, token, email, output),
        Some(AuthCommands::Clear) => commands::auth::clear(gate, output),
        Some(AuthCommands::Show) | None => commands::auth::show(gate, output),
    }
}

/// Initialize logging
///
/// Level comes from WEEKPLAN_LOG, else `-v`/`-vv`, else warnings only.
/// Logs go to `log_file` when configured, stderr otherwise.
fn init_logging(config: &Config, verbose: u8) {
    let log_level = std::env::var("WEEKPLAN_LOG").unwrap_or_else(|_| {
        match verbose {
            0 => "warn",
            1 => "debug",
            _ => "trace",
        }
        .to_string()
    });
    let env_filter = EnvFilter::new(format!(
        "weekplan_core={},weekplan_cli={}",
        log_level, log_level
    ));

    if let Some(ref log_path) = config.log_file {
        match OpenOptions::new().create(true).append(true).open(log_path) {
            Ok(file) => {
                let _ = tracing_subscriber::fmt()
                    .with_env_filter(env_filter)
                    .with_target(false)
                    .with_ansi(false)
                    .with_writer(file)
                    .try_init();
                return;
            }
            Err(e) => {
                eprintln!("Warning: Could not open log file {:?}: {}", log_path, e);
            }
        }
    }

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recovery_hint_found_through_context() {
        let storage = StorageError::from_io(
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
            PathBuf::from("/data/tasks.db"),
        );
        let error = anyhow::Error::new(storage).context("Failed to open task database");

        assert!(recovery_hint(&error).unwrap().contains("data_dir"));
    }

    #[test]
    fn test_recovery_hint_through_sync_error() {
        let storage = StorageError::InvalidFormat {
            path: PathBuf::from("sync_state.json"),
            details: "expected value".to_string(),
        };
        let error = anyhow::Error::new(weekplan_core::SyncError::from(storage));

        assert!(recovery_hint(&error).is_some());
    }

    #[test]
    fn test_no_hint_for_other_errors() {
        let error = anyhow::anyhow!("No task found matching: abc");
        assert_eq!(recovery_hint(&error), None);
    }
}
