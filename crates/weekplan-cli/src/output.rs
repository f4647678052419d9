//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use serde::Serialize;

use weekplan_core::{SyncSummary, Task, TaskStats};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Check if output is in quiet mode
    pub fn is_quiet(&self) -> bool {
        matches!(self.format, OutputFormat::Quiet)
    }

    /// Print a single task
    pub fn print_task(&self, task: &Task) {
        match self.format {
            OutputFormat::Human => {
                println!("ID:          {}", task.id);
                println!("Title:       {}", task.title);
                if !task.description.is_empty() {
                    println!("Description: {}", task.description);
                }
                println!("Category:    {}", task.category);
                println!("Priority:    {}", task.priority.label());
                println!("Due:         {}", format_due(task));
                println!(
                    "Status:      {}",
                    if task.is_completed { "done" } else { "pending" }
                );
                if let Some(score) = task.productivity_score {
                    println!("Score:       {}/5", score);
                }
                println!("Created:     {}", task.created_at.format("%Y-%m-%d %H:%M"));
                println!("Updated:     {}", task.updated_at.format("%Y-%m-%d %H:%M"));
            }
            OutputFormat::Json => print_json(task),
            OutputFormat::Quiet => {
                println!("{}", task.id);
            }
        }
    }

    /// Print a list of tasks
    pub fn print_tasks(&self, tasks: &[Task]) {
        match self.format {
            OutputFormat::Human => {
                if tasks.is_empty() {
                    println!("No tasks found.");
                    return;
                }
                for task in tasks {
                    println!("{}", task_line(task));
                }
                println!("\n{} task(s)", tasks.len());
            }
            OutputFormat::Json => print_json(tasks),
            OutputFormat::Quiet => {
                for task in tasks {
                    println!("{}", task.id);
                }
            }
        }
    }

    /// Print completion statistics
    pub fn print_stats(&self, stats: &TaskStats) {
        match self.format {
            OutputFormat::Human => {
                println!("Completed: {}", stats.completed);
                println!("Pending:   {}", stats.pending);
                match stats.average_score {
                    Some(avg) => println!("Avg score: {:.2}", avg),
                    None => println!("Avg score: (none)"),
                }
                if !stats.categories.is_empty() {
                    println!();
                    println!("Categories:");
                    for entry in &stats.categories {
                        println!("  {} ({})", entry.category, entry.count);
                    }
                }
            }
            OutputFormat::Json => print_json(stats),
            OutputFormat::Quiet => {
                println!("{} {}", stats.completed, stats.pending);
            }
        }
    }

    /// Print the outcome of a full sync
    pub fn print_sync_summary(&self, summary: &SyncSummary) {
        match self.format {
            OutputFormat::Human => {
                println!(
                    "✓ Sync complete - pushed {}, pulled {}",
                    summary.pushed, summary.pulled
                );
                println!(
                    "  Last synced: {}",
                    summary.bookmark.format("%Y-%m-%d %H:%M:%S")
                );
            }
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({
                        "status": "success",
                        "pushed": summary.pushed,
                        "pulled": summary.pulled,
                        "last_synced": summary.bookmark.to_rfc3339(),
                    })
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Check if we should prompt for confirmation
    pub fn should_prompt(&self) -> bool {
        self.format == OutputFormat::Human
    }

    /// Print an informational message
    pub fn message(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("{}", msg),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({"message": msg}));
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print a warning to stderr (suppressed in quiet mode)
    pub fn warn(&self, msg: &str) {
        if !self.is_quiet() {
            eprintln!("⚠ {}", msg);
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Failed to encode JSON: {}", e),
    }
}

/// One-line summary used by list output
fn task_line(task: &Task) -> String {
    let check = if task.is_completed { "[x]" } else { "[ ]" };
    let score = task
        .productivity_score
        .map(|s| format!(" ({}/5)", s))
        .unwrap_or_default();
    format!(
        "{} {} | {} | {:<6} | {}{} | {}",
        check,
        short_id(&task.id),
        format_due(task),
        task.priority.label(),
        truncate(&task.title, 40),
        score,
        task.category
    )
}

fn format_due(task: &Task) -> String {
    match task.due_time {
        Some(time) => format!("{} {}", task.due_date.format("%a %Y-%m-%d"), time.format("%H:%M")),
        None => task.due_date.format("%a %Y-%m-%d").to_string(),
    }
}

/// First eight characters of an ID
pub fn short_id(id: &str) -> &str {
    match id.char_indices().nth(8) {
        Some((idx, _)) => &id[..idx],
        None => id,
    }
}

/// Truncate a string to max length, adding "..." if truncated
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
