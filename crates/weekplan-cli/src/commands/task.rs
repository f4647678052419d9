//! Task command handlers

use std::io::{self, IsTerminal, Write};

use anyhow::{bail, Context, Result};
use chrono::{Datelike, Days, Local, NaiveDate, NaiveTime};

use weekplan_core::{Priority, Task, TaskRepository};

use crate::output::{short_id, Output};

/// Fields for a new task
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub category: String,
    pub priority: Priority,
    pub due: Option<String>,
    pub time: Option<String>,
}

/// Field changes requested by `task edit`
#[derive(Default)]
pub struct TaskEdit {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub priority: Option<Priority>,
    pub due: Option<String>,
    pub time: Option<String>,
    pub clear_time: bool,
    pub score: Option<i64>,
    pub clear_score: bool,
}

impl TaskEdit {
    /// Apply the changes, returning whether anything changed
    fn apply(self, task: &mut Task, today: NaiveDate) -> Result<bool> {
        let mut changed = false;

        if let Some(title) = self.title {
            task.set_title(title);
            changed = true;
        }
        if let Some(description) = self.description {
            task.set_description(description);
            changed = true;
        }
        if let Some(category) = self.category {
            task.set_category(category);
            changed = true;
        }
        if let Some(priority) = self.priority {
            task.set_priority(priority);
            changed = true;
        }

        if self.due.is_some() || self.time.is_some() || self.clear_time {
            let due_date = match self.due {
                Some(ref due) => parse_date(due, today)?,
                None => task.due_date,
            };
            let due_time = if self.clear_time {
                None
            } else {
                match self.time {
                    Some(ref time) => Some(parse_time(time)?),
                    None => task.due_time,
                }
            };
            task.reschedule(due_date, due_time);
            changed = true;
        }

        if self.clear_score {
            task.set_productivity_score(None)?;
            changed = true;
        } else if let Some(score) = self.score {
            task.set_productivity_score(Some(score))?;
            changed = true;
        }

        Ok(changed)
    }
}

/// Which tasks `task list` shows
#[derive(Default)]
pub struct ListFilter {
    pub date: Option<String>,
    pub week: bool,
    pub from: Option<String>,
    pub to: Option<String>,
    pub category: Option<String>,
    pub done: bool,
    pub pending: bool,
}

/// Create a new task
pub async fn add(repo: &TaskRepository, new: NewTask, output: &Output) -> Result<()> {
    let today = today();
    let due_date = match new.due {
        Some(ref due) => parse_date(due, today)?,
        None => today,
    };

    let mut task = Task::new(new.title, new.category, new.priority, due_date);
    if let Some(description) = new.description {
        task.description = description;
    }
    if let Some(ref time) = new.time {
        task.due_time = Some(parse_time(time)?);
    }

    repo.insert(&task).await?;

    output.success(&format!("Created task: {}", task.id));
    output.print_task(&task);
    Ok(())
}

/// List tasks
pub async fn list(repo: &TaskRepository, filter: ListFilter, output: &Output) -> Result<()> {
    let tasks = select(repo, filter, today()).await?;
    output.print_tasks(&tasks);
    Ok(())
}

/// Show a single task
pub async fn show(repo: &TaskRepository, id: String, output: &Output) -> Result<()> {
    let task = resolve(repo, &id).await?;
    output.print_task(&task);
    Ok(())
}

/// Edit a task's fields
pub async fn edit(
    repo: &TaskRepository,
    id: String,
    changes: TaskEdit,
    output: &Output,
) -> Result<()> {
    let mut task = resolve(repo, &id).await?;

    if !changes.apply(&mut task, today())? {
        output.message("Nothing to change.");
        return Ok(());
    }

    let task = repo.update(task).await?;
    output.success(&format!("Updated task: {}", task.id));
    output.print_task(&task);
    Ok(())
}

/// Mark a task done, optionally scoring it
pub async fn done(
    repo: &TaskRepository,
    id: String,
    score: Option<i64>,
    output: &Output,
) -> Result<()> {
    let mut task = resolve(repo, &id).await?;

    let task = match score {
        Some(score) => {
            task.set_productivity_score(Some(score))?;
            task.set_completed(true);
            repo.update(task).await?
        }
        None => repo
            .set_completed(&task.id, true)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Task not found: {}", id))?,
    };

    output.success(&format!("Completed: {}", task.title));
    Ok(())
}

/// Mark a task pending again
pub async fn undone(repo: &TaskRepository, id: String, output: &Output) -> Result<()> {
    let task = resolve(repo, &id).await?;

    let task = repo
        .set_completed(&task.id, false)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Task not found: {}", id))?;

    output.success(&format!("Reopened: {}", task.title));
    Ok(())
}

/// Delete a task
pub async fn delete(repo: &TaskRepository, id: String, yes: bool, output: &Output) -> Result<()> {
    let task = resolve(repo, &id).await?;

    if !yes && output.should_prompt() {
        println!("Delete task: {} - {}", short_id(&task.id), task.title);
        if !confirm("Are you sure?")? {
            println!("Cancelled.");
            return Ok(());
        }
    }

    repo.delete(&task).await.context("Failed to delete task")?;

    output.success(&format!("Deleted task: {}", task.id));
    Ok(())
}

async fn select(repo: &TaskRepository, filter: ListFilter, today: NaiveDate) -> Result<Vec<Task>> {
    if filter.done && filter.pending {
        bail!("--done and --pending are mutually exclusive");
    }

    let mut tasks = if filter.from.is_some() || filter.to.is_some() {
        let start = match filter.from {
            Some(ref from) => parse_date(from, today)?,
            None => today,
        };
        let end = match filter.to {
            Some(ref to) => parse_date(to, today)?,
            None => start,
        };
        if end < start {
            bail!("Range end {} is before start {}", end, start);
        }
        repo.by_date_range(start, end).await?
    } else if filter.week {
        let anchor = match filter.date {
            Some(ref date) => parse_date(date, today)?,
            None => today,
        };
        let (start, end) = week_bounds(anchor)?;
        repo.by_date_range(start, end).await?
    } else if let Some(ref date) = filter.date {
        repo.by_date(parse_date(date, today)?).await?
    } else if let Some(ref category) = filter.category {
        repo.by_category(category).await?
    } else if filter.done || filter.pending {
        repo.by_completion(filter.done).await?
    } else {
        repo.all().await?
    };

    if let Some(ref category) = filter.category {
        tasks.retain(|t| &t.category == category);
    }
    if filter.done || filter.pending {
        tasks.retain(|t| t.is_completed == filter.done);
    }

    Ok(tasks)
}

/// Find a task by full ID or unique prefix
async fn resolve(repo: &TaskRepository, id: &str) -> Result<Task> {
    if let Some(task) = repo.by_id(id).await? {
        return Ok(task);
    }

    let tasks = repo.all().await?;
    let mut matches: Vec<_> = tasks.into_iter().filter(|t| t.id.starts_with(id)).collect();

    match matches.len() {
        0 => bail!("No task found matching: {}", id),
        1 => Ok(matches.remove(0)),
        _ => {
            eprintln!("Multiple tasks match '{}':", id);
            for task in &matches {
                eprintln!("  {} - {}", task.id, task.title);
            }
            bail!("Ambiguous ID. Please provide more characters.");
        }
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Parse `today`, `tomorrow`, `yesterday`, `+N`/`-N` days, a weekday name
/// (next occurrence, today included) or `YYYY-MM-DD`
pub fn parse_date(input: &str, today: NaiveDate) -> Result<NaiveDate> {
    let value = input.trim().to_ascii_lowercase();

    match value.as_str() {
        "today" => return Ok(today),
        "tomorrow" => return shift(today, 1),
        "yesterday" => return shift(today, -1),
        _ => {}
    }

    if value.starts_with(['+', '-']) {
        if let Ok(days) = value.parse::<i64>() {
            return shift(today, days);
        }
    }

    if let Ok(weekday) = value.parse::<chrono::Weekday>() {
        let ahead = (weekday.num_days_from_monday() as i64
            - today.weekday().num_days_from_monday() as i64)
            .rem_euclid(7);
        return shift(today, ahead);
    }

    NaiveDate::parse_from_str(&value, "%Y-%m-%d").with_context(|| {
        format!(
            "Invalid date '{}'. Use YYYY-MM-DD, today, tomorrow, +N or a weekday",
            input
        )
    })
}

/// Parse `HH:MM`
pub fn parse_time(input: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(input.trim(), "%H:%M")
        .with_context(|| format!("Invalid time '{}'. Use HH:MM", input))
}

/// Monday and Sunday of the week containing `date`
pub fn week_bounds(date: NaiveDate) -> Result<(NaiveDate, NaiveDate)> {
    let start = shift(date, -(date.weekday().num_days_from_monday() as i64))?;
    Ok((start, shift(start, 6)?))
}

/// `date` moved by a signed number of days
fn shift(date: NaiveDate, days: i64) -> Result<NaiveDate> {
    let magnitude = Days::new(days.unsigned_abs());
    let shifted = if days >= 0 {
        date.checked_add_days(magnitude)
    } else {
        date.checked_sub_days(magnitude)
    };
    shifted.ok_or_else(|| anyhow::anyhow!("Date out of range: {} day(s) from {}", days, date))
}

/// Prompt for confirmation; false when stdin is not a terminal
fn confirm(prompt: &str) -> Result<bool> {
    if !io::stdin().is_terminal() {
        return Ok(false);
    }

    print!("{} [y/N] ", prompt);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;

    let input = input.trim().to_lowercase();
    Ok(input == "y" || input == "yes")
}
