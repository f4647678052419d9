//! Data models for weekplan
//!
//! Defines the core data structures: Task, Priority and the aggregate
//! shapes returned by statistics queries.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Validation errors for task fields
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("Invalid priority {0}: expected 1 (low), 2 (medium) or 3 (high)")]
    InvalidPriority(i64),

    #[error("Invalid productivity score {0}: expected a value from 1 to 5")]
    InvalidScore(i64),

    #[error("Timestamp out of range: {0}")]
    InvalidTimestamp(i64),
}

/// Task priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "i64")]
pub enum Priority {
    Low = 1,
    Medium = 2,
    High = 3,
}

impl Priority {
    /// Numeric value used in storage and on the wire
    pub fn value(self) -> u8 {
        self as u8
    }

    pub fn label(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

impl From<Priority> for u8 {
    fn from(p: Priority) -> Self {
        p.value()
    }
}

impl TryFrom<i64> for Priority {
    type Error = ModelError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Priority::Low),
            2 => Ok(Priority::Medium),
            3 => Ok(Priority::High),
            other => Err(ModelError::InvalidPriority(other)),
        }
    }
}

impl std::str::FromStr for Priority {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" | "1" => Ok(Priority::Low),
            "medium" | "med" | "2" => Ok(Priority::Medium),
            "high" | "3" => Ok(Priority::High),
            _ => Err(ModelError::InvalidPriority(s.parse().unwrap_or(-1))),
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Check a productivity score is within 1..=5
pub fn validate_score(score: i64) -> Result<u8, ModelError> {
    if (1..=5).contains(&score) {
        Ok(score as u8)
    } else {
        Err(ModelError::InvalidScore(score))
    }
}

/// A planned unit of work
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    /// Unique identifier, generated on creation and never reassigned
    pub id: String,
    pub title: String,
    pub description: String,
    pub category: String,
    pub priority: Priority,
    /// Calendar day the task is due
    pub due_date: NaiveDate,
    /// Optional time of day on `due_date`
    pub due_time: Option<NaiveTime>,
    pub is_completed: bool,
    /// Self-rated productivity, 1-5
    pub productivity_score: Option<u8>,
    pub created_at: DateTime<Utc>,
    /// Stamped on every mutation; drives incremental pulls
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Create a new task due on the given day
    pub fn new(
        title: impl Into<String>,
        category: impl Into<String>,
        priority: Priority,
        due_date: NaiveDate,
    ) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), title, category, priority, due_date)
    }

    /// Create a task with a specific ID (for loading from storage)
    pub fn with_id(
        id: impl Into<String>,
        title: impl Into<String>,
        category: impl Into<String>,
        priority: Priority,
        due_date: NaiveDate,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            category: category.into(),
            priority,
            due_date,
            due_time: None,
            is_completed: false,
            productivity_score: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
        self.touch();
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
        self.touch();
    }

    pub fn set_category(&mut self, category: impl Into<String>) {
        self.category = category.into();
        self.touch();
    }

    pub fn set_priority(&mut self, priority: Priority) {
        self.priority = priority;
        self.touch();
    }

    /// Move the task to another day and/or time
    pub fn reschedule(&mut self, due_date: NaiveDate, due_time: Option<NaiveTime>) {
        self.due_date = due_date;
        self.due_time = due_time;
        self.touch();
    }

    pub fn set_completed(&mut self, completed: bool) {
        self.is_completed = completed;
        self.touch();
    }

    /// Set or clear the productivity score
    pub fn set_productivity_score(&mut self, score: Option<i64>) -> Result<(), ModelError> {
        self.productivity_score = score.map(validate_score).transpose()?;
        self.touch();
        Ok(())
    }

    /// Stamp `updated_at` with the current time
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Number of tasks in one category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCount {
    pub category: String,
    pub count: i64,
}

/// Summary counts over the local task store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStats {
    pub completed: i64,
    pub pending: i64,
    pub average_score: Option<f64>,
    pub categories: Vec<CategoryCount>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_task_new() {
        let task = Task::new("Write report", "work", Priority::High, day(2026, 3, 2));
        assert_eq!(task.title, "Write report");
        assert_eq!(task.category, "work");
        assert!(task.description.is_empty());
        assert!(!task.is_completed);
        assert!(task.productivity_score.is_none());
        assert_eq!(task.created_at, task.updated_at);
        assert!(Uuid::parse_str(&task.id).is_ok());
    }

    #[test]
    fn test_ids_are_unique() {
        let a = Task::new("a", "x", Priority::Low, day(2026, 1, 1));
        let b = Task::new("a", "x", Priority::Low, day(2026, 1, 1));
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_setters_stamp_updated_at() {
        let mut task = Task::new("Gym", "health", Priority::Medium, day(2026, 3, 2));
        let original = task.updated_at;
        std::thread::sleep(std::time::Duration::from_millis(10));
        task.set_completed(true);
        assert!(task.is_completed);
        assert!(task.updated_at > original);
    }

    #[test]
    fn test_productivity_score_validation() {
        let mut task = Task::new("Read", "study", Priority::Low, day(2026, 3, 2));
        task.set_productivity_score(Some(4)).unwrap();
        assert_eq!(task.productivity_score, Some(4));

        assert_eq!(
            task.set_productivity_score(Some(6)),
            Err(ModelError::InvalidScore(6))
        );
        // Rejected update leaves the old value
        assert_eq!(task.productivity_score, Some(4));

        task.set_productivity_score(None).unwrap();
        assert!(task.productivity_score.is_none());
    }

    #[test]
    fn test_priority_conversions() {
        assert_eq!(Priority::try_from(3), Ok(Priority::High));
        assert_eq!(Priority::try_from(0), Err(ModelError::InvalidPriority(0)));
        assert_eq!("Medium".parse::<Priority>(), Ok(Priority::Medium));
        assert_eq!("2".parse::<Priority>(), Ok(Priority::Medium));
        assert!("urgent".parse::<Priority>().is_err());
        assert_eq!(Priority::Low.value(), 1);
        assert!(Priority::High > Priority::Low);
    }

    #[test]
    fn test_task_serialization() {
        let mut task = Task::new("Plan week", "personal", Priority::Medium, day(2026, 3, 1));
        task.due_time = NaiveTime::from_hms_opt(9, 30, 0);
        let json = serde_json::to_string(&task).unwrap();
        assert!(json.contains("\"priority\":2"));

        let deserialized: Task = serde_json::from_str(&json).unwrap();
        assert_eq!(task, deserialized);
    }
}
