//! Wire representation of a task in the remote `tasks` table

use serde::{Deserialize, Serialize};

use super::error::RemoteError;
use crate::millis;
use crate::models::{validate_score, ModelError, Priority, Task};

/// One row of the remote `tasks` table
///
/// Timestamps are epoch milliseconds. `due_date` is UTC midnight of the due
/// day; `due_time`, when set, is the absolute instant of that day plus the
/// time of day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteTaskRow {
    pub id: String,
    pub user_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub category: String,
    pub priority: i64,
    pub due_date: i64,
    #[serde(default)]
    pub due_time: Option<i64>,
    #[serde(default)]
    pub is_completed: bool,
    #[serde(default)]
    pub productivity_score: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl RemoteTaskRow {
    /// Row for `task` owned by `user_id`
    pub fn from_task(task: &Task, user_id: &str) -> Self {
        Self {
            id: task.id.clone(),
            user_id: user_id.to_string(),
            title: task.title.clone(),
            description: task.description.clone(),
            category: task.category.clone(),
            priority: i64::from(task.priority.value()),
            due_date: millis::from_date(task.due_date),
            due_time: task
                .due_time
                .map(|time| millis::from_date_time(task.due_date, time)),
            is_completed: task.is_completed,
            productivity_score: task.productivity_score.map(i64::from),
            created_at: millis::from_datetime(&task.created_at),
            updated_at: millis::from_datetime(&task.updated_at),
        }
    }
}

impl TryFrom<RemoteTaskRow> for Task {
    type Error = RemoteError;

    fn try_from(row: RemoteTaskRow) -> Result<Self, Self::Error> {
        let invalid = |source: ModelError| RemoteError::InvalidRow {
            id: row.id.clone(),
            source,
        };

        let priority = Priority::try_from(row.priority).map_err(invalid)?;
        let productivity_score = row
            .productivity_score
            .map(validate_score)
            .transpose()
            .map_err(invalid)?;
        let due_date = millis::to_date(row.due_date)
            .ok_or_else(|| invalid(ModelError::InvalidTimestamp(row.due_date)))?;
        let created_at = millis::to_datetime(row.created_at)
            .ok_or_else(|| invalid(ModelError::InvalidTimestamp(row.created_at)))?;
        let updated_at = millis::to_datetime(row.updated_at)
            .ok_or_else(|| invalid(ModelError::InvalidTimestamp(row.updated_at)))?;

        Ok(Task {
            id: row.id,
            title: row.title,
            description: row.description,
            category: row.category,
            priority,
            due_date,
            due_time: row.due_time.and_then(millis::to_time_of_day),
            is_completed: row.is_completed,
            productivity_score,
            created_at,
            updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};

    fn sample_task() -> Task {
        let mut task = Task::new(
            "Review PR",
            "work",
            Priority::High,
            NaiveDate::from_ymd_opt(2026, 3, 4).unwrap(),
        );
        task.set_description("before standup");
        task.due_time = NaiveTime::from_hms_opt(10, 30, 0);
        task.set_productivity_score(Some(5)).unwrap();
        task
    }

    #[test]
    fn test_row_preserves_task_to_the_millisecond() {
        let task = sample_task();
        let row = RemoteTaskRow::from_task(&task, "user-1");
        assert_eq!(row.user_id, "user-1");
        assert_eq!(row.priority, 3);

        let back = Task::try_from(row).unwrap();
        assert_eq!(back.id, task.id);
        assert_eq!(back.due_date, task.due_date);
        assert_eq!(back.due_time, task.due_time);
        assert_eq!(back.productivity_score, Some(5));
        assert_eq!(back.created_at, millis::truncate(task.created_at));
        assert_eq!(back.updated_at, millis::truncate(task.updated_at));
    }

    #[test]
    fn test_due_time_is_absolute_instant() {
        let task = sample_task();
        let row = RemoteTaskRow::from_task(&task, "user-1");

        let offset = 10 * 3_600_000 + 30 * 60_000;
        assert_eq!(row.due_time, Some(row.due_date + offset));
    }

    #[test]
    fn test_wire_format_is_snake_case() {
        let row = RemoteTaskRow::from_task(&sample_task(), "user-1");
        let json = serde_json::to_value(&row).unwrap();

        assert!(json.get("user_id").is_some());
        assert!(json.get("is_completed").is_some());
        assert!(json.get("productivity_score").is_some());
    }

    #[test]
    fn test_missing_optional_fields_default() {
        let json = r#"{
            "id": "t1", "user_id": "u1", "title": "Bare", "category": "misc",
            "priority": 1, "due_date": 0, "created_at": 0, "updated_at": 0
        }"#;
        let row: RemoteTaskRow = serde_json::from_str(json).unwrap();
        let task = Task::try_from(row).unwrap();

        assert!(task.description.is_empty());
        assert!(task.due_time.is_none());
        assert!(!task.is_completed);
    }

    #[test]
    fn test_invalid_priority_is_rejected() {
        let mut row = RemoteTaskRow::from_task(&sample_task(), "user-1");
        row.priority = 9;

        match Task::try_from(row) {
            Err(RemoteError::InvalidRow { source, .. }) => {
                assert_eq!(source, ModelError::InvalidPriority(9));
            }
            other => panic!("Expected InvalidRow, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_score_is_rejected() {
        let mut row = RemoteTaskRow::from_task(&sample_task(), "user-1");
        row.productivity_score = Some(0);
        assert!(Task::try_from(row).is_err());
    }
}
