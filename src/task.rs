//! Task records and the write payloads that create or change them.
//!
//! Tasks live in the `tasks` collection. Field names on the wire are
//! camelCase; `createdAt`/`updatedAt` are always stamped by the store.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::category;
use crate::error::{Error, Result};
use crate::mirror::MirrorRecord;
use crate::remote::{Document, Write, OWNER_FIELD};

pub const TASKS_COLLECTION: &str = "tasks";

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    #[serde(alias = "High", alias = "HIGH")]
    High,
    #[default]
    #[serde(alias = "Medium", alias = "MEDIUM")]
    Medium,
    #[serde(alias = "Low", alias = "LOW")]
    Low,
}

impl Priority {
    /// Sort rank: high=1, medium=2, low=3.
    pub fn rank(self) -> u8 {
        match self {
            Priority::High => 1,
            Priority::Medium => 2,
            Priority::Low => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "high" => Ok(Priority::High),
            "medium" => Ok(Priority::Medium),
            "low" => Ok(Priority::Low),
            other => Err(Error::InvalidArgument(format!(
                "unknown priority '{other}' (expected high|medium|low)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default)]
    pub category_color: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub due_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reminder_at: Option<DateTime<Utc>>,
    #[serde(alias = "userId")]
    pub owner_id: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

fn default_category() -> String {
    category::DEFAULT_CATEGORY.to_string()
}

impl MirrorRecord for Task {
    const COLLECTION: &'static str = TASKS_COLLECTION;

    fn from_document(doc: &Document) -> Result<Self> {
        Ok(serde_json::from_value(doc.to_value())?)
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }
}

/// Input for creating a task.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskDraft {
    pub title: String,
    pub description: String,
    pub category: String,
    /// Color frozen onto the task at write time
    pub category_color: String,
    pub priority: Priority,
    pub completed: bool,
    pub due_at: Option<DateTime<Utc>>,
    pub reminder_at: Option<DateTime<Utc>>,
}

impl TaskDraft {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            category: category::DEFAULT_CATEGORY.to_string(),
            category_color: category::builtin_color(category::DEFAULT_CATEGORY)
                .unwrap_or(category::FALLBACK_COLOR)
                .to_string(),
            priority: Priority::default(),
            completed: false,
            due_at: None,
            reminder_at: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_title(&self.title)
    }

    /// Store write for this draft, owned by `owner_id`.
    pub fn to_write(&self, owner_id: &str) -> Write {
        Write::new()
            .set("title", self.title.trim())
            .set("description", self.description.as_str())
            .set("category", self.category.as_str())
            .set("categoryColor", self.category_color.as_str())
            .set("priority", self.priority.as_str())
            .set("completed", self.completed)
            .set("dueAt", timestamp_value(self.due_at))
            .set("reminderAt", timestamp_value(self.reminder_at))
            .set(OWNER_FIELD, owner_id)
            .server_timestamp("createdAt")
            .server_timestamp("updatedAt")
    }
}

/// Partial update. `None` leaves a field untouched; for the optional
/// instants `Some(None)` clears the value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    /// New category name together with its color at write time
    pub category: Option<(String, String)>,
    pub priority: Option<Priority>,
    pub completed: Option<bool>,
    pub due_at: Option<Option<DateTime<Utc>>>,
    pub reminder_at: Option<Option<DateTime<Utc>>>,
}

impl TaskPatch {
    pub fn completed(value: bool) -> Self {
        Self {
            completed: Some(value),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn validate(&self) -> Result<()> {
        match self.title.as_deref() {
            Some(title) => validate_title(title),
            None => Ok(()),
        }
    }

    /// Store write for this patch; always refreshes `updatedAt`.
    pub fn to_write(&self) -> Write {
        let mut write = Write::new();
        if let Some(title) = &self.title {
            write = write.set("title", title.trim());
        }
        if let Some(description) = &self.description {
            write = write.set("description", description.as_str());
        }
        if let Some((name, color)) = &self.category {
            write = write
                .set("category", name.as_str())
                .set("categoryColor", color.as_str());
        }
        if let Some(priority) = self.priority {
            write = write.set("priority", priority.as_str());
        }
        if let Some(completed) = self.completed {
            write = write.set("completed", completed);
        }
        if let Some(due_at) = self.due_at {
            write = write.set("dueAt", timestamp_value(due_at));
        }
        if let Some(reminder_at) = self.reminder_at {
            write = write.set("reminderAt", timestamp_value(reminder_at));
        }
        write.server_timestamp("updatedAt")
    }
}

fn validate_title(title: &str) -> Result<()> {
    if title.trim().is_empty() {
        return Err(Error::Validation("title cannot be empty".to_string()));
    }
    Ok(())
}

fn timestamp_value(value: Option<DateTime<Utc>>) -> Value {
    match value {
        Some(at) => Value::String(at.to_rfc3339()),
        None => Value::Null,
    }
}

/// Completion counts over a set of tasks.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct TaskStats {
    pub total: usize,
    pub completed: usize,
    pub pending: usize,
}

impl TaskStats {
    pub fn from_tasks(tasks: &[Task]) -> Self {
        let completed = tasks.iter().filter(|task| task.completed).count();
        Self {
            total: tasks.len(),
            completed,
            pending: tasks.len() - completed,
        }
    }
}

/// Parse an RFC 3339 timestamp from user input.
pub fn parse_timestamp(label: &str, value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|at| at.with_timezone(&Utc))
        .map_err(|err| {
            Error::InvalidArgument(format!("{label}: invalid RFC 3339 timestamp '{value}': {err}"))
        })
}
