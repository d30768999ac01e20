//! JSON export and import of a user's tasks.
//!
//! Export writes the mirror's items as a pretty JSON array. Import reads an
//! array of task objects, checks every entry, and only then creates each one
//! as a new task owned by the signed-in user.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::category;
use crate::error::{Error, Result};
use crate::mirror::TaskMirror;
use crate::task::{Priority, Task, TaskDraft};

pub fn export_json(tasks: &[Task]) -> Result<String> {
    Ok(serde_json::to_string_pretty(tasks)?)
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BackupEntry {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    category_color: Option<String>,
    #[serde(default)]
    priority: Option<String>,
    #[serde(default)]
    completed: Option<bool>,
    #[serde(default)]
    due_at: Option<DateTime<Utc>>,
    #[serde(default)]
    reminder_at: Option<DateTime<Utc>>,
}

impl BackupEntry {
    fn into_draft(self, index: usize) -> Result<TaskDraft> {
        let title = self.title.unwrap_or_default();
        if title.trim().is_empty() {
            return Err(invalid(format!("entry {index} has no title")));
        }
        let mut draft = TaskDraft::new(title);
        draft.description = self.description.unwrap_or_default();
        if let Some(name) = non_empty(self.category) {
            draft.category = name;
        }
        draft.category_color = non_empty(self.category_color).unwrap_or_else(|| {
            category::builtin_color(category::DEFAULT_CATEGORY)
                .unwrap_or(category::FALLBACK_COLOR)
                .to_string()
        });
        draft.priority = self
            .priority
            .and_then(|raw| raw.parse::<Priority>().ok())
            .unwrap_or_default();
        draft.completed = self.completed.unwrap_or(false);
        draft.due_at = self.due_at;
        draft.reminder_at = self.reminder_at;
        Ok(draft)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

fn invalid(reason: String) -> Error {
    Error::Validation(format!("invalid backup file: {reason}"))
}

/// Parse and check a whole backup before anything is written.
pub fn parse_backup(text: &str) -> Result<Vec<TaskDraft>> {
    let value: Value =
        serde_json::from_str(text).map_err(|err| invalid(format!("not JSON ({err})")))?;
    let Value::Array(entries) = value else {
        return Err(invalid("expected an array of tasks".to_string()));
    };
    entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| {
            if !entry.is_object() {
                return Err(invalid(format!("entry {index} is not an object")));
            }
            let entry: BackupEntry = serde_json::from_value(entry)
                .map_err(|err| invalid(format!("entry {index}: {err}")))?;
            entry.into_draft(index)
        })
        .collect()
}

/// Create every draft through `tasks`, in order. Returns how many were
/// created; the first rejected write stops the import.
pub async fn import(tasks: &TaskMirror, drafts: Vec<TaskDraft>) -> Result<usize> {
    if tasks.owner().is_none() {
        return Err(Error::NotBound);
    }
    let total = drafts.len();
    for (done, draft) in drafts.into_iter().enumerate() {
        if let Err(err) = tasks.create(draft).await {
            tracing::warn!(imported = done, total, error = %err, "import stopped");
            return Err(err);
        }
    }
    tracing::info!(total, "tasks imported");
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{DocumentStore, MemoryStore};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn applies_defaults_for_missing_fields() {
        let drafts = parse_backup(
            r#"[{"title": "Buy milk", "priority": "HIGH"}, {"title": "x", "priority": "urgent"}]"#,
        )
        .expect("parse");

        assert_eq!(drafts.len(), 2);
        let first = &drafts[0];
        assert_eq!(first.description, "");
        assert_eq!(first.category, "Personal");
        assert_eq!(first.category_color, "#3b82f6");
        assert_eq!(first.priority, Priority::High);
        assert!(!first.completed);
        assert!(first.due_at.is_none());
        assert_eq!(drafts[1].priority, Priority::Medium);
    }

    #[test]
    fn keeps_given_fields() {
        let drafts = parse_backup(
            r##"[{
                "title": "File taxes",
                "category": "Finance",
                "categoryColor": "#eab308",
                "completed": true,
                "dueAt": "2024-04-15T00:00:00Z"
            }]"##,
        )
        .expect("parse");
        assert_eq!(drafts[0].category, "Finance");
        assert_eq!(drafts[0].category_color, "#eab308");
        assert!(drafts[0].completed);
        assert_eq!(
            drafts[0].due_at.map(|at| at.to_rfc3339()),
            Some("2024-04-15T00:00:00+00:00".to_string())
        );
    }

    #[test]
    fn rejects_non_arrays_and_untitled_entries() {
        for text in [
            r#"{"title": "x"}"#,
            "not json",
            r#"[{"title": "ok"}, {"title": " "}]"#,
            "[1]",
        ] {
            let err = parse_backup(text).expect_err(text);
            assert!(matches!(err, Error::Validation(_)), "{text}: {err}");
        }
    }

    #[tokio::test]
    async fn import_creates_owned_tasks_and_export_round_trips_titles() {
        let store = MemoryStore::new();
        let mut tasks = TaskMirror::new(Arc::new(store.clone()));
        tasks.bind("u1").await;

        let drafts = parse_backup(r#"[{"title": "a"}, {"title": "b"}]"#).expect("parse");
        assert_eq!(import(&tasks, drafts).await.expect("import"), 2);

        let mut others = store.subscribe("tasks", "u2").await.expect("subscribe");
        match others.next().await {
            Some(crate::remote::SubscriptionEvent::Snapshot(snapshot)) => {
                assert!(snapshot.documents.is_empty())
            }
            other => panic!("unexpected {other:?}"),
        }

        tokio::time::sleep(Duration::from_millis(10)).await;
        let items = tasks.items();
        assert_eq!(items.len(), 2);
        let exported = export_json(&items).expect("export");
        let reparsed = parse_backup(&exported).expect("reparse");
        let mut titles: Vec<String> = reparsed.into_iter().map(|draft| draft.title).collect();
        titles.sort();
        assert_eq!(titles, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn import_requires_signed_in_owner() {
        let tasks = TaskMirror::new(Arc::new(MemoryStore::new()));
        let err = import(&tasks, Vec::new()).await.expect_err("unbound");
        assert!(matches!(err, Error::NotBound));
    }
}
