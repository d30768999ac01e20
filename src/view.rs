//! View projection: filter and order a task snapshot for display.
//!
//! `project` is pure. It borrows the snapshot and returns references in
//! display order, recomputed in full on every call.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::task::Task;

/// Sentinel accepted on the command line for "every category".
pub const ALL_CATEGORIES: &str = "All";

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum SortKey {
    /// Ascending due date; undated tasks last
    #[default]
    #[serde(rename = "dueAt")]
    DueAt,
    /// high, medium, low
    #[serde(rename = "priority")]
    Priority,
    /// Newest first
    #[serde(rename = "createdAt")]
    CreatedAt,
}

impl SortKey {
    pub fn as_str(self) -> &'static str {
        match self {
            SortKey::DueAt => "dueAt",
            SortKey::Priority => "priority",
            SortKey::CreatedAt => "createdAt",
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortKey {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "dueat" | "due" | "due-date" => Ok(SortKey::DueAt),
            "priority" => Ok(SortKey::Priority),
            "createdat" | "created" => Ok(SortKey::CreatedAt),
            other => Err(Error::InvalidArgument(format!(
                "unknown sort key '{other}' (expected dueAt|priority|createdAt)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    #[default]
    All,
    Pending,
    Completed,
}

impl StatusFilter {
    pub fn matches(self, task: &Task) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Pending => !task.completed,
            StatusFilter::Completed => task.completed,
        }
    }
}

impl FromStr for StatusFilter {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(StatusFilter::All),
            "pending" => Ok(StatusFilter::Pending),
            "completed" | "done" => Ok(StatusFilter::Completed),
            other => Err(Error::InvalidArgument(format!(
                "unknown status '{other}' (expected all|pending|completed)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CategoryFilter {
    #[default]
    All,
    /// Exact, case-sensitive name match
    Named(String),
}

impl CategoryFilter {
    pub fn matches(&self, task: &Task) -> bool {
        match self {
            CategoryFilter::All => true,
            CategoryFilter::Named(name) => task.category == *name,
        }
    }
}

impl From<&str> for CategoryFilter {
    fn from(value: &str) -> Self {
        if value == ALL_CATEGORIES {
            CategoryFilter::All
        } else {
            CategoryFilter::Named(value.to_string())
        }
    }
}

/// Everything `project` needs besides the items.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewCriteria {
    pub search: String,
    pub category: CategoryFilter,
    pub status: StatusFilter,
    pub sort: SortKey,
}

impl ViewCriteria {
    fn matches(&self, task: &Task, needle: &str) -> bool {
        matches_search(task, needle) && self.category.matches(task) && self.status.matches(task)
    }
}

fn matches_search(task: &Task, needle: &str) -> bool {
    needle.is_empty()
        || task.title.to_lowercase().contains(needle)
        || task.description.to_lowercase().contains(needle)
}

/// Filter `items` by `criteria` and order them: incomplete before
/// completed, then by the chosen key. The sort is stable.
pub fn project<'a>(items: &'a [Task], criteria: &ViewCriteria) -> Vec<&'a Task> {
    let needle = criteria.search.to_lowercase();
    let mut visible: Vec<&Task> = items
        .iter()
        .filter(|task| criteria.matches(task, &needle))
        .collect();
    visible.sort_by(|a, b| {
        a.completed
            .cmp(&b.completed)
            .then_with(|| compare_by(criteria.sort, a, b))
    });
    visible
}

fn compare_by(key: SortKey, a: &Task, b: &Task) -> Ordering {
    match key {
        SortKey::DueAt => match (a.due_at, b.due_at) {
            (Some(a), Some(b)) => a.cmp(&b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        },
        SortKey::Priority => a.priority.rank().cmp(&b.priority.rank()),
        SortKey::CreatedAt => b.created_at.cmp(&a.created_at),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Priority;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap()
    }

    fn task(id: &str) -> Task {
        Task {
            id: id.to_string(),
            title: id.to_string(),
            description: String::new(),
            category: "Personal".to_string(),
            category_color: "#3b82f6".to_string(),
            priority: Priority::Medium,
            completed: false,
            due_at: None,
            reminder_at: None,
            owner_id: "u1".to_string(),
            created_at: Some(base()),
            updated_at: Some(base()),
        }
    }

    fn due(id: &str, hours: i64) -> Task {
        let mut task = task(id);
        task.due_at = Some(base() + Duration::hours(hours));
        task
    }

    fn ids(tasks: &[&Task]) -> Vec<String> {
        tasks.iter().map(|task| task.id.clone()).collect()
    }

    #[test]
    fn default_view_partitions_then_orders_by_due_date() {
        let mut done_early = due("done-early", 1);
        done_early.completed = true;
        let items = vec![
            task("undated"),
            due("late", 5),
            done_early,
            due("early", 2),
            task("undated-2"),
        ];

        let view = project(&items, &ViewCriteria::default());
        assert_eq!(
            ids(&view),
            vec!["early", "late", "undated", "undated-2", "done-early"]
        );
    }

    #[test]
    fn priority_sort_uses_rank_and_is_stable() {
        let mut low = task("low");
        low.priority = Priority::Low;
        let mut high = task("high");
        high.priority = Priority::High;
        let items = vec![low, task("med-a"), high, task("med-b")];
        let criteria = ViewCriteria {
            sort: SortKey::Priority,
            ..ViewCriteria::default()
        };

        let view = project(&items, &criteria);
        assert_eq!(ids(&view), vec!["high", "med-a", "med-b", "low"]);
        assert_eq!(project(&items, &criteria), view);
    }

    #[test]
    fn created_sort_is_newest_first() {
        let mut old = task("old");
        old.created_at = Some(base() - Duration::days(1));
        let mut unknown = task("unknown");
        unknown.created_at = None;
        let items = vec![old, unknown, task("new")];
        let criteria = ViewCriteria {
            sort: SortKey::CreatedAt,
            ..ViewCriteria::default()
        };
        assert_eq!(ids(&project(&items, &criteria)), vec!["new", "old", "unknown"]);
    }

    #[test]
    fn search_matches_title_or_description_case_insensitively() {
        let mut milk = task("a");
        milk.title = "Buy MILK".to_string();
        let mut notes = task("b");
        notes.description = "remember the milk".to_string();
        let items = vec![milk, notes, task("c")];

        let criteria = ViewCriteria {
            search: "Milk".to_string(),
            ..ViewCriteria::default()
        };
        assert_eq!(ids(&project(&items, &criteria)), vec!["a", "b"]);
    }

    #[test]
    fn category_and_status_filters() {
        let mut shopping = task("shop");
        shopping.category = "Shopping".to_string();
        let mut done = task("done");
        done.completed = true;
        let items = vec![shopping, done, task("open")];

        let criteria = ViewCriteria {
            category: CategoryFilter::from("Shopping"),
            ..ViewCriteria::default()
        };
        assert_eq!(ids(&project(&items, &criteria)), vec!["shop"]);

        let criteria = ViewCriteria {
            category: CategoryFilter::from("shopping"),
            ..ViewCriteria::default()
        };
        assert!(project(&items, &criteria).is_empty());

        let criteria = ViewCriteria {
            status: StatusFilter::Completed,
            ..ViewCriteria::default()
        };
        assert_eq!(ids(&project(&items, &criteria)), vec!["done"]);

        let criteria = ViewCriteria {
            status: StatusFilter::Pending,
            ..ViewCriteria::default()
        };
        assert_eq!(ids(&project(&items, &criteria)), vec!["shop", "open"]);
        assert_eq!(CategoryFilter::from(ALL_CATEGORIES), CategoryFilter::All);
    }

    #[test]
    fn completing_moves_task_below_pending_for_every_key() {
        let mut milk = due("milk", 1);
        milk.priority = Priority::High;
        let items = vec![milk.clone(), due("other", 9)];
        for sort in [SortKey::DueAt, SortKey::Priority, SortKey::CreatedAt] {
            let criteria = ViewCriteria {
                sort,
                ..ViewCriteria::default()
            };
            assert_eq!(ids(&project(&items, &criteria))[0], "milk");

            let mut toggled = items.clone();
            toggled[0].completed = true;
            assert_eq!(ids(&project(&toggled, &criteria)), vec!["other", "milk"]);
        }
    }

    #[test]
    fn parses_criteria_values() {
        assert_eq!("priority".parse::<SortKey>().unwrap(), SortKey::Priority);
        assert_eq!("dueAt".parse::<SortKey>().unwrap(), SortKey::DueAt);
        assert_eq!("Pending".parse::<StatusFilter>().unwrap(), StatusFilter::Pending);
        assert!("soon".parse::<SortKey>().is_err());
        assert!("maybe".parse::<StatusFilter>().is_err());
    }
}
