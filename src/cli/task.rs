//! Task commands: add, edit, done/reopen, rm, list, stats.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::cli::Context;
use crate::error::{Error, Result};
use crate::events::EventKind;
use crate::output::{emit_success, HumanOutput};
use crate::task::{parse_timestamp, Priority, Task, TaskDraft, TaskPatch, TaskStats};
use crate::view::{self, CategoryFilter, ViewCriteria};

pub struct AddOptions {
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub priority: Option<String>,
    pub due: Option<String>,
    pub remind: Option<String>,
}

pub struct EditOptions {
    pub id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub priority: Option<String>,
    pub due: Option<String>,
    pub clear_due: bool,
    pub remind: Option<String>,
    pub clear_remind: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TaskCreated {
    id: String,
    title: String,
    category: String,
    category_color: String,
    priority: Priority,
    due_at: Option<DateTime<Utc>>,
    reminder_at: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
struct TaskChanged {
    id: String,
    fields: Vec<&'static str>,
}

#[derive(Serialize)]
struct TaskToggled {
    id: String,
    completed: bool,
}

#[derive(Serialize)]
struct TaskRemoved {
    id: String,
}

#[derive(Serialize)]
struct TaskListOutput<'a> {
    total: usize,
    shown: usize,
    tasks: Vec<&'a Task>,
}

pub async fn run_add(ctx: &Context, options: AddOptions) -> Result<()> {
    let mut draft = TaskDraft::new(options.title);
    draft.validate()?;
    if let Some(description) = options.description {
        draft.description = description;
    }
    if let Some(category) = non_blank("category", options.category)? {
        draft.category = category;
    }
    if let Some(priority) = options.priority {
        draft.priority = priority.parse()?;
    }
    draft.due_at = options
        .due
        .map(|raw| parse_timestamp("due", &raw))
        .transpose()?;
    draft.reminder_at = options
        .remind
        .map(|raw| parse_timestamp("remind", &raw))
        .transpose()?;

    let session = ctx.session().await?;
    let mut sink = ctx.event_sink()?;
    let id = session.add_task(draft.clone()).await?;
    let color = session.categories().resolve_color(&draft.category);

    let report = TaskCreated {
        id: id.clone(),
        title: draft.title.trim().to_string(),
        category: draft.category.clone(),
        category_color: color,
        priority: draft.priority,
        due_at: draft.due_at,
        reminder_at: draft.reminder_at,
    };

    let mut human = HumanOutput::new(format!("Created task {id}"));
    human.push_summary("title", report.title.clone());
    human.push_summary("category", report.category.clone());
    human.push_summary("priority", report.priority.to_string());
    if let Some(due) = report.due_at {
        human.push_summary("due", due.to_rfc3339());
    }
    if let Some(remind) = report.reminder_at {
        if remind < Utc::now() {
            human.push_warning("reminder time is already in the past");
        }
        human.push_summary("remind", remind.to_rfc3339());
    }
    if let Some(warning) = ctx.emit_event(&mut sink, EventKind::TaskCreated, &report) {
        human.push_warning(warning);
    }

    emit_success(ctx.output(), "add", &report, Some(&human))
}

pub async fn run_edit(ctx: &Context, options: EditOptions) -> Result<()> {
    let session = ctx.session().await?;
    let id = resolve_task_id(&session.tasks().items(), &options.id)?;

    let mut patch = TaskPatch {
        title: options.title,
        description: options.description,
        ..TaskPatch::default()
    };
    if let Some(category) = non_blank("category", options.category)? {
        patch.category = Some(session.category_change(&category));
    }
    if let Some(priority) = options.priority {
        patch.priority = Some(priority.parse()?);
    }
    patch.due_at = optional_timestamp("due", options.due, options.clear_due)?;
    patch.reminder_at = optional_timestamp("remind", options.remind, options.clear_remind)?;
    if patch.is_empty() {
        return Err(Error::InvalidArgument(
            "nothing to change (pass at least one field)".to_string(),
        ));
    }

    let mut sink = ctx.event_sink()?;
    session.edit_task(&id, patch.clone()).await?;

    let report = TaskChanged {
        id: id.clone(),
        fields: changed_fields(&patch),
    };
    let mut human = HumanOutput::new(format!("Updated task {id}"));
    human.push_summary("fields", report.fields.join(", "));
    if let Some(warning) = ctx.emit_event(&mut sink, EventKind::TaskUpdated, &report) {
        human.push_warning(warning);
    }
    emit_success(ctx.output(), "edit", &report, Some(&human))
}

pub async fn run_toggle(ctx: &Context, raw_id: &str, completed: bool) -> Result<()> {
    let session = ctx.session().await?;
    let id = resolve_task_id(&session.tasks().items(), raw_id)?;
    let mut sink = ctx.event_sink()?;
    session.tasks().toggle_completed(&id, completed).await?;

    let report = TaskToggled {
        id: id.clone(),
        completed,
    };
    let (command, kind, verb) = if completed {
        ("done", EventKind::TaskCompleted, "Completed")
    } else {
        ("reopen", EventKind::TaskReopened, "Reopened")
    };
    let mut human = HumanOutput::new(format!("{verb} task {id}"));
    if let Some(warning) = ctx.emit_event(&mut sink, kind, &report) {
        human.push_warning(warning);
    }
    emit_success(ctx.output(), command, &report, Some(&human))
}

pub async fn run_rm(ctx: &Context, raw_id: &str) -> Result<()> {
    let session = ctx.session().await?;
    let id = resolve_task_id(&session.tasks().items(), raw_id)?;
    let mut sink = ctx.event_sink()?;
    session.tasks().delete(&id).await?;

    let report = TaskRemoved { id: id.clone() };
    let mut human = HumanOutput::new(format!("Deleted task {id}"));
    if let Some(warning) = ctx.emit_event(&mut sink, EventKind::TaskDeleted, &report) {
        human.push_warning(warning);
    }
    emit_success(ctx.output(), "rm", &report, Some(&human))
}

pub async fn run_list(ctx: &Context, criteria: ViewCriteria) -> Result<()> {
    let session = ctx.session().await?;
    let items = session.tasks().items();
    let visible = view::project(&items, &criteria);

    let mut human = HumanOutput::new(format!("{} of {} tasks", visible.len(), items.len()));
    for line in render_tasks(&visible) {
        human.push_detail(line);
    }
    if items.is_empty() {
        human.push_next_step("taskmirror add \"<title>\"");
    }

    let report = TaskListOutput {
        total: items.len(),
        shown: visible.len(),
        tasks: visible,
    };
    emit_success(ctx.output(), "list", &report, Some(&human))
}

pub async fn run_stats(ctx: &Context) -> Result<()> {
    let session = ctx.session().await?;
    let stats: TaskStats = session.tasks().stats();

    let mut human = HumanOutput::new("Task stats");
    human.push_summary("total", stats.total.to_string());
    human.push_summary("completed", stats.completed.to_string());
    human.push_summary("pending", stats.pending.to_string());
    emit_success(ctx.output(), "stats", &stats, Some(&human))
}

/// View criteria from flags, falling back to the configured defaults.
pub fn criteria(
    ctx: &Context,
    search: Option<String>,
    category: Option<String>,
    status: Option<String>,
    sort: Option<String>,
) -> Result<ViewCriteria> {
    Ok(ViewCriteria {
        search: search.unwrap_or_default(),
        category: category
            .as_deref()
            .map(CategoryFilter::from)
            .unwrap_or_default(),
        status: match status {
            Some(raw) => raw.parse()?,
            None => ctx.config.view.status,
        },
        sort: match sort {
            Some(raw) => raw.parse()?,
            None => ctx.config.view.sort,
        },
    })
}

/// One display line per task.
pub fn render_tasks(tasks: &[&Task]) -> Vec<String> {
    tasks
        .iter()
        .map(|task| {
            let mark = if task.completed { "x" } else { " " };
            let mut line = format!(
                "[{mark}] {} {} ({}, {})",
                task.id, task.title, task.category, task.priority
            );
            if let Some(due) = task.due_at {
                line.push_str(&format!(" due {}", due.to_rfc3339()));
            }
            if let Some(remind) = task.reminder_at {
                line.push_str(&format!(" remind {}", remind.to_rfc3339()));
            }
            line
        })
        .collect()
}

/// Exact id, or a prefix matching exactly one task. Unknown ids pass through
/// so the store reports them as missing.
pub fn resolve_task_id(items: &[Task], raw: &str) -> Result<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(Error::InvalidArgument("task id cannot be empty".to_string()));
    }
    if items.iter().any(|task| task.id == raw) {
        return Ok(raw.to_string());
    }
    let matches: Vec<&Task> = items
        .iter()
        .filter(|task| task.id.starts_with(raw))
        .collect();
    match matches.as_slice() {
        [] => Ok(raw.to_string()),
        [task] => Ok(task.id.clone()),
        many => Err(Error::InvalidArgument(format!(
            "task id prefix '{raw}' is ambiguous ({} matches)",
            many.len()
        ))),
    }
}

fn non_blank(label: &str, value: Option<String>) -> Result<Option<String>> {
    match value {
        Some(value) if value.trim().is_empty() => Err(Error::InvalidArgument(format!(
            "{label} cannot be empty"
        ))),
        Some(value) => Ok(Some(value.trim().to_string())),
        None => Ok(None),
    }
}

fn optional_timestamp(
    label: &str,
    value: Option<String>,
    clear: bool,
) -> Result<Option<Option<DateTime<Utc>>>> {
    if clear {
        return Ok(Some(None));
    }
    value
        .map(|raw| parse_timestamp(label, &raw).map(Some))
        .transpose()
}

fn changed_fields(patch: &TaskPatch) -> Vec<&'static str> {
    let mut fields = Vec::new();
    if patch.title.is_some() {
        fields.push("title");
    }
    if patch.description.is_some() {
        fields.push("description");
    }
    if patch.category.is_some() {
        fields.push("category");
    }
    if patch.priority.is_some() {
        fields.push("priority");
    }
    if patch.due_at.is_some() {
        fields.push("dueAt");
    }
    if patch.reminder_at.is_some() {
        fields.push("reminderAt");
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;

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
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn resolves_exact_and_unique_prefix() {
        let items = vec![task("01abc"), task("01abd"), task("02xyz")];
        assert_eq!(resolve_task_id(&items, "01abc").unwrap(), "01abc");
        assert_eq!(resolve_task_id(&items, "02").unwrap(), "02xyz");
        assert_eq!(resolve_task_id(&items, "zz").unwrap(), "zz");
        assert!(resolve_task_id(&items, "01ab").is_err());
        assert!(resolve_task_id(&items, " ").is_err());
    }

    #[test]
    fn clear_flag_wins_over_missing_value() {
        assert_eq!(optional_timestamp("due", None, true).unwrap(), Some(None));
        assert_eq!(optional_timestamp("due", None, false).unwrap(), None);
        assert!(optional_timestamp("due", Some("soon".to_string()), false).is_err());
    }

    #[test]
    fn render_marks_completed_tasks() {
        let mut done = task("t2");
        done.completed = true;
        let open = task("t1");
        let lines = render_tasks(&[&open, &done]);
        assert_eq!(lines[0], "[ ] t1 t1 (Personal, medium)");
        assert!(lines[1].starts_with("[x] t2"));
    }
}
