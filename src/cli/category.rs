//! Category commands.

use serde::Serialize;

use crate::category::{CategoryDraft, CategoryPatch, EffectiveCategory};
use crate::cli::Context;
use crate::error::{Error, Result};
use crate::events::EventKind;
use crate::output::{emit_success, HumanOutput};

#[derive(Serialize)]
struct CategoryChanged {
    id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    color: Option<String>,
}

#[derive(Serialize)]
struct CategoryList {
    total: usize,
    categories: Vec<EffectiveCategory>,
}

pub async fn run_add(ctx: &Context, name: String, color: String) -> Result<()> {
    let draft = CategoryDraft::new(name, color);
    draft.validate()?;
    let session = ctx.session().await?;
    let mut sink = ctx.event_sink()?;
    let id = session.categories().create(draft.clone()).await?;

    let report = CategoryChanged {
        id: id.clone(),
        name: Some(draft.name.trim().to_string()),
        color: Some(draft.color.trim().to_string()),
    };
    let mut human = HumanOutput::new(format!("Created category {id}"));
    human.push_summary("name", draft.name.trim());
    human.push_summary("color", draft.color.trim());
    if crate::category::builtin_color(draft.name.trim()).is_some() {
        human.push_warning("a built-in category has this name; tasks keep the built-in color");
    }
    if let Some(warning) = ctx.emit_event(&mut sink, EventKind::CategoryCreated, &report) {
        human.push_warning(warning);
    }
    emit_success(ctx.output(), "category add", &report, Some(&human))
}

pub async fn run_ls(ctx: &Context) -> Result<()> {
    let session = ctx.session().await?;
    let categories = session.effective_categories();

    let mut human = HumanOutput::new(format!("{} categories", categories.len()));
    for category in &categories {
        let origin = match &category.id {
            Some(id) => id.as_str(),
            None => "built-in",
        };
        human.push_detail(format!("{} {} ({origin})", category.name, category.color));
    }
    let report = CategoryList {
        total: categories.len(),
        categories,
    };
    emit_success(ctx.output(), "category ls", &report, Some(&human))
}

pub async fn run_edit(
    ctx: &Context,
    id: String,
    name: Option<String>,
    color: Option<String>,
) -> Result<()> {
    let patch = CategoryPatch { name, color };
    if patch.is_empty() {
        return Err(Error::InvalidArgument(
            "nothing to change (pass --name or --color)".to_string(),
        ));
    }
    patch.validate()?;
    let session = ctx.session().await?;
    let mut sink = ctx.event_sink()?;
    session.categories().update(&id, patch.clone()).await?;

    let report = CategoryChanged {
        id: id.clone(),
        name: patch.name.map(|name| name.trim().to_string()),
        color: patch.color.map(|color| color.trim().to_string()),
    };
    let mut human = HumanOutput::new(format!("Updated category {id}"));
    human.push_detail("existing tasks keep the color they were saved with");
    if let Some(warning) = ctx.emit_event(&mut sink, EventKind::CategoryUpdated, &report) {
        human.push_warning(warning);
    }
    emit_success(ctx.output(), "category edit", &report, Some(&human))
}

pub async fn run_rm(ctx: &Context, id: String) -> Result<()> {
    let session = ctx.session().await?;
    let mut sink = ctx.event_sink()?;
    session.categories().delete(&id).await?;

    let report = CategoryChanged {
        id: id.clone(),
        name: None,
        color: None,
    };
    let mut human = HumanOutput::new(format!("Deleted category {id}"));
    if let Some(warning) = ctx.emit_event(&mut sink, EventKind::CategoryDeleted, &report) {
        human.push_warning(warning);
    }
    emit_success(ctx.output(), "category rm", &report, Some(&human))
}
