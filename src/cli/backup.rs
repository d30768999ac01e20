//! export / import commands.

use std::path::Path;

use serde::Serialize;

use crate::backup;
use crate::cli::Context;
use crate::error::Result;
use crate::events::EventKind;
use crate::lock;
use crate::output::{emit_success, HumanOutput};

#[derive(Serialize)]
struct BackupReport<'a> {
    path: &'a Path,
    tasks: usize,
}

pub async fn run_export(ctx: &Context, path: &Path) -> Result<()> {
    let session = ctx.session().await?;
    let items = session.tasks().items();
    let json = backup::export_json(&items)?;
    lock::write_atomic(path, json.as_bytes())?;

    let report = BackupReport {
        path,
        tasks: items.len(),
    };
    let mut human = HumanOutput::new(format!("Exported {} tasks", items.len()));
    human.push_summary("file", path.display().to_string());
    emit_success(ctx.output(), "export", &report, Some(&human))
}

pub async fn run_import(ctx: &Context, path: &Path) -> Result<()> {
    let text = std::fs::read_to_string(path)?;
    let drafts = backup::parse_backup(&text)?;
    let session = ctx.session().await?;
    let mut sink = ctx.event_sink()?;
    let imported = backup::import(session.tasks(), drafts).await?;

    let report = BackupReport {
        path,
        tasks: imported,
    };
    let mut human = HumanOutput::new(format!("Imported {imported} tasks"));
    human.push_summary("file", path.display().to_string());
    if let Some(warning) = ctx.emit_event(&mut sink, EventKind::TasksImported, &report) {
        human.push_warning(warning);
    }
    emit_success(ctx.output(), "import", &report, Some(&human))
}
