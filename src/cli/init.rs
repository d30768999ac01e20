//! taskmirror init command implementation
//!
//! Writes a default `.taskmirror.toml` in the working directory and creates
//! the store directory.

use std::path::{Path, PathBuf};

use crate::cli::Context;
use crate::config::{Config, CONFIG_FILE};
use crate::error::{Error, Result};
use crate::output::{emit_success, HumanOutput};
use crate::storage::Storage;

#[derive(serde::Serialize)]
struct InitReport {
    config: PathBuf,
    store: PathBuf,
    created: InitCreated,
}

#[derive(serde::Serialize)]
struct InitCreated {
    config: bool,
    store: bool,
}

pub fn run(ctx: &Context) -> Result<()> {
    let cwd = std::env::current_dir()?;
    let config_path = cwd.join(CONFIG_FILE);
    let created_config = ensure_config(&config_path, ctx.owner().ok())?;

    let storage = Storage::new(&ctx.store_dir);
    let created_store = !storage.is_initialized();
    storage.init()?;

    let report = InitReport {
        config: config_path.clone(),
        store: ctx.store_dir.clone(),
        created: InitCreated {
            config: created_config,
            store: created_store,
        },
    };

    let mut created_items = Vec::new();
    if created_config {
        created_items.push(CONFIG_FILE.to_string());
    }
    if created_store {
        created_items.push(format!("{}/", ctx.store_dir.display()));
    }

    let header = if created_items.is_empty() {
        "taskmirror init: nothing to do"
    } else {
        "taskmirror init: initialized"
    };
    let mut human = HumanOutput::new(header);
    human.push_summary("store", ctx.store_dir.display().to_string());
    human.push_summary(
        "created",
        if created_items.is_empty() {
            "none".to_string()
        } else {
            created_items.join(", ")
        },
    );
    if ctx.owner().is_err() {
        human.push_next_step("set owner.default in .taskmirror.toml or pass --owner");
    }
    human.push_next_step("taskmirror add \"<title>\"");

    emit_success(ctx.output(), "init", &report, Some(&human))
}

fn ensure_config(path: &Path, owner: Option<&str>) -> Result<bool> {
    if path.exists() {
        if !path.is_file() {
            return Err(Error::OperationFailed(format!(
                "{CONFIG_FILE} exists but is not a file: {}",
                path.display()
            )));
        }
        return Ok(false);
    }

    let mut config = Config::default();
    config.owner.default = owner.map(str::to_string);
    config.save(path)?;
    Ok(true)
}
