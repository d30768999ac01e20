//! Command-line interface for taskmirror
//!
//! This module defines the CLI structure using clap derive macros.
//! Each command family is implemented in its own submodule; all of them run
//! on a single-threaded tokio runtime.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde::Serialize;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::events::{Event, EventDestination, EventKind, EventSink};
use crate::output::OutputOptions;
use crate::remote::{DocumentStore, FileStore};
use crate::session::Session;

mod backup;
mod category;
mod init;
mod task;
mod watch;

/// taskmirror - live task lists mirrored from a shared store
///
/// Every command signs in as one owner, mirrors that owner's tasks and
/// categories from the store directory, and writes changes straight back.
#[derive(Parser, Debug)]
#[command(name = "taskmirror")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Store directory (defaults to store.path from .taskmirror.toml)
    #[arg(long, global = true, env = "TASKMIRROR_STORE")]
    pub store: Option<PathBuf>,

    /// Owner to sign in as
    #[arg(long, global = true, env = "TASKMIRROR_OWNER")]
    pub owner: Option<String>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Emit JSONL events to a file, or `-` for stdout
    #[arg(long, global = true)]
    pub events: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a default .taskmirror.toml and create the store directory
    Init,

    /// Create a task
    Add {
        title: String,

        #[arg(short, long)]
        description: Option<String>,

        /// Category name (built-in or your own)
        #[arg(short, long)]
        category: Option<String>,

        /// high, medium or low
        #[arg(short, long)]
        priority: Option<String>,

        /// Due time (RFC 3339)
        #[arg(long)]
        due: Option<String>,

        /// Reminder time (RFC 3339)
        #[arg(long)]
        remind: Option<String>,
    },

    /// Change fields of a task
    Edit {
        /// Task id or unique id prefix
        id: String,

        #[arg(long)]
        title: Option<String>,

        #[arg(short, long)]
        description: Option<String>,

        #[arg(short, long)]
        category: Option<String>,

        #[arg(short, long)]
        priority: Option<String>,

        #[arg(long, conflicts_with = "clear_due")]
        due: Option<String>,

        #[arg(long)]
        clear_due: bool,

        #[arg(long, conflicts_with = "clear_remind")]
        remind: Option<String>,

        #[arg(long)]
        clear_remind: bool,
    },

    /// Mark a task completed
    Done { id: String },

    /// Mark a task not completed
    Reopen { id: String },

    /// Delete a task
    Rm { id: String },

    /// List tasks, pending first
    #[command(alias = "ls")]
    List {
        /// Case-insensitive match on title or description
        #[arg(short, long)]
        search: Option<String>,

        /// Category name, or All
        #[arg(short, long)]
        category: Option<String>,

        /// all, pending or completed
        #[arg(long)]
        status: Option<String>,

        /// dueAt, priority or createdAt
        #[arg(long)]
        sort: Option<String>,
    },

    /// Completion counts
    Stats,

    /// Category management
    #[command(subcommand)]
    Category(CategoryCommands),

    /// Write all tasks to a JSON file
    Export { path: PathBuf },

    /// Create tasks from a JSON backup
    Import { path: PathBuf },

    /// Follow the task list live and fire reminders until Ctrl-C
    Watch {
        #[arg(short, long)]
        search: Option<String>,

        #[arg(short, long)]
        category: Option<String>,

        #[arg(long)]
        status: Option<String>,

        #[arg(long)]
        sort: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum CategoryCommands {
    /// Create a category
    Add {
        name: String,

        /// Display color, e.g. #10b981
        #[arg(long)]
        color: String,
    },

    /// List built-in and own categories
    Ls,

    /// Rename or recolor a category
    Edit {
        id: String,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        color: Option<String>,
    },

    /// Delete a category
    Rm { id: String },
}

/// Resolved global options shared by every command.
pub(crate) struct Context {
    pub config: Config,
    pub store_dir: PathBuf,
    owner: Option<String>,
    events: Option<EventDestination>,
    json: bool,
    quiet: bool,
}

impl Context {
    fn load(cli: &Cli) -> Result<Self> {
        let cwd = std::env::current_dir()?;
        let config = Config::load_from_dir(&cwd);
        let store_dir = match &cli.store {
            Some(path) => path.clone(),
            None if config.store.path.is_absolute() => config.store.path.clone(),
            None => cwd.join(&config.store.path),
        };
        let owner = cli
            .owner
            .clone()
            .or_else(|| config.owner.default.clone())
            .map(|owner| owner.trim().to_string())
            .filter(|owner| !owner.is_empty());
        Ok(Self {
            config,
            store_dir,
            owner,
            events: EventDestination::parse(cli.events.as_deref()),
            json: cli.json,
            quiet: cli.quiet,
        })
    }

    pub fn output(&self) -> OutputOptions {
        let events_to_stdout = self.events.as_ref().is_some_and(EventDestination::is_stdout);
        OutputOptions {
            json: self.json && !events_to_stdout,
            quiet: self.quiet || events_to_stdout,
        }
    }

    pub fn owner(&self) -> Result<&str> {
        self.owner.as_deref().ok_or(Error::NotBound)
    }

    pub fn store(&self) -> Result<Arc<dyn DocumentStore>> {
        Ok(Arc::new(FileStore::open(&self.store_dir)?))
    }

    pub fn sync_timeout(&self) -> Duration {
        Duration::from_millis(self.config.sync.timeout_ms)
    }

    /// Sign in and wait until both mirrors hold their first snapshot.
    pub async fn session(&self) -> Result<Session> {
        let owner = self.owner()?;
        let mut session = Session::new(self.store()?);
        session.sign_in(owner).await;
        self.wait_synced(&session).await?;
        Ok(session)
    }

    pub async fn wait_synced(&self, session: &Session) -> Result<()> {
        let timeout = self.sync_timeout();
        session.tasks().wait_synced(timeout).await?;
        session.categories().wait_synced(timeout).await?;
        Ok(())
    }

    pub fn event_sink(&self) -> Result<Option<EventSink>> {
        self.events.as_ref().map(EventDestination::open).transpose()
    }

    /// Emit one event; failures come back as a warning line.
    pub fn emit_event<T: Serialize>(
        &self,
        sink: &mut Option<EventSink>,
        kind: EventKind,
        data: T,
    ) -> Option<String> {
        let sink = sink.as_mut()?;
        let event = match Event::new(kind, self.owner.clone()).with_data(data) {
            Ok(event) => event,
            Err(err) => return Some(format!("event output failed: {err}")),
        };
        sink.emit(&event)
            .err()
            .map(|err| format!("event output failed: {err}"))
    }
}

impl Cli {
    /// Execute the CLI command
    pub fn run(self) -> Result<()> {
        let ctx = Context::load(&self)?;
        if let Commands::Init = self.command {
            return init::run(&ctx);
        }

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        runtime.block_on(self.dispatch(&ctx))
    }

    async fn dispatch(self, ctx: &Context) -> Result<()> {
        match self.command {
            Commands::Init => init::run(ctx),
            Commands::Add {
                title,
                description,
                category,
                priority,
                due,
                remind,
            } => {
                task::run_add(
                    ctx,
                    task::AddOptions {
                        title,
                        description,
                        category,
                        priority,
                        due,
                        remind,
                    },
                )
                .await
            }
            Commands::Edit {
                id,
                title,
                description,
                category,
                priority,
                due,
                clear_due,
                remind,
                clear_remind,
            } => {
                task::run_edit(
                    ctx,
                    task::EditOptions {
                        id,
                        title,
                        description,
                        category,
                        priority,
                        due,
                        clear_due,
                        remind,
                        clear_remind,
                    },
                )
                .await
            }
            Commands::Done { id } => task::run_toggle(ctx, &id, true).await,
            Commands::Reopen { id } => task::run_toggle(ctx, &id, false).await,
            Commands::Rm { id } => task::run_rm(ctx, &id).await,
            Commands::List {
                search,
                category,
                status,
                sort,
            } => {
                let criteria = task::criteria(ctx, search, category, status, sort)?;
                task::run_list(ctx, criteria).await
            }
            Commands::Stats => task::run_stats(ctx).await,
            Commands::Category(cmd) => match cmd {
                CategoryCommands::Add { name, color } => {
                    category::run_add(ctx, name, color).await
                }
                CategoryCommands::Ls => category::run_ls(ctx).await,
                CategoryCommands::Edit { id, name, color } => {
                    category::run_edit(ctx, id, name, color).await
                }
                CategoryCommands::Rm { id } => category::run_rm(ctx, id).await,
            },
            Commands::Export { path } => backup::run_export(ctx, &path).await,
            Commands::Import { path } => backup::run_import(ctx, &path).await,
            Commands::Watch {
                search,
                category,
                status,
                sort,
            } => {
                let criteria = task::criteria(ctx, search, category, status, sort)?;
                watch::run(ctx, criteria).await
            }
        }
    }
}
