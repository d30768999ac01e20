//! watch command: follow the mirror live and run the reminder scheduler.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;

use crate::cli::task::render_tasks;
use crate::cli::Context;
use crate::clock::SystemClock;
use crate::error::Result;
use crate::events::{EventKind, EventSink};
use crate::mirror::{MirrorState, SyncState};
use crate::notification::{ConsoleSink, NotificationSink};
use crate::output::{emit_success, HumanOutput};
use crate::reminder::{ReminderScheduler, ScanReport};
use crate::session::Session;
use crate::task::Task;
use crate::view::{self, ViewCriteria};

#[derive(Serialize)]
struct WatchFrame<'a> {
    sync: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    total: usize,
    shown: usize,
    tasks: Vec<&'a Task>,
}

#[derive(Serialize)]
struct SyncChanged {
    state: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize)]
struct ReminderFired<'a> {
    id: &'a str,
    title: &'a str,
    at: chrono::DateTime<chrono::Utc>,
}

pub async fn run(ctx: &Context, criteria: ViewCriteria) -> Result<()> {
    let owner = ctx.owner()?.to_string();
    let (report_tx, mut reports) = mpsc::unbounded_channel();
    let notifications: Arc<dyn NotificationSink> =
        Arc::new(ConsoleSink::new(ctx.config.notifications.permission));
    let scheduler = ReminderScheduler::new(
        notifications,
        Arc::new(SystemClock),
        ctx.config.reminders.clone(),
    )
    .with_reports(report_tx);

    let mut session = Session::new(ctx.store()?).with_reminders(scheduler);
    let mut sink = ctx.event_sink()?;
    session.sign_in(&owner).await;

    let mut tasks = session.tasks().watch();
    let mut last_sync: Option<SyncState> = None;
    let mut dirty = true;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        if dirty {
            let state = tasks.borrow_and_update().clone();
            if last_sync.as_ref() != Some(state.sync()) {
                announce_sync(ctx, &mut sink, state.sync());
                last_sync = Some(state.sync().clone());
            }
            if !matches!(state.sync(), SyncState::Subscribing) {
                publish(ctx, &state, &criteria)?;
            }
            dirty = false;
        }

        tokio::select! {
            changed = tasks.changed() => {
                if changed.is_err() {
                    break;
                }
                dirty = true;
            }
            Some(report) = reports.recv() => record_reminders(ctx, &mut sink, &report),
            signal = &mut ctrl_c => {
                signal?;
                break;
            }
        }
    }

    session.sign_out();
    tracing::info!(owner = %owner, "watch stopped");
    Ok(())
}

fn publish(ctx: &Context, state: &MirrorState<Task>, criteria: &ViewCriteria) -> Result<()> {
    let items = state.items();
    let visible = view::project(items, criteria);

    let mut human = HumanOutput::new(format!(
        "{} of {} tasks ({})",
        visible.len(),
        items.len(),
        state.sync()
    ));
    for line in render_tasks(&visible) {
        human.push_detail(line);
    }
    if let SyncState::Error(err) = state.sync() {
        human.push_warning(format!("live updates stopped, showing last known tasks: {err}"));
    }

    let frame = WatchFrame {
        sync: state.sync().as_str(),
        error: state.sync().error().map(ToString::to_string),
        total: items.len(),
        shown: visible.len(),
        tasks: visible,
    };
    emit_success(ctx.output(), "watch", &frame, Some(&human))
}

fn announce_sync(ctx: &Context, sink: &mut Option<EventSink>, sync: &SyncState) {
    let change = SyncChanged {
        state: sync.as_str(),
        error: sync.error().map(ToString::to_string),
    };
    if let Some(warning) = ctx.emit_event(sink, EventKind::MirrorStateChanged, &change) {
        tracing::warn!("{warning}");
    }
}

fn record_reminders(ctx: &Context, sink: &mut Option<EventSink>, report: &ScanReport) {
    if report.emitted() == 0 {
        return;
    }
    for due in &report.due {
        let fired = ReminderFired {
            id: &due.id,
            title: &due.title,
            at: report.at,
        };
        if let Some(warning) = ctx.emit_event(sink, EventKind::ReminderFired, &fired) {
            tracing::warn!("{warning}");
        }
    }
}
