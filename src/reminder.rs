//! Reminder scheduler.
//!
//! Scans the task mirror once when it first syncs and then every period.
//! A task fires when `0 <= now - reminderAt < period`, so each reminder is
//! seen by exactly one scan. A reminder whose window passed while nothing
//! was scanning is not caught up.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::clock::Clock;
use crate::config::ReminderConfig;
use crate::mirror::{MirrorState, SyncState};
use crate::notification::{NotificationSink, Permission};
use crate::task::Task;

/// Tasks whose reminder fell due within the last `period` before `now`.
pub fn due_reminders<'a>(items: &'a [Task], now: DateTime<Utc>, period: Duration) -> Vec<&'a Task> {
    let window = chrono::Duration::milliseconds(period.as_millis() as i64);
    items
        .iter()
        .filter(|task| !task.completed)
        .filter(|task| match task.reminder_at {
            Some(at) => {
                let elapsed = now - at;
                elapsed >= chrono::Duration::zero() && elapsed < window
            }
            None => false,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DueReminder {
    pub id: String,
    pub title: String,
}

/// Outcome of one scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    pub at: DateTime<Utc>,
    pub due: Vec<DueReminder>,
    pub permission: Permission,
}

impl ScanReport {
    pub fn emitted(&self) -> usize {
        if self.permission == Permission::Granted {
            self.due.len()
        } else {
            0
        }
    }

    pub fn suppressed(&self) -> usize {
        self.due.len() - self.emitted()
    }
}

/// One scan pass. Notifications go out only with granted permission; the
/// due set is reported either way.
pub fn scan(
    items: &[Task],
    now: DateTime<Utc>,
    config: &ReminderConfig,
    sink: &dyn NotificationSink,
) -> ScanReport {
    let permission = sink.permission_state();
    let due: Vec<DueReminder> = due_reminders(items, now, config.period())
        .into_iter()
        .map(|task| DueReminder {
            id: task.id.clone(),
            title: task.title.clone(),
        })
        .collect();

    for reminder in &due {
        if permission == Permission::Granted {
            let body = format!("{}{}", config.body_prefix, reminder.title);
            sink.notify(&config.title, &body);
            tracing::info!(task = %reminder.id, "reminder fired");
        } else {
            tracing::debug!(task = %reminder.id, %permission, "reminder suppressed");
        }
    }

    ScanReport {
        at: now,
        due,
        permission,
    }
}

/// Builds and spawns the periodic scan.
#[derive(Clone)]
pub struct ReminderScheduler {
    sink: Arc<dyn NotificationSink>,
    clock: Arc<dyn Clock>,
    config: ReminderConfig,
    reports: Option<mpsc::UnboundedSender<ScanReport>>,
}

impl ReminderScheduler {
    pub fn new(
        sink: Arc<dyn NotificationSink>,
        clock: Arc<dyn Clock>,
        config: ReminderConfig,
    ) -> Self {
        Self {
            sink,
            clock,
            config,
            reports: None,
        }
    }

    /// Send a report after every scan.
    pub fn with_reports(mut self, reports: mpsc::UnboundedSender<ScanReport>) -> Self {
        self.reports = Some(reports);
        self
    }

    /// Start scanning the bound mirror behind `mirror`. The task ends on its
    /// own once that binding goes away. An unasked permission is requested
    /// once, alongside the scan rather than before it.
    pub fn spawn(self, mirror: watch::Receiver<MirrorState<Task>>) -> ReminderHandle {
        let bound = mirror.borrow().is_bound();
        let permission = (bound && self.sink.permission_state() == Permission::Default).then(|| {
            let sink = Arc::clone(&self.sink);
            tokio::spawn(async move {
                let permission = sink.request_permission().await;
                tracing::debug!(%permission, "notification permission resolved");
            })
        });
        ReminderHandle {
            task: Some(tokio::spawn(self.run(mirror))),
            permission,
        }
    }

    async fn run(self, mut mirror: watch::Receiver<MirrorState<Task>>) {
        let generation = {
            let state = mirror.borrow_and_update();
            if !state.is_bound() {
                return;
            }
            state.generation()
        };

        let still_bound = match mirror
            .wait_for(|state| {
                state.generation() != generation || !matches!(state.sync(), SyncState::Subscribing)
            })
            .await
        {
            Ok(state) => state.generation() == generation && state.is_bound(),
            Err(_) => false,
        };
        if !still_bound {
            return;
        }

        let mut ticker = tokio::time::interval(self.config.period());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tracing::debug!(period_secs = self.config.period_secs, "reminder scheduler started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let items = {
                        let state = mirror.borrow();
                        if state.generation() != generation || !state.is_bound() {
                            break;
                        }
                        Arc::clone(state.items())
                    };
                    let report = scan(&items, self.clock.now(), &self.config, self.sink.as_ref());
                    if let Some(reports) = &self.reports {
                        let _ = reports.send(report);
                    }
                }
                changed = mirror.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let state = mirror.borrow_and_update();
                    if state.generation() != generation || !state.is_bound() {
                        break;
                    }
                }
            }
        }
        tracing::debug!("reminder scheduler stopped");
    }
}

/// Owns the scheduler task; dropping it stops the timer.
#[derive(Debug)]
pub struct ReminderHandle {
    task: Option<JoinHandle<()>>,
    permission: Option<JoinHandle<()>>,
}

impl ReminderHandle {
    pub fn cancel(mut self) {
        self.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }

    fn abort(&mut self) {
        for task in [self.task.take(), self.permission.take()].into_iter().flatten() {
            task.abort();
        }
    }
}

impl Drop for ReminderHandle {
    fn drop(&mut self) {
        self.abort();
    }
}
