//! Composition root: one signed-in owner, its two mirrors and, optionally,
//! the reminder scheduler bound to the task mirror.

use std::sync::Arc;

use crate::category::EffectiveCategory;
use crate::error::Result;
use crate::mirror::{CategoryMirror, TaskMirror};
use crate::reminder::{ReminderHandle, ReminderScheduler};
use crate::remote::DocumentStore;
use crate::task::{TaskDraft, TaskPatch};

pub struct Session {
    tasks: TaskMirror,
    categories: CategoryMirror,
    reminders: Option<ReminderScheduler>,
    scheduler: Option<ReminderHandle>,
}

impl Session {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            tasks: TaskMirror::new(Arc::clone(&store)),
            categories: CategoryMirror::new(store),
            reminders: None,
            scheduler: None,
        }
    }

    /// Run `scheduler` for every signed-in owner.
    pub fn with_reminders(mut self, scheduler: ReminderScheduler) -> Self {
        self.reminders = Some(scheduler);
        self
    }

    pub fn owner(&self) -> Option<String> {
        self.tasks.owner()
    }

    pub fn tasks(&self) -> &TaskMirror {
        &self.tasks
    }

    pub fn categories(&self) -> &CategoryMirror {
        &self.categories
    }

    pub fn scheduler_running(&self) -> bool {
        self.scheduler
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Bind both mirrors to `owner` and start reminders. Signing in as a
    /// different owner first signs the current one out.
    pub async fn sign_in(&mut self, owner: &str) {
        if self.owner().as_deref() != Some(owner) {
            self.sign_out();
        }
        tracing::info!(owner, "signing in");
        let before = self.tasks.watch().borrow().generation();
        self.tasks.bind(owner).await;
        self.categories.bind(owner).await;
        let rebound = self.tasks.watch().borrow().generation() != before;

        // A scheduler follows one binding; a fresh binding needs a fresh one.
        if rebound || !self.scheduler_running() {
            if let Some(handle) = self.scheduler.take() {
                handle.cancel();
            }
            if let Some(reminders) = &self.reminders {
                self.scheduler = Some(reminders.clone().spawn(self.tasks.watch()));
            }
        }
    }

    /// Stop reminders and empty both mirrors.
    pub fn sign_out(&mut self) {
        if let Some(handle) = self.scheduler.take() {
            handle.cancel();
        }
        if self.owner().is_some() {
            tracing::info!("signing out");
        }
        self.tasks.unbind();
        self.categories.unbind();
    }

    pub fn effective_categories(&self) -> Vec<EffectiveCategory> {
        self.categories.effective_categories()
    }

    /// Create a task, freezing the color its category has right now.
    pub async fn add_task(&self, mut draft: TaskDraft) -> Result<String> {
        draft.category_color = self.categories.resolve_color(&draft.category);
        self.tasks.create(draft).await
    }

    /// Category change payload with the color resolved at write time.
    pub fn category_change(&self, name: &str) -> (String, String) {
        (name.to_string(), self.categories.resolve_color(name))
    }

    pub async fn edit_task(&self, id: &str, patch: TaskPatch) -> Result<()> {
        self.tasks.update(id, patch).await
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.sign_out();
    }
}
