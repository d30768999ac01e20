//! Notification sinks used by the reminder scheduler.

use std::fmt;
use std::io::Write as _;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Permission to show notifications.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    /// Not asked yet
    #[default]
    Default,
    Granted,
    Denied,
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Permission::Default => "default",
            Permission::Granted => "granted",
            Permission::Denied => "denied",
        };
        f.write_str(label)
    }
}

/// Where reminders go.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    fn permission_state(&self) -> Permission;

    /// Ask for permission, resolving to the new state.
    async fn request_permission(&self) -> Permission;

    /// Fire and forget.
    fn notify(&self, title: &str, body: &str);
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Writes notifications to stdout.
pub struct ConsoleSink {
    permission: Mutex<Permission>,
}

impl ConsoleSink {
    pub fn new(permission: Permission) -> Self {
        Self {
            permission: Mutex::new(permission),
        }
    }
}

#[async_trait]
impl NotificationSink for ConsoleSink {
    fn permission_state(&self) -> Permission {
        *lock(&self.permission)
    }

    /// The console has no one to ask; an unasked state is granted.
    async fn request_permission(&self) -> Permission {
        let mut permission = lock(&self.permission);
        if *permission == Permission::Default {
            *permission = Permission::Granted;
        }
        *permission
    }

    fn notify(&self, title: &str, body: &str) {
        let mut stdout = std::io::stdout().lock();
        let _ = writeln!(stdout, "[{title}] {body}");
        let _ = stdout.flush();
    }
}

/// A delivered notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub body: String,
}

#[derive(Debug)]
struct MemoryState {
    permission: Permission,
    answer: Permission,
    requests: usize,
    delivered: Vec<Notification>,
}

/// Records notifications in memory. Clones share state.
#[derive(Debug, Clone)]
pub struct MemorySink {
    state: Arc<Mutex<MemoryState>>,
}

impl MemorySink {
    /// `answer` is what a permission request resolves to.
    pub fn new(permission: Permission, answer: Permission) -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState {
                permission,
                answer,
                requests: 0,
                delivered: Vec::new(),
            })),
        }
    }

    pub fn granted() -> Self {
        Self::new(Permission::Granted, Permission::Granted)
    }

    pub fn set_permission(&self, permission: Permission) {
        lock(&self.state).permission = permission;
    }

    pub fn delivered(&self) -> Vec<Notification> {
        lock(&self.state).delivered.clone()
    }

    pub fn requests(&self) -> usize {
        lock(&self.state).requests
    }
}

#[async_trait]
impl NotificationSink for MemorySink {
    fn permission_state(&self) -> Permission {
        lock(&self.state).permission
    }

    async fn request_permission(&self) -> Permission {
        let mut state = lock(&self.state);
        state.requests += 1;
        state.permission = state.answer;
        state.permission
    }

    fn notify(&self, title: &str, body: &str) {
        lock(&self.state).delivered.push(Notification {
            title: title.to_string(),
            body: body.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn console_sink_grants_unasked_permission_only() {
        let sink = ConsoleSink::new(Permission::Default);
        assert_eq!(sink.request_permission().await, Permission::Granted);

        let denied = ConsoleSink::new(Permission::Denied);
        assert_eq!(denied.request_permission().await, Permission::Denied);
    }

    #[tokio::test]
    async fn memory_sink_records_requests_and_notifications() {
        let sink = MemorySink::new(Permission::Default, Permission::Denied);
        assert_eq!(sink.request_permission().await, Permission::Denied);
        assert_eq!(sink.requests(), 1);
        assert_eq!(sink.permission_state(), Permission::Denied);

        sink.notify("Task Reminder", "It's time for: x");
        assert_eq!(sink.delivered().len(), 1);
    }

    #[test]
    fn permission_serializes_lowercase() {
        let json = serde_json::to_string(&Permission::Granted).unwrap();
        assert_eq!(json, "\"granted\"");
    }
}
