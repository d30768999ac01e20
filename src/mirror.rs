//! Live local mirror of one owner's records in a remote collection.
//!
//! ```text
//!   Unbound ──bind──▶ Subscribing ──first snapshot──▶ Synced ◀─┐
//!      ▲                  │                             │  │    │ snapshot
//!      │                  │ failure                     │  └────┘
//!      │                  ▼                  failure    │
//!      └──unbind────── Error ◀──────────────────────────┘
//! ```
//!
//! Every snapshot replaces the whole collection; nothing is merged and
//! writes are never applied locally. A write only shows up once the
//! subscription echoes it back. The current [`MirrorState`] is published
//! through a `watch` channel so readers always see one complete snapshot.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::category::{self, Category, CategoryDraft, CategoryPatch, EffectiveCategory};
use crate::error::{Error, RemoteError, Result, WriteOp};
use crate::remote::{Document, DocumentStore, Subscription, SubscriptionEvent, Write};
use crate::task::{Task, TaskDraft, TaskPatch, TaskStats};

/// A record type that lives in one remote collection.
pub trait MirrorRecord: Clone + Send + Sync + 'static {
    const COLLECTION: &'static str;

    fn from_document(doc: &Document) -> Result<Self>;

    fn id(&self) -> &str;

    /// Store-assigned creation time; `None` while unresolved.
    fn created_at(&self) -> Option<DateTime<Utc>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncState {
    Unbound,
    Subscribing,
    Synced,
    /// Updates stopped; items still hold the last good snapshot.
    Error(RemoteError),
}

impl SyncState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncState::Unbound => "unbound",
            SyncState::Subscribing => "subscribing",
            SyncState::Synced => "synced",
            SyncState::Error(_) => "error",
        }
    }

    pub fn error(&self) -> Option<&RemoteError> {
        match self {
            SyncState::Error(err) => Some(err),
            _ => None,
        }
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncState::Error(err) => write!(f, "error ({err})"),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Point-in-time view of a mirror. Cloning is cheap; items are shared.
#[derive(Debug, Clone)]
pub struct MirrorState<R> {
    owner: Option<String>,
    sync: SyncState,
    items: Arc<[R]>,
    version: Option<u64>,
    generation: u64,
}

impl<R> Default for MirrorState<R> {
    fn default() -> Self {
        Self {
            owner: None,
            sync: SyncState::Unbound,
            items: Arc::from(Vec::new()),
            version: None,
            generation: 0,
        }
    }
}

impl<R: MirrorRecord> MirrorState<R> {
    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    pub fn sync(&self) -> &SyncState {
        &self.sync
    }

    pub fn items(&self) -> &Arc<[R]> {
        &self.items
    }

    pub fn version(&self) -> Option<u64> {
        self.version
    }

    /// Identifies the current binding; events from older bindings are
    /// ignored.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_bound(&self) -> bool {
        self.owner.is_some()
    }

    /// Unbound/Error/Synced → Subscribing for `owner`. Clears items held for
    /// any previous binding.
    pub fn bind(&mut self, owner: &str) -> u64 {
        self.generation += 1;
        self.owner = Some(owner.to_string());
        self.sync = SyncState::Subscribing;
        self.items = Arc::from(Vec::new());
        self.version = None;
        self.generation
    }

    /// Any state → Unbound, emptying items.
    pub fn unbind(&mut self) {
        self.generation += 1;
        self.owner = None;
        self.sync = SyncState::Unbound;
        self.items = Arc::from(Vec::new());
        self.version = None;
    }

    /// Replace the collection with `records`. Returns false when the
    /// snapshot was ignored: wrong binding, mirror in error, or a version
    /// not newer than the one already applied.
    pub fn apply_snapshot(
        &mut self,
        generation: u64,
        version: Option<u64>,
        mut records: Vec<R>,
    ) -> bool {
        if generation != self.generation || self.owner.is_none() {
            return false;
        }
        if !matches!(self.sync, SyncState::Subscribing | SyncState::Synced) {
            return false;
        }
        if let (Some(incoming), Some(current)) = (version, self.version) {
            if incoming <= current {
                tracing::debug!(
                    collection = R::COLLECTION,
                    incoming,
                    current,
                    "discarding stale snapshot"
                );
                return false;
            }
        }
        sort_newest_first(&mut records);
        self.items = Arc::from(records);
        if version.is_some() {
            self.version = version;
        }
        self.sync = SyncState::Synced;
        true
    }

    /// Subscribing/Synced → Error. Items are kept.
    pub fn fail(&mut self, generation: u64, error: RemoteError) -> bool {
        if generation != self.generation {
            return false;
        }
        if !matches!(self.sync, SyncState::Subscribing | SyncState::Synced) {
            return false;
        }
        self.sync = SyncState::Error(error);
        true
    }
}

/// Newest first; records without a creation time sort last.
pub fn sort_newest_first<R: MirrorRecord>(records: &mut [R]) {
    records.sort_by_key(|record| {
        std::cmp::Reverse(record.created_at().unwrap_or(DateTime::<Utc>::UNIX_EPOCH))
    });
}

fn decode_documents<R: MirrorRecord>(documents: &[Document]) -> Vec<R> {
    documents
        .iter()
        .filter_map(|doc| match R::from_document(doc) {
            Ok(record) => Some(record),
            Err(err) => {
                tracing::warn!(
                    collection = R::COLLECTION,
                    id = %doc.id,
                    error = %err,
                    "skipping undecodable document"
                );
                None
            }
        })
        .collect()
}

/// Subscription-driven mirror with write-through mutation.
pub struct Mirror<R: MirrorRecord> {
    store: Arc<dyn DocumentStore>,
    state: Arc<watch::Sender<MirrorState<R>>>,
    pump: Option<JoinHandle<()>>,
}

impl<R: MirrorRecord> Mirror<R> {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        let (state, _) = watch::channel(MirrorState::default());
        Self {
            store,
            state: Arc::new(state),
            pump: None,
        }
    }

    /// Receiver that observes every state transition.
    pub fn watch(&self) -> watch::Receiver<MirrorState<R>> {
        self.state.subscribe()
    }

    pub fn state(&self) -> MirrorState<R> {
        self.state.borrow().clone()
    }

    pub fn items(&self) -> Arc<[R]> {
        Arc::clone(&self.state.borrow().items)
    }

    pub fn sync_state(&self) -> SyncState {
        self.state.borrow().sync.clone()
    }

    pub fn owner(&self) -> Option<String> {
        self.state.borrow().owner.clone()
    }

    /// Start mirroring `owner`'s records. A subscription failure is not
    /// returned; it moves the mirror to [`SyncState::Error`].
    pub async fn bind(&mut self, owner: &str) {
        {
            let current = self.state.borrow();
            if current.owner.as_deref() == Some(owner)
                && matches!(current.sync, SyncState::Subscribing | SyncState::Synced)
            {
                return;
            }
        }
        self.stop_pump();

        let mut generation = 0;
        self.state.send_modify(|state| generation = state.bind(owner));
        tracing::debug!(collection = R::COLLECTION, owner, "mirror subscribing");

        match self.store.subscribe(R::COLLECTION, owner).await {
            Ok(subscription) => {
                let state = Arc::clone(&self.state);
                self.pump = Some(tokio::spawn(pump(subscription, state, generation)));
            }
            Err(err) => {
                tracing::warn!(collection = R::COLLECTION, owner, error = %err, "subscribe failed");
                self.state.send_if_modified(|state| state.fail(generation, err));
            }
        }
    }

    /// Cancel the subscription and empty the mirror.
    pub fn unbind(&mut self) {
        self.stop_pump();
        self.state.send_modify(|state| state.unbind());
        tracing::debug!(collection = R::COLLECTION, "mirror unbound");
    }

    /// Wait until the first snapshot lands, returning the items.
    pub async fn wait_synced(&self, timeout: Duration) -> Result<Arc<[R]>> {
        let mut rx = self.state.subscribe();
        let waited = tokio::time::timeout(
            timeout,
            rx.wait_for(|state| !matches!(state.sync, SyncState::Subscribing)),
        )
        .await;
        let state = match waited {
            Ok(Ok(state)) => state.clone(),
            Ok(Err(_)) => return Err(Error::NotBound),
            Err(_) => return Err(Error::SyncTimeout(timeout.as_millis() as u64)),
        };
        match state.sync {
            SyncState::Synced => Ok(state.items),
            SyncState::Error(err) => Err(Error::Subscription(err)),
            SyncState::Unbound | SyncState::Subscribing => Err(Error::NotBound),
        }
    }

    fn require_owner(&self) -> Result<String> {
        self.owner().ok_or(Error::NotBound)
    }

    /// Write-through create. Returns the assigned id once the store accepts
    /// the write, without waiting for the echo.
    pub async fn create(&self, write: Write) -> Result<String> {
        self.require_owner()?;
        match self.store.create(R::COLLECTION, write).await {
            Ok(id) => {
                tracing::info!(collection = R::COLLECTION, id = %id, "created");
                Ok(id)
            }
            Err(err) => Err(write_failed::<R>(WriteOp::Create, None, err)),
        }
    }

    pub async fn update(&self, id: &str, write: Write) -> Result<()> {
        self.require_owner()?;
        match self.store.update(R::COLLECTION, id, write).await {
            Ok(()) => {
                tracing::info!(collection = R::COLLECTION, id, "updated");
                Ok(())
            }
            Err(err) => Err(write_failed::<R>(WriteOp::Update, Some(id), err)),
        }
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        self.require_owner()?;
        match self.store.delete(R::COLLECTION, id).await {
            Ok(()) => {
                tracing::info!(collection = R::COLLECTION, id, "deleted");
                Ok(())
            }
            Err(err) => Err(write_failed::<R>(WriteOp::Delete, Some(id), err)),
        }
    }

    fn stop_pump(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }
}

impl<R: MirrorRecord> Drop for Mirror<R> {
    fn drop(&mut self) {
        self.stop_pump();
    }
}

fn write_failed<R: MirrorRecord>(op: WriteOp, id: Option<&str>, err: RemoteError) -> Error {
    tracing::warn!(
        collection = R::COLLECTION,
        op = %op,
        id = id.unwrap_or("-"),
        error = %err,
        "write rejected"
    );
    Error::write(op, err)
}

async fn pump<R: MirrorRecord>(
    mut subscription: Subscription,
    state: Arc<watch::Sender<MirrorState<R>>>,
    generation: u64,
) {
    while let Some(event) = subscription.next().await {
        match event {
            SubscriptionEvent::Snapshot(snapshot) => {
                let records = decode_documents::<R>(&snapshot.documents);
                let count = records.len();
                let applied = state.send_if_modified(|current| {
                    current.apply_snapshot(generation, snapshot.version, records)
                });
                if applied {
                    tracing::debug!(
                        collection = R::COLLECTION,
                        version = ?snapshot.version,
                        count,
                        "snapshot applied"
                    );
                }
            }
            SubscriptionEvent::Error(err) => {
                tracing::warn!(collection = R::COLLECTION, error = %err, "subscription failed");
                state.send_if_modified(|current| current.fail(generation, err));
                return;
            }
        }
    }
    let lost = RemoteError::Transport("subscription closed by store".to_string());
    if state.send_if_modified(|current| current.fail(generation, lost)) {
        tracing::warn!(collection = R::COLLECTION, "subscription closed by store");
    }
}

/// Mirror of the signed-in user's tasks.
pub struct TaskMirror {
    inner: Mirror<Task>,
}

impl TaskMirror {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            inner: Mirror::new(store),
        }
    }

    pub async fn bind(&mut self, owner: &str) {
        self.inner.bind(owner).await
    }

    pub fn unbind(&mut self) {
        self.inner.unbind()
    }

    pub fn watch(&self) -> watch::Receiver<MirrorState<Task>> {
        self.inner.watch()
    }

    pub fn items(&self) -> Arc<[Task]> {
        self.inner.items()
    }

    pub fn sync_state(&self) -> SyncState {
        self.inner.sync_state()
    }

    pub fn owner(&self) -> Option<String> {
        self.inner.owner()
    }

    pub async fn wait_synced(&self, timeout: Duration) -> Result<Arc<[Task]>> {
        self.inner.wait_synced(timeout).await
    }

    pub fn stats(&self) -> TaskStats {
        TaskStats::from_tasks(&self.items())
    }

    /// Rejects an empty title before touching the store.
    pub async fn create(&self, draft: TaskDraft) -> Result<String> {
        draft.validate()?;
        let owner = self.inner.require_owner()?;
        self.inner.create(draft.to_write(&owner)).await
    }

    pub async fn update(&self, id: &str, patch: TaskPatch) -> Result<()> {
        patch.validate()?;
        self.inner.update(id, patch.to_write()).await
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        self.inner.delete(id).await
    }

    /// Writes `completed` (and the store's `updatedAt`) and nothing else.
    pub async fn toggle_completed(&self, id: &str, value: bool) -> Result<()> {
        self.inner
            .update(id, TaskPatch::completed(value).to_write())
            .await
    }
}

/// Mirror of the signed-in user's own categories.
pub struct CategoryMirror {
    inner: Mirror<Category>,
}

impl CategoryMirror {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            inner: Mirror::new(store),
        }
    }

    pub async fn bind(&mut self, owner: &str) {
        self.inner.bind(owner).await
    }

    pub fn unbind(&mut self) {
        self.inner.unbind()
    }

    pub fn watch(&self) -> watch::Receiver<MirrorState<Category>> {
        self.inner.watch()
    }

    pub fn items(&self) -> Arc<[Category]> {
        self.inner.items()
    }

    pub fn sync_state(&self) -> SyncState {
        self.inner.sync_state()
    }

    pub async fn wait_synced(&self, timeout: Duration) -> Result<Arc<[Category]>> {
        self.inner.wait_synced(timeout).await
    }

    /// Built-ins followed by the user's categories in mirror order.
    pub fn effective_categories(&self) -> Vec<EffectiveCategory> {
        category::effective_categories(&self.items())
    }

    pub fn resolve_color(&self, name: &str) -> String {
        category::resolve_color(name, &self.items())
    }

    pub async fn create(&self, draft: CategoryDraft) -> Result<String> {
        draft.validate()?;
        let owner = self.inner.require_owner()?;
        self.inner.create(draft.to_write(&owner)).await
    }

    pub async fn update(&self, id: &str, patch: CategoryPatch) -> Result<()> {
        patch.validate()?;
        self.inner.update(id, patch.to_write()).await
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        self.inner.delete(id).await
    }
}
