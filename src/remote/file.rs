//! File-backed document store.
//!
//! Each collection lives in `<root>/<collection>.json`. Writes hold an
//! exclusive file lock and replace the file atomically. Subscriptions watch
//! the store directory and push a fresh snapshot whenever the collection
//! version moves, so separate processes see each other's writes live.

use std::path::PathBuf;
use std::sync::mpsc as std_mpsc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::SecondsFormat;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::clock::{Clock, SystemClock};
use crate::error::{Error, RemoteError};
use crate::lock::{LockedOperation, DEFAULT_LOCK_TIMEOUT_MS};
use crate::storage::{CollectionFile, Storage};

use super::{
    new_document_id, owned_by, Document, DocumentStore, Fields, Snapshot, Subscription,
    SubscriptionEvent, Write,
};

const WATCH_DEBOUNCE_MS: u64 = 50;
const WATCH_IDLE_POLL_MS: u64 = 250;

#[derive(Clone)]
pub struct FileStore {
    storage: Storage,
    clock: Arc<dyn Clock>,
}

impl FileStore {
    /// Open (and create if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> crate::error::Result<Self> {
        Self::open_with_clock(root, Arc::new(SystemClock))
    }

    pub fn open_with_clock(
        root: impl Into<PathBuf>,
        clock: Arc<dyn Clock>,
    ) -> crate::error::Result<Self> {
        let storage = Storage::new(root);
        storage.init()?;
        Ok(Self { storage, clock })
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Run a read-modify-write on one collection under its lock. The closure
    /// returns whether it changed anything; only then is the version bumped
    /// and the file rewritten.
    async fn modify<T, F>(&self, collection: &str, f: F) -> Result<T, RemoteError>
    where
        T: Send + 'static,
        F: FnOnce(&mut CollectionFile, &str) -> Result<(T, bool), RemoteError> + Send + 'static,
    {
        let storage = self.storage.clone();
        let clock = Arc::clone(&self.clock);
        let collection = collection.to_string();
        let joined = tokio::task::spawn_blocking(move || {
            let _op =
                LockedOperation::begin(storage.lock_file(&collection), DEFAULT_LOCK_TIMEOUT_MS)
                    .map_err(to_remote)?;
            let mut file = storage.read_collection(&collection).map_err(to_remote)?;
            let stamp = clock.now().to_rfc3339_opts(SecondsFormat::Micros, true);
            let (value, changed) = f(&mut file, &stamp)?;
            if changed {
                file.version += 1;
                storage
                    .write_json(&storage.collection_file(&collection), &file)
                    .map_err(to_remote)?;
            }
            Ok(value)
        })
        .await;
        joined.map_err(|err| RemoteError::Transport(format!("store task failed: {err}")))?
    }
}

fn to_remote(err: Error) -> RemoteError {
    match err {
        Error::Io(io) if io.kind() == std::io::ErrorKind::PermissionDenied => {
            RemoteError::PermissionDenied(io.to_string())
        }
        other => RemoteError::Transport(other.to_string()),
    }
}

fn snapshot_of(file: &CollectionFile, owner_id: &str) -> Snapshot {
    Snapshot {
        version: Some(file.version),
        documents: owned_by(&file.documents, owner_id),
    }
}

#[async_trait]
impl DocumentStore for FileStore {
    async fn subscribe(
        &self,
        collection: &str,
        owner_id: &str,
    ) -> Result<Subscription, RemoteError> {
        let storage = self.storage.clone();
        let name = collection.to_string();
        let initial = tokio::task::spawn_blocking(move || storage.read_collection(&name))
            .await
            .map_err(|err| RemoteError::Transport(format!("store task failed: {err}")))?
            .map_err(to_remote)?;

        let (tx, subscription) = Subscription::channel();
        let _ = tx.send(SubscriptionEvent::Snapshot(snapshot_of(&initial, owner_id)));

        spawn_watch(
            self.storage.clone(),
            collection.to_string(),
            owner_id.to_string(),
            initial.version,
            tx,
        )?;
        Ok(subscription)
    }

    async fn create(&self, collection: &str, write: Write) -> Result<String, RemoteError> {
        self.modify(collection, move |file, stamp| {
            let id = new_document_id();
            let mut fields = Fields::new();
            write.apply_to(&mut fields, stamp);
            file.documents.push(Document {
                id: id.clone(),
                fields,
            });
            Ok((id, true))
        })
        .await
    }

    async fn update(&self, collection: &str, id: &str, write: Write) -> Result<(), RemoteError> {
        let id = id.to_string();
        self.modify(collection, move |file, stamp| {
            let doc = file
                .documents
                .iter_mut()
                .find(|doc| doc.id == id)
                .ok_or_else(|| RemoteError::NotFound(id.clone()))?;
            write.apply_to(&mut doc.fields, stamp);
            Ok(((), true))
        })
        .await
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), RemoteError> {
        let id = id.to_string();
        self.modify(collection, move |file, _stamp| {
            let before = file.documents.len();
            file.documents.retain(|doc| doc.id != id);
            Ok(((), file.documents.len() != before))
        })
        .await
    }
}

fn spawn_watch(
    storage: Storage,
    collection: String,
    owner_id: String,
    mut last_version: u64,
    tx: mpsc::UnboundedSender<SubscriptionEvent>,
) -> Result<(), RemoteError> {
    let (event_tx, event_rx) = std_mpsc::channel();
    let mut watcher: RecommendedWatcher = notify::recommended_watcher(move |res| {
        let _ = event_tx.send(res);
    })
    .map_err(|err| RemoteError::Transport(format!("watch error: {err}")))?;
    watcher
        .watch(storage.root(), RecursiveMode::NonRecursive)
        .map_err(|err| RemoteError::Transport(format!("watch error: {err}")))?;

    thread::spawn(move || {
        let _watcher = watcher;
        let debounce = Duration::from_millis(WATCH_DEBOUNCE_MS);
        // Catch writes that landed between the initial read and the watch.
        let mut pending: Option<Instant> = Some(Instant::now());

        loop {
            if tx.is_closed() {
                break;
            }
            let timeout = pending
                .map(|deadline| deadline.saturating_duration_since(Instant::now()))
                .unwrap_or(Duration::from_millis(WATCH_IDLE_POLL_MS));
            match event_rx.recv_timeout(timeout) {
                Ok(Ok(_)) => {
                    pending.get_or_insert_with(|| Instant::now() + debounce);
                }
                Ok(Err(err)) => {
                    let _ = tx.send(SubscriptionEvent::Error(RemoteError::Transport(format!(
                        "watch error: {err}"
                    ))));
                    break;
                }
                Err(std_mpsc::RecvTimeoutError::Timeout) => {
                    if pending.take().is_none() {
                        continue;
                    }
                    match storage.read_collection(&collection) {
                        Ok(file) if file.version != last_version => {
                            last_version = file.version;
                            tracing::debug!(
                                collection = %collection,
                                version = file.version,
                                "store change observed"
                            );
                            if tx
                                .send(SubscriptionEvent::Snapshot(snapshot_of(&file, &owner_id)))
                                .is_err()
                            {
                                break;
                            }
                        }
                        Ok(_) => {}
                        Err(err) => {
                            let _ = tx.send(SubscriptionEvent::Error(to_remote(err)));
                            break;
                        }
                    }
                }
                Err(std_mpsc::RecvTimeoutError::Disconnected) => break,
            }
        }
    });
    Ok(())
}
