//! In-process document store.
//!
//! Pushes a full owner-filtered snapshot to every live subscriber of a
//! collection after each write. Failure hooks let callers exercise the
//! permission and transport paths.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use tokio::sync::mpsc;

use crate::clock::{Clock, SystemClock};
use crate::error::RemoteError;

use super::{
    new_document_id, owned_by, Document, DocumentStore, Fields, Snapshot, Subscription,
    SubscriptionEvent, Write,
};

#[derive(Default)]
struct Collection {
    documents: BTreeMap<String, Fields>,
    version: u64,
}

struct Subscriber {
    collection: String,
    owner_id: String,
    tx: mpsc::UnboundedSender<SubscriptionEvent>,
}

#[derive(Default)]
struct State {
    collections: HashMap<String, Collection>,
    subscribers: Vec<Subscriber>,
    deny_writes: bool,
    deny_subscriptions: bool,
    last_stamp: Option<DateTime<Utc>>,
}

#[derive(Clone)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
    clock: Arc<dyn Clock>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Arc::new(Mutex::new(State::default())),
            clock,
        }
    }

    /// Reject every subsequent write with a permission error.
    pub fn deny_writes(&self, deny: bool) {
        self.lock().deny_writes = deny;
    }

    /// Reject every subsequent subscribe call with a permission error.
    pub fn deny_subscriptions(&self, deny: bool) {
        self.lock().deny_subscriptions = deny;
    }

    /// Deliver an error to every live subscriber of `collection` and close
    /// their subscriptions.
    pub fn fail_subscriptions(&self, collection: &str, error: RemoteError) {
        let mut state = self.lock();
        state.subscribers.retain(|sub| {
            if sub.collection != collection {
                return true;
            }
            let _ = sub.tx.send(SubscriptionEvent::Error(error.clone()));
            false
        });
    }

    /// Number of subscriptions still attached.
    pub fn live_subscriptions(&self, collection: &str) -> usize {
        let mut state = self.lock();
        state.subscribers.retain(|sub| !sub.tx.is_closed());
        state
            .subscribers
            .iter()
            .filter(|sub| sub.collection == collection)
            .count()
    }

    /// Raw document lookup, bypassing subscriptions.
    pub fn get(&self, collection: &str, id: &str) -> Option<Document> {
        let state = self.lock();
        state
            .collections
            .get(collection)
            .and_then(|col| col.documents.get(id))
            .map(|fields| Document {
                id: id.to_string(),
                fields: fields.clone(),
            })
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn next_stamp(&self, state: &mut State) -> String {
        let mut now = self.clock.now();
        if let Some(last) = state.last_stamp {
            if now <= last {
                now = last + Duration::microseconds(1);
            }
        }
        state.last_stamp = Some(now);
        now.to_rfc3339_opts(SecondsFormat::Micros, true)
    }
}

fn snapshot_for(collection: Option<&Collection>, owner_id: &str) -> Snapshot {
    let documents: Vec<Document> = collection
        .map(|col| {
            col.documents
                .iter()
                .map(|(id, fields)| Document {
                    id: id.clone(),
                    fields: fields.clone(),
                })
                .collect()
        })
        .unwrap_or_default();
    Snapshot {
        version: Some(collection.map(|col| col.version).unwrap_or(0)),
        documents: owned_by(&documents, owner_id),
    }
}

fn broadcast(state: &mut State, collection: &str) {
    let State {
        collections,
        subscribers,
        ..
    } = state;
    let col = collections.get(collection);
    subscribers.retain(|sub| {
        if sub.collection != collection {
            return !sub.tx.is_closed();
        }
        let snapshot = snapshot_for(col, &sub.owner_id);
        sub.tx.send(SubscriptionEvent::Snapshot(snapshot)).is_ok()
    });
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn subscribe(
        &self,
        collection: &str,
        owner_id: &str,
    ) -> Result<Subscription, RemoteError> {
        let mut state = self.lock();
        if state.deny_subscriptions {
            return Err(RemoteError::PermissionDenied(format!(
                "cannot read {collection}"
            )));
        }
        let (tx, subscription) = Subscription::channel();
        let snapshot = snapshot_for(state.collections.get(collection), owner_id);
        let _ = tx.send(SubscriptionEvent::Snapshot(snapshot));
        state.subscribers.push(Subscriber {
            collection: collection.to_string(),
            owner_id: owner_id.to_string(),
            tx,
        });
        Ok(subscription)
    }

    async fn create(&self, collection: &str, write: Write) -> Result<String, RemoteError> {
        let mut state = self.lock();
        if state.deny_writes {
            return Err(RemoteError::PermissionDenied(format!(
                "cannot write {collection}"
            )));
        }
        let stamp = self.next_stamp(&mut state);
        let id = new_document_id();
        let mut fields = Fields::new();
        write.apply_to(&mut fields, &stamp);
        let col = state.collections.entry(collection.to_string()).or_default();
        col.documents.insert(id.clone(), fields);
        col.version += 1;
        broadcast(&mut state, collection);
        Ok(id)
    }

    async fn update(&self, collection: &str, id: &str, write: Write) -> Result<(), RemoteError> {
        let mut state = self.lock();
        if state.deny_writes {
            return Err(RemoteError::PermissionDenied(format!(
                "cannot write {collection}"
            )));
        }
        let stamp = self.next_stamp(&mut state);
        let col = state
            .collections
            .get_mut(collection)
            .ok_or_else(|| RemoteError::NotFound(id.to_string()))?;
        let fields = col
            .documents
            .get_mut(id)
            .ok_or_else(|| RemoteError::NotFound(id.to_string()))?;
        write.apply_to(fields, &stamp);
        col.version += 1;
        broadcast(&mut state, collection);
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), RemoteError> {
        let mut state = self.lock();
        if state.deny_writes {
            return Err(RemoteError::PermissionDenied(format!(
                "cannot write {collection}"
            )));
        }
        let removed = state
            .collections
            .get_mut(collection)
            .and_then(|col| {
                let removed = col.documents.remove(id);
                if removed.is_some() {
                    col.version += 1;
                }
                removed
            })
            .is_some();
        if removed {
            broadcast(&mut state, collection);
        }
        Ok(())
    }
}
