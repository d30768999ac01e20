//! Remote document store interface.
//!
//! A store holds named collections of JSON documents keyed by store-assigned
//! ids. Every document carries an `ownerId` field; subscriptions are scoped to
//! one owner and deliver the complete matching set on every change.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::mpsc;

use crate::error::RemoteError;

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

/// Field holding the owning user on every document.
pub const OWNER_FIELD: &str = "ownerId";

pub type Fields = Map<String, Value>;

/// A stored record: its id plus its fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub fields: Fields,
}

impl Document {
    pub fn owner_id(&self) -> Option<&str> {
        self.fields.get(OWNER_FIELD).and_then(Value::as_str)
    }

    /// Fields with the id folded in, ready for typed decoding.
    pub fn to_value(&self) -> Value {
        let mut fields = self.fields.clone();
        fields.insert("id".to_string(), Value::String(self.id.clone()));
        Value::Object(fields)
    }
}

/// Field values to write, plus the fields the store stamps with its own
/// clock at write time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Write {
    pub fields: Fields,
    pub server_timestamps: Vec<String>,
}

impl Write {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn server_timestamp(mut self, key: impl Into<String>) -> Self {
        self.server_timestamps.push(key.into());
        self
    }

    /// Apply the write onto an existing field map, stamping server fields.
    pub fn apply_to(&self, target: &mut Fields, stamp: &str) {
        for (key, value) in &self.fields {
            target.insert(key.clone(), value.clone());
        }
        for key in &self.server_timestamps {
            target.insert(key.clone(), Value::String(stamp.to_string()));
        }
    }
}

/// Complete owner-filtered contents of a collection at one point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// Monotonic collection version when the store provides one.
    pub version: Option<u64>,
    pub documents: Vec<Document>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubscriptionEvent {
    Snapshot(Snapshot),
    Error(RemoteError),
}

/// Receiving end of a live query. Dropping it cancels the subscription.
#[derive(Debug)]
pub struct Subscription {
    rx: mpsc::UnboundedReceiver<SubscriptionEvent>,
}

impl Subscription {
    pub fn channel() -> (mpsc::UnboundedSender<SubscriptionEvent>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self { rx })
    }

    /// Next event, or `None` once the store closed the subscription.
    pub async fn next(&mut self) -> Option<SubscriptionEvent> {
        self.rx.recv().await
    }

    pub fn cancel(mut self) {
        self.rx.close();
    }
}

/// The remote collection collaborator consumed by the mirrors.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Live query for every document in `collection` owned by `owner_id`.
    async fn subscribe(
        &self,
        collection: &str,
        owner_id: &str,
    ) -> Result<Subscription, RemoteError>;

    /// Create a document, returning its assigned id.
    async fn create(&self, collection: &str, write: Write) -> Result<String, RemoteError>;

    /// Merge fields into an existing document.
    async fn update(&self, collection: &str, id: &str, write: Write) -> Result<(), RemoteError>;

    /// Remove a document. Removing a missing id is not an error.
    async fn delete(&self, collection: &str, id: &str) -> Result<(), RemoteError>;
}

pub(crate) fn new_document_id() -> String {
    ulid::Ulid::new().to_string().to_lowercase()
}

pub(crate) fn owned_by<'a>(
    documents: impl IntoIterator<Item = &'a Document>,
    owner_id: &str,
) -> Vec<Document> {
    documents
        .into_iter()
        .filter(|doc| doc.owner_id() == Some(owner_id))
        .cloned()
        .collect()
}
