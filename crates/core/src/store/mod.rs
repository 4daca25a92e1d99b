//! Record store client.
//!
//! [`RecordStore`] is the only path between the application and the backing
//! database. Reads are push-based: a subscriber receives the full contents of
//! a collection every time it changes. Writes resolve independently of any
//! subscription; the resulting change comes back through the subscribers.

mod firebase;
mod memory;
mod push_id;
mod stream;

use std::{fmt, future::Future};

use serde_json::{Map, Value};
use tracing::warn;

use crate::{
    error::StoreError,
    models::{Collection, Entity, Record, RecordId},
};

pub use firebase::FirebaseStore;
pub use memory::MemoryStore;

/// Callback invoked with each snapshot of a subscribed collection.
pub type SnapshotCallback = Box<dyn FnMut(Snapshot) + Send + 'static>;

/// Field map merged into an existing record by [`RecordStore::update`].
pub type Patch = Map<String, Value>;

/// Backing database for the catalog.
///
/// Implementations must deliver snapshots to each subscriber in version
/// order: once a subscriber has seen version `n`, it never receives a
/// snapshot older than `n`.
pub trait RecordStore: Clone + Send + Sync + 'static {
    /// Register `on_snapshot` for `collection`.
    ///
    /// The callback receives the current contents right away and again after
    /// every change. Dropping the returned [`Subscription`] unregisters it.
    fn subscribe(&self, collection: Collection, on_snapshot: SnapshotCallback) -> Subscription;

    /// Append a record and return its store-generated identifier.
    fn create(
        &self,
        collection: Collection,
        payload: Value,
    ) -> impl Future<Output = Result<RecordId, StoreError>> + Send;

    /// Merge top-level fields into a record. `null` values remove fields.
    fn update(
        &self,
        collection: Collection,
        id: &RecordId,
        patch: Patch,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Remove a record. Removing an unknown id succeeds.
    fn delete(
        &self,
        collection: Collection,
        id: &RecordId,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// Full contents of one collection at a point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    collection: Collection,
    version: u64,
    entries: Vec<(RecordId, Value)>,
}

impl Snapshot {
    /// Build a snapshot from already-ordered entries.
    pub fn new(collection: Collection, version: u64, entries: Vec<(RecordId, Value)>) -> Self {
        Self {
            collection,
            version,
            entries,
        }
    }

    /// Build a snapshot from a collection node of the database tree.
    ///
    /// Entries are ordered by identifier; anything other than an object
    /// yields an empty snapshot.
    pub fn from_tree(collection: Collection, version: u64, node: &Value) -> Self {
        let mut entries: Vec<(RecordId, Value)> = match node {
            Value::Object(map) => map
                .iter()
                .map(|(key, value)| (RecordId::new(key.clone()), value.clone()))
                .collect(),
            _ => Vec::new(),
        };
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        Self::new(collection, version, entries)
    }

    /// Collection this snapshot describes.
    pub fn collection(&self) -> Collection {
        self.collection
    }

    /// Monotonic version; newer snapshots supersede older ones.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Raw entries in enumeration order.
    pub fn entries(&self) -> &[(RecordId, Value)] {
        &self.entries
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the collection is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether a record with `id` is present.
    pub fn contains(&self, id: &RecordId) -> bool {
        self.entries.iter().any(|(key, _)| key == id)
    }

    /// Decode every entry as `T`, skipping entries that do not fit its shape.
    pub fn decode<T: Entity>(&self) -> Vec<Record<T>> {
        self.entries
            .iter()
            .filter_map(|(id, value)| match serde_json::from_value::<T>(value.clone()) {
                Ok(data) => Some(Record::new(id.clone(), data)),
                Err(err) => {
                    warn!(collection = %self.collection, id = %id, %err, "Skipping malformed record");
                    None
                }
            })
            .collect()
    }
}

/// Disposer for a registered snapshot callback.
///
/// The callback stays registered for as long as this value lives.
pub struct Subscription {
    dispose: Option<Box<dyn FnOnce() + Send + 'static>>,
}

impl Subscription {
    /// Wrap the action that unregisters a callback.
    pub fn new(dispose: impl FnOnce() + Send + 'static) -> Self {
        Self {
            dispose: Some(Box::new(dispose)),
        }
    }

    /// Unregister now instead of at drop.
    pub fn dispose(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(dispose) = self.dispose.take() {
            dispose();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.dispose.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use serde_json::json;

    use super::*;
    use crate::models::Platform;

    #[test]
    fn tree_snapshots_are_ordered_by_id() {
        let node = json!({
            "-b": { "name": "Switch" },
            "-a": { "name": "PC" },
        });
        let snapshot = Snapshot::from_tree(Collection::Platforms, 3, &node);
        let ids: Vec<_> = snapshot.entries().iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, ["-a", "-b"]);
        assert_eq!(snapshot.version(), 3);
        assert!(Snapshot::from_tree(Collection::Platforms, 1, &Value::Null).is_empty());
    }

    #[test]
    fn decode_skips_malformed_entries() {
        let snapshot = Snapshot::new(
            Collection::Platforms,
            1,
            vec![
                (RecordId::from("a"), json!({ "name": "PC" })),
                (RecordId::from("b"), json!("not a record")),
            ],
        );
        let platforms = snapshot.decode::<Platform>();
        assert_eq!(platforms, vec![Record::new("a", Platform::new("PC"))]);
    }

    #[test]
    fn subscription_disposes_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let subscription = Subscription::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        subscription.dispose();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
