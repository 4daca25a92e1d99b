use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Weak,
    },
};

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

use super::{push_id::PushIdGenerator, Patch, RecordStore, Snapshot, SnapshotCallback, Subscription};
use crate::{
    error::{StoreError, WriteOp},
    models::{Collection, RecordId},
};

type Records = BTreeMap<RecordId, Value>;

/// In-process record store, optionally mirrored to a JSON file.
///
/// Records are enumerated in identifier order, which is creation order for
/// store-generated identifiers. Callbacks run synchronously on the writing
/// task and must not write to the same store.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    data: RwLock<Data>,
    subscribers: Mutex<Vec<Subscriber>>,
    ids: PushIdGenerator,
    next_subscriber: AtomicU64,
    offline: AtomicBool,
    path: Option<PathBuf>,
}

#[derive(Default)]
struct Data {
    collections: BTreeMap<Collection, Records>,
    version: u64,
}

impl Data {
    fn snapshot(&self, collection: Collection) -> Snapshot {
        let entries = self
            .collections
            .get(&collection)
            .map(|records| {
                records
                    .iter()
                    .map(|(id, value)| (id.clone(), value.clone()))
                    .collect()
            })
            .unwrap_or_default();
        Snapshot::new(collection, self.version, entries)
    }
}

struct Subscriber {
    id: u64,
    collection: Collection,
    slot: Arc<Mutex<Slot>>,
}

struct Slot {
    last_version: Option<u64>,
    callback: SnapshotCallback,
}

impl Slot {
    fn offer(&mut self, snapshot: Snapshot) {
        if self
            .last_version
            .is_some_and(|seen| seen >= snapshot.version())
        {
            return;
        }
        self.last_version = Some(snapshot.version());
        (self.callback)(snapshot);
    }
}

/// On-disk layout of the local catalog file.
#[derive(Debug, Default, Serialize, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    games: Records,
    #[serde(default)]
    platforms: Records,
    #[serde(default)]
    locations: Records,
}

impl MemoryStore {
    /// Create an empty, purely in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a store backed by `path`, loading existing records when the file exists.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let collections = load_catalog(&path)?;
        let total: usize = collections.values().map(BTreeMap::len).sum();
        info!(path = %path.display(), records = total, "Opened local catalog");
        Ok(Self {
            inner: Arc::new(Inner {
                data: RwLock::new(Data {
                    collections,
                    version: 0,
                }),
                path: Some(path),
                ..Inner::default()
            }),
        })
    }

    /// Make every subsequent write fail until switched back.
    pub fn set_offline(&self, offline: bool) {
        self.inner.offline.store(offline, Ordering::SeqCst);
    }

    /// Current contents of `collection`.
    pub fn snapshot(&self, collection: Collection) -> Snapshot {
        self.inner.data.read().snapshot(collection)
    }

    /// Number of registered callbacks across all collections.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.lock().len()
    }

    fn ensure_online(&self, op: WriteOp, collection: Collection) -> Result<(), StoreError> {
        if self.inner.offline.load(Ordering::SeqCst) {
            return Err(StoreError::write(op, collection, "store is offline"));
        }
        Ok(())
    }

    /// Apply `change` to one collection, persist, then notify subscribers.
    ///
    /// `change` reports whether it modified anything; no-op changes are not
    /// persisted and do not produce a snapshot.
    fn mutate(
        &self,
        op: WriteOp,
        collection: Collection,
        change: impl FnOnce(&mut Records) -> bool,
    ) -> Result<(), StoreError> {
        let snapshot = {
            let mut data = self.inner.data.write();
            let previous = data.collections.get(&collection).cloned();
            let changed = change(data.collections.entry(collection).or_default());
            if !changed {
                return Ok(());
            }

            if let Some(path) = self.inner.path.as_deref() {
                if let Err(err) = persist_catalog(path, &data.collections) {
                    match previous {
                        Some(records) => data.collections.insert(collection, records),
                        None => data.collections.remove(&collection),
                    };
                    return Err(StoreError::write(op, collection, err));
                }
            }

            data.version += 1;
            data.snapshot(collection)
        };
        self.deliver(snapshot);
        Ok(())
    }

    fn deliver(&self, snapshot: Snapshot) {
        let slots: Vec<_> = self
            .inner
            .subscribers
            .lock()
            .iter()
            .filter(|subscriber| subscriber.collection == snapshot.collection())
            .map(|subscriber| subscriber.slot.clone())
            .collect();
        debug!(
            collection = %snapshot.collection(),
            version = snapshot.version(),
            records = snapshot.len(),
            subscribers = slots.len(),
            "Delivering snapshot"
        );
        for slot in slots {
            slot.lock().offer(snapshot.clone());
        }
    }
}

impl RecordStore for MemoryStore {
    fn subscribe(&self, collection: Collection, on_snapshot: SnapshotCallback) -> Subscription {
        let id = self.inner.next_subscriber.fetch_add(1, Ordering::SeqCst);
        let slot = Arc::new(Mutex::new(Slot {
            last_version: None,
            callback: on_snapshot,
        }));
        self.inner.subscribers.lock().push(Subscriber {
            id,
            collection,
            slot: slot.clone(),
        });
        debug!(%collection, subscriber = id, "Subscribed");

        let initial = self.snapshot(collection);
        slot.lock().offer(initial);

        let inner: Weak<Inner> = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = inner.upgrade() {
                inner
                    .subscribers
                    .lock()
                    .retain(|subscriber| subscriber.id != id);
                debug!(%collection, subscriber = id, "Unsubscribed");
            }
        })
    }

    async fn create(&self, collection: Collection, payload: Value) -> Result<RecordId, StoreError> {
        self.ensure_online(WriteOp::Create, collection)?;
        let id = self.inner.ids.next();
        let key = id.clone();
        self.mutate(WriteOp::Create, collection, move |records| {
            records.insert(key, payload);
            true
        })?;
        info!(%collection, id = %id, "Created record");
        Ok(id)
    }

    async fn update(
        &self,
        collection: Collection,
        id: &RecordId,
        patch: Patch,
    ) -> Result<(), StoreError> {
        self.ensure_online(WriteOp::Update, collection)?;
        self.mutate(WriteOp::Update, collection, |records| {
            let before = records.get(id).cloned();
            let mut fields = match before.clone() {
                Some(Value::Object(fields)) => fields,
                _ => Map::new(),
            };
            for (key, value) in patch {
                if value.is_null() {
                    fields.remove(&key);
                } else {
                    fields.insert(key, value);
                }
            }
            let after = (!fields.is_empty()).then_some(Value::Object(fields));
            if after == before {
                return false;
            }
            match after {
                Some(value) => records.insert(id.clone(), value),
                None => records.remove(id),
            };
            true
        })?;
        info!(%collection, id = %id, "Updated record");
        Ok(())
    }

    async fn delete(&self, collection: Collection, id: &RecordId) -> Result<(), StoreError> {
        self.ensure_online(WriteOp::Delete, collection)?;
        self.mutate(WriteOp::Delete, collection, |records| {
            records.remove(id).is_some()
        })?;
        info!(%collection, id = %id, "Deleted record");
        Ok(())
    }
}

fn load_catalog(path: &Path) -> Result<BTreeMap<Collection, Records>, StoreError> {
    let persist_err = |reason: String| StoreError::Persist {
        path: path.to_path_buf(),
        reason,
    };
    if !path.exists() {
        return Ok(BTreeMap::new());
    }
    let contents = fs::read_to_string(path).map_err(|err| persist_err(err.to_string()))?;
    let file: CatalogFile = if contents.trim().is_empty() {
        CatalogFile::default()
    } else {
        serde_json::from_str(&contents).map_err(|err| persist_err(err.to_string()))?
    };
    Ok(BTreeMap::from([
        (Collection::Games, file.games),
        (Collection::Platforms, file.platforms),
        (Collection::Locations, file.locations),
    ]))
}

fn persist_catalog(
    path: &Path,
    collections: &BTreeMap<Collection, Records>,
) -> std::io::Result<()> {
    let take = |collection| collections.get(&collection).cloned().unwrap_or_default();
    let file = CatalogFile {
        games: take(Collection::Games),
        platforms: take(Collection::Platforms),
        locations: take(Collection::Locations),
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let serialized = serde_json::to_string_pretty(&file)?;
    let staging = path.with_extension("json.tmp");
    fs::write(&staging, serialized)?;
    fs::rename(&staging, path)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::Result;
    use serde_json::json;
    use tempfile::tempdir;

    use super::*;

    fn recorder(store: &MemoryStore, collection: Collection) -> (Arc<Mutex<Vec<Snapshot>>>, Subscription) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let subscription = store.subscribe(
            collection,
            Box::new(move |snapshot| sink.lock().push(snapshot)),
        );
        (seen, subscription)
    }

    #[test]
    fn slot_skips_stale_and_repeated_versions() {
        let delivered = Arc::new(Mutex::new(Vec::new()));
        let sink = delivered.clone();
        let mut slot = Slot {
            last_version: None,
            callback: Box::new(move |snapshot: Snapshot| sink.lock().push(snapshot.version())),
        };
        for version in [5, 3, 5, 6] {
            slot.offer(Snapshot::new(Collection::Games, version, Vec::new()));
        }
        assert_eq!(*delivered.lock(), [5, 6]);
    }

    #[tokio::test]
    async fn subscribers_get_current_contents_then_changes() -> Result<()> {
        let store = MemoryStore::new();
        let first = store
            .create(Collection::Platforms, json!({ "name": "PC" }))
            .await?;

        let (seen, _subscription) = recorder(&store, Collection::Platforms);
        assert_eq!(seen.lock().len(), 1);
        assert!(seen.lock()[0].contains(&first));

        let second = store
            .create(Collection::Platforms, json!({ "name": "Switch" }))
            .await?;
        let snapshots = seen.lock();
        assert_eq!(snapshots.len(), 2);
        let ids: Vec<_> = snapshots[1].entries().iter().map(|(id, _)| id.clone()).collect();
        assert_eq!(ids, vec![first, second]);
        Ok(())
    }

    #[tokio::test]
    async fn other_collections_do_not_notify() -> Result<()> {
        let store = MemoryStore::new();
        let (seen, _subscription) = recorder(&store, Collection::Games);
        store
            .create(Collection::Platforms, json!({ "name": "PC" }))
            .await?;
        assert_eq!(seen.lock().len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn delete_is_idempotent() -> Result<()> {
        let store = MemoryStore::new();
        let id = store
            .create(Collection::Games, json!({ "name": "Go" }))
            .await?;
        let (seen, _subscription) = recorder(&store, Collection::Games);

        store.delete(Collection::Games, &id).await?;
        assert!(!seen.lock().last().is_some_and(|snapshot| snapshot.contains(&id)));

        store.delete(Collection::Games, &id).await?;
        store
            .delete(Collection::Games, &RecordId::from("missing"))
            .await?;
        assert_eq!(seen.lock().len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn update_merges_and_null_removes() -> Result<()> {
        let store = MemoryStore::new();
        let id = store
            .create(
                Collection::Games,
                json!({ "name": "Go", "description": "Stones", "platform": "Board" }),
            )
            .await?;

        let mut patch = Patch::new();
        patch.insert("platform".to_string(), json!("Tabletop"));
        patch.insert("description".to_string(), Value::Null);
        store.update(Collection::Games, &id, patch).await?;

        let snapshot = store.snapshot(Collection::Games);
        assert_eq!(
            snapshot.entries()[0].1,
            json!({ "name": "Go", "platform": "Tabletop" })
        );
        Ok(())
    }

    #[tokio::test]
    async fn dropping_subscription_stops_delivery() -> Result<()> {
        let store = MemoryStore::new();
        let (seen, subscription) = recorder(&store, Collection::Games);
        assert_eq!(store.subscriber_count(), 1);
        drop(subscription);
        assert_eq!(store.subscriber_count(), 0);

        store.create(Collection::Games, json!({ "name": "Go" })).await?;
        assert_eq!(seen.lock().len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn offline_writes_fail_without_changes() -> Result<()> {
        let store = MemoryStore::new();
        store.set_offline(true);
        let err = store
            .create(Collection::Games, json!({ "name": "Go" }))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Write {
                op: WriteOp::Create,
                collection: Collection::Games,
                ..
            }
        ));
        assert!(store.snapshot(Collection::Games).is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn catalog_file_round_trips() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("nested").join("catalog.json");

        let store = MemoryStore::open(&path)?;
        let id = store
            .create(Collection::Locations, json!({ "name": "Market", "coordinates": null }))
            .await?;
        assert!(path.exists());

        let reopened = MemoryStore::open(&path)?;
        let snapshot = reopened.snapshot(Collection::Locations);
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.contains(&id));
        Ok(())
    }

    #[tokio::test]
    async fn failed_persist_rolls_back() -> Result<()> {
        let dir = tempdir()?;
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "not a directory")?;
        let store = MemoryStore::open(blocker.join("catalog.json"))?;

        let result = store
            .create(Collection::Platforms, json!({ "name": "PC" }))
            .await;
        assert!(result.is_err());
        assert!(store.snapshot(Collection::Platforms).is_empty());
        Ok(())
    }
}
