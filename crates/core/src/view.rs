//! Live, decoded views over store collections.

use std::{marker::PhantomData, sync::Arc};

use parking_lot::RwLock;
use tracing::debug;

use crate::{
    filter::filter_by_name,
    models::{Entity, Record, RecordId},
    store::{RecordStore, Subscription},
};

/// In-memory copy of the latest snapshot of one collection.
///
/// Each snapshot fully replaces the held list; nothing is merged. The
/// subscription lives exactly as long as the view.
pub struct CollectionView<T: Entity> {
    state: Arc<RwLock<ViewState<T>>>,
    _subscription: Subscription,
    _entity: PhantomData<fn() -> T>,
}

struct ViewState<T> {
    records: Vec<Record<T>>,
    version: Option<u64>,
}

impl<T: Entity> CollectionView<T> {
    /// Subscribe to `T`'s collection in `store`.
    pub fn open<S: RecordStore>(store: &S) -> Self {
        let state = Arc::new(RwLock::new(ViewState {
            records: Vec::new(),
            version: None,
        }));
        let sink = state.clone();
        let subscription = store.subscribe(
            T::COLLECTION,
            Box::new(move |snapshot| {
                let records = snapshot.decode::<T>();
                let mut state = sink.write();
                if state.version.is_some_and(|seen| seen > snapshot.version()) {
                    return;
                }
                debug!(
                    collection = %snapshot.collection(),
                    version = snapshot.version(),
                    records = records.len(),
                    "View refreshed"
                );
                state.records = records;
                state.version = Some(snapshot.version());
            }),
        );
        Self {
            state,
            _subscription: subscription,
            _entity: PhantomData,
        }
    }

    /// Clone of the current records.
    pub fn records(&self) -> Vec<Record<T>> {
        self.state.read().records.clone()
    }

    /// Run `f` against the current records without cloning them.
    pub fn with_records<R>(&self, f: impl FnOnce(&[Record<T>]) -> R) -> R {
        f(&self.state.read().records)
    }

    /// Record with `id`, if present in the latest snapshot.
    pub fn get(&self, id: &RecordId) -> Option<Record<T>> {
        self.state
            .read()
            .records
            .iter()
            .find(|record| &record.id == id)
            .cloned()
    }

    /// Records whose name matches `query`; see [`filter_by_name`].
    pub fn matching(&self, query: &str) -> Vec<Record<T>> {
        self.with_records(|records| {
            filter_by_name(records, query)
                .into_iter()
                .cloned()
                .collect()
        })
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.state.read().records.len()
    }

    /// Whether the latest snapshot was empty.
    pub fn is_empty(&self) -> bool {
        self.state.read().records.is_empty()
    }

    /// Version of the snapshot currently held, `None` before the first one.
    pub fn version(&self) -> Option<u64> {
        self.state.read().version
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use serde_json::json;

    use parking_lot::Mutex;
    use serde_json::Value;

    use super::*;
    use crate::{
        error::StoreError,
        models::{Collection, Game, Platform},
        store::{MemoryStore, Patch, Snapshot, SnapshotCallback},
    };

    /// Store whose snapshots are pushed by hand.
    #[derive(Clone, Default)]
    struct ManualStore {
        callback: Arc<Mutex<Option<SnapshotCallback>>>,
    }

    impl ManualStore {
        fn push(&self, version: u64, names: &[&str]) {
            let entries = names
                .iter()
                .enumerate()
                .map(|(index, name)| (RecordId::new(format!("p{index}")), json!({ "name": name })))
                .collect();
            if let Some(callback) = self.callback.lock().as_mut() {
                callback(Snapshot::new(Collection::Platforms, version, entries));
            }
        }
    }

    impl RecordStore for ManualStore {
        fn subscribe(&self, _collection: Collection, on_snapshot: SnapshotCallback) -> Subscription {
            *self.callback.lock() = Some(on_snapshot);
            let slot = self.callback.clone();
            Subscription::new(move || {
                slot.lock().take();
            })
        }

        async fn create(&self, _collection: Collection, _payload: Value) -> Result<RecordId, StoreError> {
            Ok(RecordId::new("unused"))
        }

        async fn update(&self, _collection: Collection, _id: &RecordId, _patch: Patch) -> Result<(), StoreError> {
            Ok(())
        }

        async fn delete(&self, _collection: Collection, _id: &RecordId) -> Result<(), StoreError> {
            Ok(())
        }
    }

    #[test]
    fn older_snapshot_does_not_replace_newer() {
        let store = ManualStore::default();
        let view = CollectionView::<Platform>::open(&store);
        assert_eq!(view.version(), None);

        store.push(5, &["PC", "Switch"]);
        store.push(3, &["Amiga"]);

        assert_eq!(view.version(), Some(5));
        let names: Vec<_> = view.records().into_iter().map(|r| r.data.name).collect();
        assert_eq!(names, ["PC", "Switch"]);

        store.push(6, &[]);
        assert!(view.is_empty());
        drop(view);
        assert!(store.callback.lock().is_none());
    }

    #[tokio::test]
    async fn view_follows_latest_snapshot() -> Result<()> {
        let store = MemoryStore::new();
        let view = CollectionView::<Platform>::open(&store);
        assert!(view.is_empty());
        assert_eq!(view.version(), Some(0));

        let pc = store
            .create(Collection::Platforms, json!({ "name": "PC" }))
            .await?;
        store
            .create(Collection::Platforms, json!({ "name": "Switch" }))
            .await?;
        assert_eq!(view.len(), 2);
        assert_eq!(view.get(&pc).map(|r| r.data.name), Some("PC".to_string()));

        store.delete(Collection::Platforms, &pc).await?;
        let names: Vec<_> = view.records().into_iter().map(|r| r.data.name).collect();
        assert_eq!(names, ["Switch"]);
        Ok(())
    }

    #[tokio::test]
    async fn malformed_records_are_skipped() -> Result<()> {
        let store = MemoryStore::new();
        store.create(Collection::Games, json!(42)).await?;
        store
            .create(Collection::Games, json!({ "name": "Go" }))
            .await?;
        let view = CollectionView::<Game>::open(&store);
        assert_eq!(view.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn dropping_view_releases_subscription() {
        let store = MemoryStore::new();
        let view = CollectionView::<Game>::open(&store);
        assert_eq!(store.subscriber_count(), 1);
        drop(view);
        assert_eq!(store.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn matching_filters_by_name() -> Result<()> {
        let store = MemoryStore::new();
        for name in ["Chess", "Checkers", "Go"] {
            store
                .create(Collection::Games, json!({ "name": name }))
                .await?;
        }
        let view = CollectionView::<Game>::open(&store);
        let names: Vec<_> = view
            .matching("ch")
            .into_iter()
            .map(|record| record.data.name)
            .collect();
        assert_eq!(names, ["Chess", "Checkers"]);
        Ok(())
    }
}
