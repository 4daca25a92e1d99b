//! Form controllers for adding and editing catalog entities.
//!
//! Submission runs in two phases so a front-end never blocks on the store:
//! `begin_submit` validates and returns a [`PendingWrite`], the caller runs
//! [`PendingWrite::execute`] wherever it likes, and hands the result back to
//! the form's `complete`. `submit` chains the three for callers that can
//! simply await.

mod game;
mod location;
mod platform;

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::{
    error::{StoreError, ValidationError, WriteOp},
    models::{Collection, RecordId},
    store::{Patch, RecordStore},
};

pub use game::GameForm;
pub use location::LocationForm;
pub use platform::PlatformForm;

/// A validated write that has not been sent yet.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingWrite {
    /// Append a new record.
    Create {
        /// Target collection.
        collection: Collection,
        /// Full record body.
        payload: Value,
    },
    /// Merge changed fields into an existing record.
    Update {
        /// Target collection.
        collection: Collection,
        /// Record to change.
        id: RecordId,
        /// Changed fields only.
        patch: Patch,
    },
    /// Remove a record.
    Delete {
        /// Target collection.
        collection: Collection,
        /// Record to remove.
        id: RecordId,
    },
}

impl PendingWrite {
    /// Collection the write targets.
    pub fn collection(&self) -> Collection {
        match self {
            Self::Create { collection, .. }
            | Self::Update { collection, .. }
            | Self::Delete { collection, .. } => *collection,
        }
    }

    /// Kind of write.
    pub fn op(&self) -> WriteOp {
        match self {
            Self::Create { .. } => WriteOp::Create,
            Self::Update { .. } => WriteOp::Update,
            Self::Delete { .. } => WriteOp::Delete,
        }
    }

    /// Send the write to `store`.
    pub async fn execute<S: RecordStore>(self, store: &S) -> Result<WriteReceipt, StoreError> {
        let op = self.op();
        let collection = self.collection();
        debug!(%op, %collection, "Executing write");
        let id = match self {
            Self::Create {
                collection,
                payload,
            } => store.create(collection, payload).await?,
            Self::Update {
                collection,
                id,
                patch,
            } => {
                store.update(collection, &id, patch).await?;
                id
            }
            Self::Delete { collection, id } => {
                store.delete(collection, &id).await?;
                id
            }
        };
        Ok(WriteReceipt { op, collection, id })
    }
}

/// Acknowledgement of a write that reached the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteReceipt {
    /// Kind of write.
    pub op: WriteOp,
    /// Target collection.
    pub collection: Collection,
    /// Created or affected record.
    pub id: RecordId,
}

/// Where the front-end should go after a successful save.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    /// Leave the form.
    Back,
    /// Keep the form open, cleared for the next entry.
    Stay,
}

/// Result of a completed submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormOutcome {
    /// Record that was written.
    pub id: RecordId,
    /// Follow-up navigation.
    pub navigation: Navigation,
}

/// Whether a form creates a record or edits an existing one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormMode {
    /// Create a new record.
    Add,
    /// Edit the record with this id.
    Edit(RecordId),
}

/// Trimmed `raw`, or an error when nothing is left.
pub(crate) fn require_name(raw: &str, collection: Collection) -> Result<String, ValidationError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(ValidationError::EmptyName(collection));
    }
    Ok(name.to_string())
}

pub(crate) fn encode<T: Serialize>(value: &T) -> Result<Value, StoreError> {
    Ok(serde_json::to_value(value)?)
}

/// Top-level fields of `after` that differ from `before`.
///
/// Fields present before but missing after are sent as `null` so the store
/// removes them.
pub(crate) fn changed_fields(before: &Value, after: &Value) -> Patch {
    let empty = Patch::new();
    let before = before.as_object().unwrap_or(&empty);
    let after = after.as_object().unwrap_or(&empty);

    let mut patch: Patch = after
        .iter()
        .filter(|(key, value)| before.get(*key) != Some(*value))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    for key in before.keys() {
        if !after.contains_key(key) {
            patch.insert(key.clone(), Value::Null);
        }
    }
    patch
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use serde_json::json;

    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn names_are_trimmed_and_required() {
        assert_eq!(require_name("  Go ", Collection::Games), Ok("Go".to_string()));
        assert_eq!(
            require_name(" \t ", Collection::Platforms),
            Err(ValidationError::EmptyName(Collection::Platforms))
        );
    }

    #[test]
    fn diff_keeps_only_changed_fields() {
        let before = json!({ "name": "Chess", "platform": "PC", "location": { "name": "Shop" } });
        let after = json!({ "name": "Chess", "platform": "Switch" });
        let patch = changed_fields(&before, &after);
        assert_eq!(patch.len(), 2);
        assert_eq!(patch["platform"], json!("Switch"));
        assert_eq!(patch["location"], Value::Null);
        assert!(!patch.contains_key("name"));
    }

    #[tokio::test]
    async fn writes_report_affected_ids() -> Result<()> {
        let store = MemoryStore::new();
        let created = PendingWrite::Create {
            collection: Collection::Platforms,
            payload: json!({ "name": "PC" }),
        }
        .execute(&store)
        .await?;
        assert_eq!(created.op, WriteOp::Create);
        assert!(store.snapshot(Collection::Platforms).contains(&created.id));

        let deleted = PendingWrite::Delete {
            collection: Collection::Platforms,
            id: created.id.clone(),
        }
        .execute(&store)
        .await?;
        assert_eq!(deleted.id, created.id);
        assert!(store.snapshot(Collection::Platforms).is_empty());
        Ok(())
    }
}
