//! Shared domain models.
//!
//! Every persisted entity is stored under a [`Collection`] and addressed by a
//! store-assigned [`RecordId`]. The typed payloads mirror the wire shapes of
//! the hosted database exactly, so records written by older clients decode
//! without migration.

mod game;
mod location;
mod platform;

use std::fmt;

use serde::{de::DeserializeOwned, Deserialize, Serialize};

pub use game::{resolve_platform, Game, GameLocation, PlatformRef};
pub use location::{Coordinates, Location};
pub use platform::Platform;

/// Opaque identifier assigned by the store when a record is created.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Wrap an identifier received from the store.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// The three independent record sets kept by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    /// Owned video games.
    Games,
    /// Platforms a game can be tagged with.
    Platforms,
    /// Purchase locations.
    Locations,
}

impl Collection {
    /// All collections, in wire order.
    pub const ALL: [Collection; 3] = [Self::Games, Self::Platforms, Self::Locations];

    /// Name of the collection node in the database tree.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Games => "games",
            Self::Platforms => "platforms",
            Self::Locations => "locations",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded record together with its identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct Record<T> {
    /// Store-assigned identifier.
    pub id: RecordId,
    /// Decoded payload.
    pub data: T,
}

impl<T> Record<T> {
    /// Pair a payload with its identifier.
    pub fn new(id: impl Into<RecordId>, data: T) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }
}

/// A typed record kind living in one collection.
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Collection the entity is stored under.
    const COLLECTION: Collection;

    /// Display name used for listing and searching.
    fn name(&self) -> &str;
}
