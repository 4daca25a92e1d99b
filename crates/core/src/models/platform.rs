use serde::{Deserialize, Serialize};

use super::{Collection, Entity};

/// A gaming platform a game can be tagged with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Platform {
    /// Display name, unique by convention.
    pub name: String,
}

impl Platform {
    /// Build a platform payload.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Entity for Platform {
    const COLLECTION: Collection = Collection::Platforms;

    fn name(&self) -> &str {
        &self.name
    }
}
