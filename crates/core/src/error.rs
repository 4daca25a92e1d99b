//! Error taxonomy shared by the store, form and service layers.

use std::{fmt, path::PathBuf};

use thiserror::Error;

use crate::{i18n::MessageKey, models::Collection};

/// Write operation that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOp {
    /// Record creation.
    Create,
    /// Field merge into an existing record.
    Update,
    /// Record removal.
    Delete,
}

impl fmt::Display for WriteOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        })
    }
}

/// Failures raised by a record store.
///
/// Transient and permanent failures are not distinguished; every write
/// failure is reported once and never retried.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A create, update or delete did not reach the store.
    #[error("{op} in {collection} failed: {reason}")]
    Write {
        /// Operation that failed.
        op: WriteOp,
        /// Target collection.
        collection: Collection,
        /// Transport or server message.
        reason: String,
    },
    /// The configured database URL cannot be used.
    #[error("invalid database url {url}: {reason}")]
    InvalidUrl {
        /// URL as configured.
        url: String,
        /// Parser message.
        reason: String,
    },
    /// A realtime stream could not be opened or read.
    #[error("stream for {collection} failed: {reason}")]
    Stream {
        /// Subscribed collection.
        collection: Collection,
        /// Transport or server message.
        reason: String,
    },
    /// The local catalog file could not be read or written.
    #[error("catalog file {}: {reason}", path.display())]
    Persist {
        /// File involved.
        path: PathBuf,
        /// I/O or parse message.
        reason: String,
    },
    /// A payload could not be turned into JSON.
    #[error("failed to encode record: {0}")]
    Encode(#[from] serde_json::Error),
}

impl StoreError {
    pub(crate) fn write(op: WriteOp, collection: Collection, reason: impl fmt::Display) -> Self {
        Self::Write {
            op,
            collection,
            reason: reason.to_string(),
        }
    }

    /// Message shown to the user for this failure.
    pub fn message_key(&self) -> MessageKey {
        match self {
            Self::Write {
                op: WriteOp::Delete,
                ..
            } => MessageKey::FailedToDelete,
            _ => MessageKey::FailedToSave,
        }
    }
}

/// Input rejected before any store call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Name is empty after trimming whitespace.
    #[error("a name is required for {0}")]
    EmptyName(Collection),
    /// A game was submitted without a platform.
    #[error("a platform must be selected")]
    MissingPlatform,
    /// Latitude or longitude is out of range.
    #[error("coordinates are out of range")]
    InvalidCoordinates,
}

/// Device capability a service needs permission for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Taking a photo.
    Camera,
    /// Reading the photo library.
    PhotoLibrary,
    /// Reading the current position.
    Location,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Camera => "camera",
            Self::PhotoLibrary => "photo library",
            Self::Location => "location",
        })
    }
}

/// The user (or platform) refused access to a device capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{capability} access was denied")]
pub struct PermissionDenied {
    /// Capability that was refused.
    pub capability: Capability,
}

impl PermissionDenied {
    /// Build a denial for `capability`.
    pub fn new(capability: Capability) -> Self {
        Self { capability }
    }

    /// Message shown to the user for this denial.
    pub fn message_key(&self) -> MessageKey {
        match self.capability {
            Capability::Camera => MessageKey::CameraPermissionRequired,
            Capability::PhotoLibrary => MessageKey::LibraryPermissionRequired,
            Capability::Location => MessageKey::LocationPermissionRequired,
        }
    }
}

/// Why a form submission did not complete.
#[derive(Debug, Error)]
pub enum FormError {
    /// Local validation failed; nothing was sent.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// The store rejected the write; form state was kept.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// A previous submission from this form has not resolved yet.
    #[error("a submission is already in progress")]
    InFlight,
}

impl FormError {
    /// Message shown to the user for this failure.
    pub fn message_key(&self) -> MessageKey {
        match self {
            Self::Validation(ValidationError::EmptyName(collection)) => match collection {
                Collection::Games => MessageKey::EnterGameName,
                Collection::Platforms => MessageKey::EnterPlatformName,
                Collection::Locations => MessageKey::EnterLocationName,
            },
            Self::Validation(ValidationError::MissingPlatform) => MessageKey::SelectPlatform,
            Self::Validation(ValidationError::InvalidCoordinates) => MessageKey::InvalidCoordinates,
            Self::Store(err) => err.message_key(),
            Self::InFlight => MessageKey::SaveInProgress,
        }
    }
}
