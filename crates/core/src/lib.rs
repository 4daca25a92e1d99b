#![warn(clippy::all, missing_docs)]

//! Core of the Gameshelf catalog.
//!
//! This crate hosts the data models, the record store client (a realtime
//! database backend and a local file backend), live collection views, form
//! controllers, selection state, localisation and configuration used by the
//! terminal UI and any future frontends.

pub mod config;
pub mod error;
pub mod filter;
pub mod forms;
pub mod i18n;
pub mod models;
pub mod selection;
pub mod services;
pub mod store;
pub mod view;

pub use config::{AppConfig, ColorScheme};
pub use error::{FormError, PermissionDenied, StoreError, ValidationError};
pub use models::{Collection, Coordinates, Game, Location, Platform, Record, RecordId};
pub use store::{FirebaseStore, MemoryStore, RecordStore, Snapshot, Subscription};
pub use view::CollectionView;
