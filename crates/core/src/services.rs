//! Device services the forms depend on.
//!
//! Both are traits so the front-end can supply its own implementation and
//! tests can script outcomes.

use std::future::Future;

use crate::{error::PermissionDenied, models::Coordinates};

/// Where an image should come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSource {
    /// Existing photo from the library.
    Library,
    /// Fresh photo from the camera.
    Camera,
}

/// Lets the user choose or capture an image.
pub trait ImagePicker: Send + Sync {
    /// Ask the user for an image.
    ///
    /// `Ok(None)` means the user cancelled. A returned URI is stored
    /// verbatim in the game record.
    fn pick(
        &self,
        source: ImageSource,
    ) -> impl Future<Output = Result<Option<String>, PermissionDenied>> + Send;
}

/// Reports the device position.
pub trait Geolocator: Send + Sync {
    /// Current position of the device.
    fn current_position(&self) -> impl Future<Output = Result<Coordinates, PermissionDenied>> + Send;
}
