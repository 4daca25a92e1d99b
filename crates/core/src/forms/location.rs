//! Form for recording a purchase location.

use tracing::{info, warn};

use super::{encode, require_name, FormOutcome, Navigation, PendingWrite, WriteReceipt};
use crate::{
    error::{FormError, PermissionDenied, StoreError, ValidationError},
    models::{Collection, Coordinates, Location},
    services::Geolocator,
    store::RecordStore,
};

/// Editable state of the location form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocationForm {
    name: String,
    coordinates: Option<Coordinates>,
    submitting: bool,
}

impl LocationForm {
    /// Empty form.
    pub fn new() -> Self {
        Self::default()
    }

    /// Name as typed.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Chosen position.
    pub fn coordinates(&self) -> Option<Coordinates> {
        self.coordinates
    }

    /// Replace the name.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Set the position picked on a map or typed in. Checked on submit.
    pub fn set_coordinates(&mut self, coordinates: Coordinates) {
        self.coordinates = Some(coordinates);
    }

    /// Forget the position.
    pub fn clear_coordinates(&mut self) {
        self.coordinates = None;
    }

    /// Fill the position from the device.
    ///
    /// On denial the previous position is kept.
    pub async fn use_current_position<G: Geolocator>(
        &mut self,
        geolocator: &G,
    ) -> Result<Coordinates, PermissionDenied> {
        let position = geolocator.current_position().await?;
        self.coordinates = Some(position);
        Ok(position)
    }

    /// Whether a submission awaits [`LocationForm::complete`].
    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    /// Validate the form and produce the write to send.
    pub fn begin_submit(&mut self) -> Result<PendingWrite, FormError> {
        if self.submitting {
            return Err(FormError::InFlight);
        }
        let name = require_name(&self.name, Collection::Locations)?;
        if let Some(coordinates) = self.coordinates {
            if !coordinates.is_valid() {
                return Err(ValidationError::InvalidCoordinates.into());
            }
        }
        let payload = encode(&Location {
            name,
            coordinates: self.coordinates,
        })?;
        self.submitting = true;
        Ok(PendingWrite::Create {
            collection: Collection::Locations,
            payload,
        })
    }

    /// Apply the result of a write produced by [`LocationForm::begin_submit`].
    pub fn complete(&mut self, result: Result<WriteReceipt, StoreError>) -> Result<FormOutcome, FormError> {
        self.submitting = false;
        match result {
            Ok(receipt) => {
                info!(id = %receipt.id, "Location saved");
                *self = Self::new();
                Ok(FormOutcome {
                    id: receipt.id,
                    navigation: Navigation::Back,
                })
            }
            Err(err) => {
                warn!(%err, "Failed to save location");
                Err(err.into())
            }
        }
    }

    /// Validate, write and complete in one call.
    pub async fn submit<S: RecordStore>(&mut self, store: &S) -> Result<FormOutcome, FormError> {
        let write = self.begin_submit()?;
        let result = write.execute(store).await;
        self.complete(result)
    }
}
