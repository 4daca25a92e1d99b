//! Add and edit form for games.

use tracing::{info, warn};

use super::{changed_fields, encode, require_name, FormMode, FormOutcome, Navigation, PendingWrite, WriteReceipt};
use crate::{
    error::{FormError, PermissionDenied, StoreError, ValidationError},
    models::{Collection, Game, GameLocation, Location, Record},
    services::{ImagePicker, ImageSource},
    store::RecordStore,
};

const REQUIRED_FIELDS: [&str; 2] = ["name", "platform"];

/// Editable state of the game form.
#[derive(Debug, Clone, PartialEq)]
pub struct GameForm {
    mode: FormMode,
    baseline: Game,
    name: String,
    description: String,
    platform: Option<String>,
    image_url: Option<String>,
    location: Option<GameLocation>,
    submitted: Option<Game>,
}

impl GameForm {
    /// Empty form for a new game.
    pub fn add() -> Self {
        Self::from_game(FormMode::Add, Game::default())
    }

    /// Form prefilled from an existing game.
    pub fn edit(record: &Record<Game>) -> Self {
        Self::from_game(FormMode::Edit(record.id.clone()), record.data.clone())
    }

    fn from_game(mode: FormMode, game: Game) -> Self {
        Self {
            mode,
            name: game.name.clone(),
            description: game.description.clone(),
            platform: game.platform().map(str::to_string),
            image_url: game.image_url().map(str::to_string),
            location: game.location.clone(),
            baseline: game,
            submitted: None,
        }
    }

    /// Add or edit.
    pub fn mode(&self) -> &FormMode {
        &self.mode
    }

    /// Name as typed.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Description as typed.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Chosen platform name.
    pub fn platform(&self) -> Option<&str> {
        self.platform.as_deref()
    }

    /// Attached image URI.
    pub fn image_url(&self) -> Option<&str> {
        self.image_url.as_deref()
    }

    /// Embedded purchase location.
    pub fn location(&self) -> Option<&GameLocation> {
        self.location.as_ref()
    }

    /// Replace the name.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Replace the description.
    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }

    /// Tag the game with a platform name.
    pub fn choose_platform(&mut self, name: impl Into<String>) {
        self.platform = Some(name.into());
    }

    /// Embed a copy of `location` in the game.
    pub fn choose_location(&mut self, location: &Record<Location>) {
        self.location = Some(GameLocation {
            name: location.data.name.clone(),
            coordinates: location.data.coordinates,
        });
    }

    /// Remove the purchase location.
    pub fn clear_location(&mut self) {
        self.location = None;
    }

    /// Ask `picker` for an image.
    ///
    /// Returns whether an image was attached. A cancelled pick leaves the
    /// form unchanged.
    pub async fn attach_image<P: ImagePicker>(
        &mut self,
        picker: &P,
        source: ImageSource,
    ) -> Result<bool, PermissionDenied> {
        match picker.pick(source).await? {
            Some(uri) => {
                self.image_url = Some(uri);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Store `uri` as the attached image.
    pub fn set_image(&mut self, uri: impl Into<String>) {
        self.image_url = Some(uri.into());
    }

    /// Whether a submission awaits [`GameForm::complete`].
    pub fn is_submitting(&self) -> bool {
        self.submitted.is_some()
    }

    /// Validate the form and produce the write to send.
    pub fn begin_submit(&mut self) -> Result<PendingWrite, FormError> {
        if self.is_submitting() {
            return Err(FormError::InFlight);
        }
        let game = self.validated()?;
        let payload = encode(&game)?;
        let write = match &self.mode {
            FormMode::Add => PendingWrite::Create {
                collection: Collection::Games,
                payload,
            },
            FormMode::Edit(id) => {
                let mut patch = changed_fields(&encode(&self.baseline)?, &payload);
                // Required fields always travel, so an update that lands after
                // a concurrent delete still writes a complete game.
                for key in REQUIRED_FIELDS {
                    if let Some(value) = payload.get(key) {
                        patch.insert(key.to_string(), value.clone());
                    }
                }
                PendingWrite::Update {
                    collection: Collection::Games,
                    id: id.clone(),
                    patch,
                }
            }
        };
        self.submitted = Some(game);
        Ok(write)
    }

    /// Apply the result of a write produced by [`GameForm::begin_submit`].
    ///
    /// A failed write keeps everything the user entered.
    pub fn complete(&mut self, result: Result<WriteReceipt, StoreError>) -> Result<FormOutcome, FormError> {
        let submitted = self.submitted.take();
        match result {
            Ok(receipt) => {
                info!(id = %receipt.id, op = %receipt.op, "Game saved");
                let next = match (&self.mode, submitted) {
                    (FormMode::Add, _) => Some(Self::add()),
                    (FormMode::Edit(_), Some(game)) => Some(Self::from_game(self.mode.clone(), game)),
                    (FormMode::Edit(_), None) => None,
                };
                if let Some(next) = next {
                    *self = next;
                }
                Ok(FormOutcome {
                    id: receipt.id,
                    navigation: Navigation::Back,
                })
            }
            Err(err) => {
                warn!(%err, "Failed to save game");
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

    fn validated(&self) -> Result<Game, ValidationError> {
        let name = require_name(&self.name, Collection::Games)?;
        let platform = self
            .platform
            .as_deref()
            .map(str::trim)
            .filter(|platform| !platform.is_empty())
            .ok_or(ValidationError::MissingPlatform)?;
        Ok(Game {
            name,
            description: self.description.trim().to_string(),
            platform: platform.to_string(),
            image_url: self.image_url.clone().unwrap_or_default(),
            location: self.location.clone(),
        })
    }
}
