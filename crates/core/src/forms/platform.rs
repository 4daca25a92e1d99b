//! Platform form, used both for quick adds and the management screen.

use tracing::{info, warn};

use super::{encode, require_name, FormOutcome, Navigation, PendingWrite, WriteReceipt};
use crate::{
    error::{FormError, StoreError},
    models::{Collection, Platform, Record},
    selection::DeletePrompt,
    store::RecordStore,
};

/// Editable state of the platform form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformForm {
    after_save: Navigation,
    name: String,
    submitting: bool,
}

impl PlatformForm {
    /// Form that leaves the screen after saving.
    pub fn add() -> Self {
        Self::with_navigation(Navigation::Back)
    }

    /// Form that stays open after saving so several platforms can be entered.
    pub fn manage() -> Self {
        Self::with_navigation(Navigation::Stay)
    }

    fn with_navigation(after_save: Navigation) -> Self {
        Self {
            after_save,
            name: String::new(),
            submitting: false,
        }
    }

    /// Name as typed.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Replace the name.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Whether a submission awaits [`PlatformForm::complete`].
    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    /// Validate the form and produce the write to send.
    pub fn begin_submit(&mut self) -> Result<PendingWrite, FormError> {
        if self.submitting {
            return Err(FormError::InFlight);
        }
        let platform = Platform::new(require_name(&self.name, Collection::Platforms)?);
        let payload = encode(&platform)?;
        self.submitting = true;
        Ok(PendingWrite::Create {
            collection: Collection::Platforms,
            payload,
        })
    }

    /// Apply the result of a write produced by [`PlatformForm::begin_submit`].
    pub fn complete(&mut self, result: Result<WriteReceipt, StoreError>) -> Result<FormOutcome, FormError> {
        self.submitting = false;
        match result {
            Ok(receipt) => {
                info!(id = %receipt.id, "Platform saved");
                self.name.clear();
                Ok(FormOutcome {
                    id: receipt.id,
                    navigation: self.after_save,
                })
            }
            Err(err) => {
                warn!(%err, "Failed to save platform");
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

    /// Ask for confirmation before removing `platform`.
    ///
    /// Games tagged with the platform keep its name.
    pub fn delete(&self, platform: &Record<Platform>) -> DeletePrompt {
        DeletePrompt::new(Collection::Platforms, platform.id.clone(), platform.data.name.clone())
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;

    use super::*;
    use crate::{i18n::MessageKey, selection::Decision, store::MemoryStore};

    fn platforms(store: &MemoryStore) -> Vec<Record<Platform>> {
        store.snapshot(Collection::Platforms).decode()
    }

    #[tokio::test]
    async fn add_mode_navigates_back() -> Result<()> {
        let store = MemoryStore::new();
        let mut form = PlatformForm::add();
        form.set_name(" Switch ");
        let outcome = form.submit(&store).await?;
        assert_eq!(outcome.navigation, Navigation::Back);
        assert_eq!(platforms(&store)[0].data.name, "Switch");
        Ok(())
    }

    #[tokio::test]
    async fn manage_mode_stays_and_clears() -> Result<()> {
        let store = MemoryStore::new();
        let mut form = PlatformForm::manage();
        form.set_name("PC");
        assert_eq!(form.submit(&store).await?.navigation, Navigation::Stay);
        assert_eq!(form.name(), "");

        form.set_name("PlayStation");
        form.submit(&store).await?;
        assert_eq!(platforms(&store).len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn blank_name_is_rejected() {
        let store = MemoryStore::new();
        let mut form = PlatformForm::manage();
        form.set_name("  ");
        let err = form.submit(&store).await.unwrap_err();
        assert_eq!(err.message_key(), MessageKey::EnterPlatformName);
        assert!(platforms(&store).is_empty());
    }

    #[tokio::test]
    async fn deletes_need_confirmation() -> Result<()> {
        let store = MemoryStore::new();
        let mut form = PlatformForm::manage();
        form.set_name("PC");
        form.submit(&store).await?;
        let pc = platforms(&store).remove(0);

        assert!(form.delete(&pc).resolve(Decision::Cancel).is_none());
        assert_eq!(platforms(&store).len(), 1);

        if let Some(write) = form.delete(&pc).resolve(Decision::Confirm) {
            write.execute(&store).await?;
        }
        assert!(platforms(&store).is_empty());
        Ok(())
    }
}
