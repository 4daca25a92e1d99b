//! Terminal stand-ins for the device services.

use std::path::PathBuf;

use gameshelf_core::{
    error::{Capability, PermissionDenied},
    models::Coordinates,
    services::{Geolocator, ImagePicker, ImageSource},
};
use reqwest::Url;
use tracing::{info, warn};

/// Picks an image from a path the user typed.
#[derive(Debug, Clone)]
pub struct TerminalImagePicker {
    path: String,
}

impl TerminalImagePicker {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

impl ImagePicker for TerminalImagePicker {
    async fn pick(&self, source: ImageSource) -> Result<Option<String>, PermissionDenied> {
        if source == ImageSource::Camera {
            return Err(PermissionDenied::new(Capability::Camera));
        }
        let raw = self.path.trim();
        if raw.is_empty() {
            return Ok(None);
        }
        let path = match tokio::fs::canonicalize(PathBuf::from(raw)).await {
            Ok(path) => path,
            Err(err) => {
                warn!(path = raw, %err, "Image file not found");
                return Ok(None);
            }
        };
        match tokio::fs::metadata(&path).await {
            Ok(metadata) if metadata.is_file() => {}
            _ => {
                warn!(path = %path.display(), "Image path is not a file");
                return Ok(None);
            }
        }
        match Url::from_file_path(&path) {
            Ok(url) => {
                info!(%url, "Image picked");
                Ok(Some(url.to_string()))
            }
            Err(()) => {
                warn!(path = %path.display(), "Image path cannot be expressed as a URI");
                Ok(None)
            }
        }
    }
}

/// Answers location requests from the configured position.
#[derive(Debug, Clone, Copy)]
pub struct ConfiguredGeolocator {
    position: Option<Coordinates>,
}

impl ConfiguredGeolocator {
    pub fn new(position: Option<Coordinates>) -> Self {
        Self { position }
    }
}

impl Geolocator for ConfiguredGeolocator {
    async fn current_position(&self) -> Result<Coordinates, PermissionDenied> {
        self.position
            .ok_or(PermissionDenied::new(Capability::Location))
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::*;

    #[tokio::test]
    async fn existing_files_become_file_uris() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("cover.png");
        fs::write(&path, b"png")?;

        let picker = TerminalImagePicker::new(path.to_string_lossy());
        let uri = picker.pick(ImageSource::Library).await?;
        assert!(uri.is_some_and(|uri| uri.starts_with("file://") && uri.ends_with("cover.png")));
        Ok(())
    }

    #[tokio::test]
    async fn blank_or_missing_paths_cancel() -> anyhow::Result<()> {
        assert_eq!(TerminalImagePicker::new("  ").pick(ImageSource::Library).await?, None);
        let dir = tempdir()?;
        let missing = dir.path().join("nope.png");
        let picker = TerminalImagePicker::new(missing.to_string_lossy());
        assert_eq!(picker.pick(ImageSource::Library).await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn camera_and_unset_position_are_denied() {
        let denied = TerminalImagePicker::new("x").pick(ImageSource::Camera).await;
        assert_eq!(denied, Err(PermissionDenied::new(Capability::Camera)));

        let geolocator = ConfiguredGeolocator::new(None);
        assert!(geolocator.current_position().await.is_err());
        let here = Coordinates::new(60.0, 25.0);
        assert_eq!(ConfiguredGeolocator::new(Some(here)).current_position().await, Ok(here));
    }
}
