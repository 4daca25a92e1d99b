//! User-visible strings and the language setting.
//!
//! The active language is explicit configuration: components receive a
//! [`Strings`] table (or a [`LanguageSettings`] handle) when they are built
//! and re-derive their text when a change is broadcast.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::info;

/// Supported display languages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// English.
    #[default]
    En,
    /// Finnish.
    Fi,
}

impl Language {
    /// Every supported language, in picker order.
    pub const ALL: [Language; 2] = [Self::Fi, Self::En];

    /// Key naming the language in the UI.
    pub fn label_key(self) -> MessageKey {
        match self {
            Self::En => MessageKey::English,
            Self::Fi => MessageKey::Finnish,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::En => "en",
            Self::Fi => "fi",
        })
    }
}

/// Identifier of a user-visible string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum MessageKey {
    // Validation and failures
    EnterGameName,
    EnterPlatformName,
    EnterLocationName,
    SelectPlatform,
    InvalidCoordinates,
    FailedToSave,
    FailedToDelete,
    SaveInProgress,
    CameraPermissionRequired,
    LibraryPermissionRequired,
    LocationPermissionRequired,
    ImageNotFound,
    // Confirmation
    DeleteGame,
    DeletePlatform,
    DeleteLocation,
    DeleteConfirmation,
    Cancel,
    Delete,
    Saved,
    Deleted,
    // Screen titles
    MyGameCollection,
    NoGames,
    AddGameTitle,
    EditGameTitle,
    ManagePlatformsTitle,
    AddPlatformTitle,
    AddLocationTitle,
    SelectPlatformTitle,
    SelectLocationTitle,
    SettingsTitle,
    // Fields
    GameName,
    GameDescription,
    Platform,
    NoPlatform,
    UnknownPlatform,
    Location,
    NoLocation,
    Image,
    NoImage,
    ImagePathPrompt,
    PlatformName,
    LocationName,
    Latitude,
    Longitude,
    Search,
    // Settings
    LanguageLabel,
    English,
    Finnish,
    // Key hints
    HelpHome,
    HelpForm,
    HelpList,
    HelpManage,
    HelpPlatformForm,
    HelpLocationForm,
    HelpSettings,
}

/// String table for one language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Strings {
    language: Language,
}

impl Strings {
    /// Table for `language`.
    pub fn new(language: Language) -> Self {
        Self { language }
    }

    /// Language this table renders.
    pub fn language(&self) -> Language {
        self.language
    }

    /// Display text for `key`.
    pub fn get(&self, key: MessageKey) -> &'static str {
        let (en, fi) = translations(key);
        match self.language {
            Language::En => en,
            Language::Fi => fi,
        }
    }
}

fn translations(key: MessageKey) -> (&'static str, &'static str) {
    use MessageKey::*;
    match key {
        EnterGameName => ("Please enter a game name.", "Anna pelin nimi."),
        EnterPlatformName => ("Please enter a platform name.", "Anna alustan nimi."),
        EnterLocationName => ("Please enter a location name.", "Anna paikan nimi."),
        SelectPlatform => ("Please select a platform.", "Valitse alusta."),
        InvalidCoordinates => (
            "Coordinates are out of range.",
            "Koordinaatit ovat sallitun alueen ulkopuolella.",
        ),
        FailedToSave => (
            "Failed to save. Please try again.",
            "Tallennus epäonnistui. Yritä uudelleen.",
        ),
        FailedToDelete => (
            "Failed to delete. Please try again.",
            "Poisto epäonnistui. Yritä uudelleen.",
        ),
        SaveInProgress => ("Saving, please wait.", "Tallennetaan, odota hetki."),
        CameraPermissionRequired => (
            "Camera access is required to take a photo.",
            "Kuvan ottamiseen tarvitaan kameran käyttöoikeus.",
        ),
        LibraryPermissionRequired => (
            "Photo library access is required to pick an image.",
            "Kuvan valintaan tarvitaan kuvakirjaston käyttöoikeus.",
        ),
        LocationPermissionRequired => (
            "Location access is required to use your current position.",
            "Nykyisen sijainnin käyttöön tarvitaan sijaintilupa.",
        ),
        DeleteGame => ("Delete Game", "Poista peli"),
        DeletePlatform => ("Delete Platform", "Poista alusta"),
        DeleteLocation => ("Delete Location", "Poista paikka"),
        DeleteConfirmation => (
            "Are you sure you want to delete this item?",
            "Haluatko varmasti poistaa tämän?",
        ),
        ImageNotFound => ("Image file not found.", "Kuvatiedostoa ei löytynyt."),
        Cancel => ("Cancel", "Peruuta"),
        Delete => ("Delete", "Poista"),
        Saved => ("Saved", "Tallennettu"),
        Deleted => ("Deleted", "Poistettu"),
        MyGameCollection => ("My Game Collection", "Pelikokoelmani"),
        NoGames => ("No games yet. Press a to add one.", "Ei vielä pelejä. Lisää peli painamalla a."),
        AddGameTitle => ("Add a New Game", "Lisää uusi peli"),
        EditGameTitle => ("Edit Game", "Muokkaa peliä"),
        ManagePlatformsTitle => ("Platforms", "Alustat"),
        AddPlatformTitle => ("Add a New Platform", "Lisää uusi alusta"),
        AddLocationTitle => ("Add a New Location", "Lisää uusi paikka"),
        SelectPlatformTitle => ("Select a Platform", "Valitse alusta"),
        SelectLocationTitle => ("Select a Location", "Valitse paikka"),
        SettingsTitle => ("Settings", "Asetukset"),
        GameName => ("Game name", "Pelin nimi"),
        GameDescription => ("Game description", "Pelin kuvaus"),
        Platform => ("Platform", "Alusta"),
        NoPlatform => ("Add platform to game", "Lisää alusta peliin"),
        UnknownPlatform => ("no longer in platform list", "ei enää alustalistassa"),
        Location => ("Location", "Paikka"),
        NoLocation => ("No purchase location", "Ei ostopaikkaa"),
        Image => ("Image", "Kuva"),
        NoImage => ("No image", "Ei kuvaa"),
        ImagePathPrompt => ("Path to image file", "Kuvatiedoston polku"),
        PlatformName => ("Platform name", "Alustan nimi"),
        LocationName => ("Location name", "Paikan nimi"),
        Latitude => ("Latitude", "Leveysaste"),
        Longitude => ("Longitude", "Pituusaste"),
        Search => ("Search", "Haku"),
        LanguageLabel => ("Language", "Kieli"),
        English => ("English", "englanti"),
        Finnish => ("Finnish", "suomi"),
        HelpHome => (
            "Enter details  / search  a add  e edit  d delete  p platforms  l location  s settings  q quit",
            "Enter tiedot  / haku  a lisää  e muokkaa  d poista  p alustat  l paikka  s asetukset  q lopeta",
        ),
        HelpForm => (
            "Tab next field  Ctrl-P platform  Ctrl-L location  Ctrl-X clear location  Ctrl-O image file  Ctrl-T camera  Ctrl-S save  Esc back",
            "Tab seuraava  Ctrl-P alusta  Ctrl-L paikka  Ctrl-X poista paikka  Ctrl-O kuvatiedosto  Ctrl-T kamera  Ctrl-S tallenna  Esc takaisin",
        ),
        HelpList => (
            "Up/Down move  Enter select  a add new  Esc back",
            "Ylös/Alas siirry  Enter valitse  a lisää uusi  Esc takaisin",
        ),
        HelpManage => (
            "Type a name, Enter save  Ctrl-D delete selected  Up/Down move  Esc back",
            "Kirjoita nimi, Enter tallenna  Ctrl-D poista valittu  Ylös/Alas siirry  Esc takaisin",
        ),
        HelpPlatformForm => ("Enter save  Esc back", "Enter tallenna  Esc takaisin"),
        HelpLocationForm => (
            "Tab next field  Ctrl-G current location  Enter save  Esc back",
            "Tab seuraava  Ctrl-G nykyinen sijainti  Enter tallenna  Esc takaisin",
        ),
        HelpSettings => (
            "Up/Down choose  Enter confirm  Esc back",
            "Ylös/Alas valitse  Enter vahvista  Esc takaisin",
        ),
    }
}

/// Shared language setting with change notification.
#[derive(Debug, Clone)]
pub struct LanguageSettings {
    sender: Arc<watch::Sender<Language>>,
}

impl LanguageSettings {
    /// Start with `initial` as the confirmed language.
    pub fn new(initial: Language) -> Self {
        let (sender, _receiver) = watch::channel(initial);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Confirmed language.
    pub fn current(&self) -> Language {
        *self.sender.borrow()
    }

    /// String table for the confirmed language.
    pub fn strings(&self) -> Strings {
        Strings::new(self.current())
    }

    /// Receiver notified whenever the language changes.
    pub fn subscribe(&self) -> watch::Receiver<Language> {
        self.sender.subscribe()
    }

    /// Switch to `language`. Returns whether anything changed.
    pub fn set(&self, language: Language) -> bool {
        let changed = self.sender.send_if_modified(|current| {
            if *current == language {
                return false;
            }
            *current = language;
            true
        });
        if changed {
            info!(%language, "Language changed");
        }
        changed
    }
}

/// Tentative language selection that only takes effect on confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguagePicker {
    confirmed: Language,
    pending: Language,
}

impl LanguagePicker {
    /// Picker starting at the currently confirmed language.
    pub fn new(current: Language) -> Self {
        Self {
            confirmed: current,
            pending: current,
        }
    }

    /// Tentatively choose `language`.
    pub fn select(&mut self, language: Language) {
        self.pending = language;
    }

    /// Move the tentative choice by `delta` positions in [`Language::ALL`].
    pub fn step(&mut self, delta: isize) {
        let len = Language::ALL.len() as isize;
        let index = Language::ALL
            .iter()
            .position(|language| *language == self.pending)
            .unwrap_or(0) as isize;
        let next = (index + delta).clamp(0, len - 1) as usize;
        self.pending = Language::ALL[next];
    }

    /// Tentative choice.
    pub fn pending(&self) -> Language {
        self.pending
    }

    /// Last confirmed choice.
    pub fn confirmed(&self) -> Language {
        self.confirmed
    }

    /// Apply the tentative choice to `settings`.
    pub fn confirm(&mut self, settings: &LanguageSettings) -> bool {
        self.confirmed = self.pending;
        settings.set(self.pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strings_follow_language() {
        assert_eq!(Strings::new(Language::En).get(MessageKey::Cancel), "Cancel");
        assert_eq!(Strings::new(Language::Fi).get(MessageKey::Cancel), "Peruuta");
    }

    #[test]
    fn settings_notify_only_on_change() {
        let settings = LanguageSettings::new(Language::En);
        let mut receiver = settings.subscribe();
        assert!(!settings.set(Language::En));
        assert!(!receiver.has_changed().unwrap());

        assert!(settings.set(Language::Fi));
        assert!(receiver.has_changed().unwrap());
        assert_eq!(*receiver.borrow_and_update(), Language::Fi);
        assert_eq!(settings.strings().language(), Language::Fi);
    }

    #[test]
    fn picker_applies_only_on_confirm() {
        let settings = LanguageSettings::new(Language::En);
        let mut picker = LanguagePicker::new(settings.current());
        picker.select(Language::Fi);
        assert_eq!(settings.current(), Language::En);
        assert_eq!(picker.confirmed(), Language::En);

        assert!(picker.confirm(&settings));
        assert_eq!(settings.current(), Language::Fi);
    }

    #[test]
    fn picker_steps_within_bounds() {
        let mut picker = LanguagePicker::new(Language::Fi);
        picker.step(-1);
        assert_eq!(picker.pending(), Language::Fi);
        picker.step(1);
        assert_eq!(picker.pending(), Language::En);
        picker.step(5);
        assert_eq!(picker.pending(), Language::En);
    }

    #[test]
    fn language_parses_from_config_values() {
        let language: Language = serde_json::from_str("\"fi\"").unwrap();
        assert_eq!(language, Language::Fi);
    }
}
