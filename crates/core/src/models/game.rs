use serde::{Deserialize, Serialize};

use super::{Collection, Coordinates, Entity, Platform, Record};

/// A video game owned by the user.
///
/// `platform` is a copy of the platform's name rather than its identifier.
/// Renaming or deleting a platform leaves existing games untouched; use
/// [`resolve_platform`] to detect stale names at read time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Game {
    /// Display name; never empty once saved.
    pub name: String,
    /// Free-form description, empty when not provided.
    #[serde(default)]
    pub description: String,
    /// Name of the platform the game is tagged with.
    #[serde(default)]
    pub platform: String,
    /// URI of the attached photo, empty when none.
    #[serde(default)]
    pub image_url: String,
    /// Where the game was bought.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<GameLocation>,
}

impl Game {
    /// Description, if one was entered.
    pub fn description(&self) -> Option<&str> {
        non_empty(&self.description)
    }

    /// Platform name, if one was chosen.
    pub fn platform(&self) -> Option<&str> {
        non_empty(&self.platform)
    }

    /// Image URI, if one was attached.
    pub fn image_url(&self) -> Option<&str> {
        non_empty(&self.image_url)
    }
}

impl Entity for Game {
    const COLLECTION: Collection = Collection::Games;

    fn name(&self) -> &str {
        &self.name
    }
}

/// Purchase location embedded in a game record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GameLocation {
    /// Location name at the time it was chosen.
    pub name: String,
    /// Position, when the location had one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,
}

/// Outcome of resolving a game's platform name against the platform list.
#[derive(Debug, Clone, PartialEq)]
pub enum PlatformRef<'a> {
    /// The game has no platform.
    Unset,
    /// A platform with this name currently exists.
    Known(&'a Record<Platform>),
    /// The name no longer matches any platform (renamed or deleted).
    Orphaned(&'a str),
}

/// Resolve `game.platform` against the latest platform snapshot.
///
/// The first platform with an exactly equal name wins; platform names are
/// unique by convention only.
pub fn resolve_platform<'a>(game: &'a Game, platforms: &'a [Record<Platform>]) -> PlatformRef<'a> {
    let Some(name) = game.platform() else {
        return PlatformRef::Unset;
    };
    platforms
        .iter()
        .find(|platform| platform.data.name == name)
        .map(PlatformRef::Known)
        .unwrap_or(PlatformRef::Orphaned(name))
}

fn non_empty(value: &str) -> Option<&str> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_sparse_records() {
        let game: Game = serde_json::from_value(json!({ "name": "Go" })).unwrap();
        assert_eq!(game.name, "Go");
        assert_eq!(game.platform(), None);
        assert_eq!(game.image_url(), None);
        assert!(game.location.is_none());
    }

    #[test]
    fn encodes_wire_shape() {
        let game = Game {
            name: "Chess".to_string(),
            description: String::new(),
            platform: "Switch".to_string(),
            image_url: "file:///tmp/chess.png".to_string(),
            location: Some(GameLocation {
                name: "Market".to_string(),
                coordinates: None,
            }),
        };
        let value = serde_json::to_value(&game).unwrap();
        assert_eq!(value["imageUrl"], json!("file:///tmp/chess.png"));
        assert_eq!(value["location"], json!({ "name": "Market" }));
        assert_eq!(value["description"], json!(""));
    }

    #[test]
    fn resolves_platform_names() {
        let platforms = vec![Record::new("p1", Platform::new("Switch"))];
        let mut game = Game {
            name: "Zelda".to_string(),
            ..Game::default()
        };
        assert_eq!(resolve_platform(&game, &platforms), PlatformRef::Unset);

        game.platform = "Switch".to_string();
        assert!(matches!(
            resolve_platform(&game, &platforms),
            PlatformRef::Known(record) if record.id.as_str() == "p1"
        ));

        game.platform = "Wii U".to_string();
        assert_eq!(
            resolve_platform(&game, &platforms),
            PlatformRef::Orphaned("Wii U")
        );
    }
}
