use serde::{Deserialize, Serialize};

use super::{Collection, Entity};

/// Geographic position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    /// Latitude, -90..=90.
    pub latitude: f64,
    /// Longitude, -180..=180.
    pub longitude: f64,
}

impl Coordinates {
    /// Build a coordinate pair without validating it.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Whether both components are finite and within range.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// A place where games are bought.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Display name.
    pub name: String,
    /// Position, `null` on the wire when unknown.
    #[serde(default)]
    pub coordinates: Option<Coordinates>,
}

impl Entity for Location {
    const COLLECTION: Collection = Collection::Locations;

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn absent_coordinates_encode_as_null() {
        let location = Location {
            name: "Corner shop".to_string(),
            coordinates: None,
        };
        let value = serde_json::to_value(&location).unwrap();
        assert_eq!(value, json!({ "name": "Corner shop", "coordinates": null }));

        let decoded: Location = serde_json::from_value(json!({ "name": "Corner shop" })).unwrap();
        assert_eq!(decoded, location);
    }

    #[test]
    fn validates_ranges() {
        assert!(Coordinates::new(60.1698, 24.9381).is_valid());
        assert!(Coordinates::new(-90.0, 180.0).is_valid());
        assert!(!Coordinates::new(91.0, 0.0).is_valid());
        assert!(!Coordinates::new(0.0, -181.0).is_valid());
        assert!(!Coordinates::new(f64::NAN, 0.0).is_valid());
    }
}
