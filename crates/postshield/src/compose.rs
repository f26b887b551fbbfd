//! Post composition.
//!
//! Turns what a user entered (description, uploaded image URL, the point
//! they picked, an optional crime level) into a stored [`Post`], with the
//! location text supplied by reverse geocoding.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::post::{CrimeLevel, Post};

/// Location text used when no place could be resolved.
pub const UNKNOWN_LOCATION: &str = "Unknown Location";

const UNKNOWN_CITY: &str = "Unknown City";
const UNKNOWN_COUNTRY: &str = "Unknown Country";
const NO_ADDRESS: &str = "No address available";

/// A reverse-geocoded place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeocodedPlace {
    /// City name.
    pub city: String,
    /// Country name.
    pub country: String,
    /// Full display address.
    pub display_address: String,
}

impl Default for GeocodedPlace {
    fn default() -> Self {
        Self {
            city: UNKNOWN_CITY.to_string(),
            country: UNKNOWN_COUNTRY.to_string(),
            display_address: NO_ADDRESS.to_string(),
        }
    }
}

impl GeocodedPlace {
    /// Build a place from whichever parts are known.
    #[must_use]
    pub fn from_parts(
        city: Option<String>,
        country: Option<String>,
        display_address: Option<String>,
    ) -> Self {
        let defaults = Self::default();
        Self {
            city: city.unwrap_or(defaults.city),
            country: country.unwrap_or(defaults.country),
            display_address: display_address.unwrap_or(defaults.display_address),
        }
    }

    /// Parse a Nominatim `reverse?format=jsonv2` response body.
    ///
    /// Missing fields fall back to the unknown placeholders; a body that is
    /// not a JSON object is rejected.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is not valid JSON or not an object.
    pub fn from_nominatim(body: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(body)?;
        if !value.is_object() {
            return Err(Error::internal("reverse geocoding response is not an object"));
        }

        let text = |v: Option<&Value>| {
            v.and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(String::from)
        };
        let address = value.get("address");

        Ok(Self::from_parts(
            text(address.and_then(|a| a.get("city"))),
            text(address.and_then(|a| a.get("country"))),
            text(value.get("display_name")),
        ))
    }

    /// City and country for a heading.
    #[must_use]
    pub fn headline(&self) -> String {
        format!("{}, {}", self.city, self.country)
    }
}

/// Resolves coordinates to a place.
#[async_trait::async_trait]
pub trait ReverseGeocoder: Send + Sync {
    /// Look up the place at a point.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails.
    async fn reverse(&self, latitude: f64, longitude: f64) -> Result<GeocodedPlace>;
}

/// A geocoder that answers every lookup with the same place.
#[derive(Debug, Clone, Default)]
pub struct StaticGeocoder {
    place: GeocodedPlace,
}

impl StaticGeocoder {
    /// Always resolve to `place`.
    #[must_use]
    pub fn new(place: GeocodedPlace) -> Self {
        Self { place }
    }
}

#[async_trait::async_trait]
impl ReverseGeocoder for StaticGeocoder {
    async fn reverse(&self, _latitude: f64, _longitude: f64) -> Result<GeocodedPlace> {
        Ok(self.place.clone())
    }
}

/// A post as entered, before it is accepted.
#[derive(Debug, Clone, PartialEq)]
pub struct PostDraft {
    /// Free-text description.
    pub description: String,
    /// URL of the uploaded image.
    pub image_ref: String,
    /// Picked latitude.
    pub latitude: f64,
    /// Picked longitude.
    pub longitude: f64,
    /// Optional crime level.
    pub crime_level: Option<CrimeLevel>,
}

impl PostDraft {
    /// Check that every required field is present and coordinates are sane.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDraft`] naming the first failing field.
    pub fn validate(&self) -> Result<()> {
        if self.description.trim().is_empty() {
            return Err(Error::invalid_draft("description is required"));
        }
        if self.image_ref.trim().is_empty() {
            return Err(Error::invalid_draft("image is required"));
        }
        if !self.latitude.is_finite() || !(-90.0..=90.0).contains(&self.latitude) {
            return Err(Error::invalid_draft(format!(
                "latitude out of range: {}",
                self.latitude
            )));
        }
        if !self.longitude.is_finite() || !(-180.0..=180.0).contains(&self.longitude) {
            return Err(Error::invalid_draft(format!(
                "longitude out of range: {}",
                self.longitude
            )));
        }
        Ok(())
    }

    /// Validate and convert into a stored post.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDraft`] if validation fails.
    pub fn into_post(self, place: Option<&GeocodedPlace>) -> Result<Post> {
        self.validate()?;
        let location = place
            .map(|p| p.display_address.trim())
            .filter(|s| !s.is_empty())
            .unwrap_or(UNKNOWN_LOCATION);
        Ok(Post::new(
            location,
            self.description,
            self.image_ref,
            self.latitude,
            self.longitude,
            self.crime_level,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> PostDraft {
        PostDraft {
            description: "Broken street lights".to_string(),
            image_ref: "https://img.example/1.jpg".to_string(),
            latitude: 48.8566,
            longitude: 2.3522,
            crime_level: Some(CrimeLevel::Medium),
        }
    }

    #[test]
    fn test_place_defaults() {
        let place = GeocodedPlace::default();
        assert_eq!(place.city, "Unknown City");
        assert_eq!(place.country, "Unknown Country");
        assert_eq!(place.display_address, "No address available");
        assert_eq!(place.headline(), "Unknown City, Unknown Country");
    }

    #[test]
    fn test_from_nominatim_full() {
        let body = r#"{
            "display_name": "Rue de Rivoli, Paris, France",
            "address": { "city": "Paris", "country": "France" }
        }"#;
        let place = GeocodedPlace::from_nominatim(body).unwrap();
        assert_eq!(place.city, "Paris");
        assert_eq!(place.country, "France");
        assert_eq!(place.display_address, "Rue de Rivoli, Paris, France");
    }

    #[test]
    fn test_from_nominatim_missing_fields() {
        let place = GeocodedPlace::from_nominatim(r#"{"address": {"town": "Smallville"}}"#).unwrap();
        assert_eq!(place, GeocodedPlace::default());
    }

    #[test]
    fn test_from_nominatim_rejects_non_object() {
        assert!(GeocodedPlace::from_nominatim("[1, 2]").is_err());
        assert!(matches!(
            GeocodedPlace::from_nominatim("nope"),
            Err(Error::Json(_))
        ));
    }

    #[tokio::test]
    async fn test_static_geocoder() {
        let place = GeocodedPlace::from_parts(Some("Oslo".to_string()), None, None);
        let geocoder = StaticGeocoder::new(place.clone());
        assert_eq!(geocoder.reverse(59.9, 10.7).await.unwrap(), place);
    }

    #[test]
    fn test_valid_draft() {
        assert!(draft().validate().is_ok());
    }

    #[test]
    fn test_draft_requires_description_and_image() {
        let mut d = draft();
        d.description = "  ".to_string();
        assert!(d.validate().unwrap_err().to_string().contains("description"));

        let mut d = draft();
        d.image_ref = String::new();
        assert!(d.validate().unwrap_err().to_string().contains("image"));
    }

    #[test]
    fn test_draft_rejects_bad_coordinates() {
        let mut d = draft();
        d.latitude = 91.0;
        assert!(d.validate().is_err());

        let mut d = draft();
        d.longitude = f64::NAN;
        assert!(d.validate().is_err());
    }

    #[test]
    fn test_into_post_uses_display_address() {
        let place = GeocodedPlace::from_parts(None, None, Some("1 Main St".to_string()));
        let post = draft().into_post(Some(&place)).unwrap();
        assert_eq!(post.location, "1 Main St");
        assert_eq!(post.crime_level(), Some(CrimeLevel::Medium));
        assert_eq!(post.image_ref, "https://img.example/1.jpg");
    }

    #[test]
    fn test_into_post_without_place() {
        let post = draft().into_post(None).unwrap();
        assert_eq!(post.location, UNKNOWN_LOCATION);
    }

    #[test]
    fn test_into_post_rejects_invalid_draft() {
        let mut d = draft();
        d.description.clear();
        assert!(d.into_post(None).is_err());
    }
}
