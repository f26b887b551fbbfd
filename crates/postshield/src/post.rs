//! Core post types for postshield.
//!
//! This module defines the user and post records held by a post store, the
//! three-point crime level scale, and the derived per-location result.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A subjective three-point severity attached to a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrimeLevel {
    /// Little or no perceived crime.
    Low,
    /// Some perceived crime.
    Medium,
    /// Serious perceived crime.
    High,
}

impl CrimeLevel {
    /// All levels, lowest first.
    pub const ALL: [Self; 3] = [Self::Low, Self::Medium, Self::High];

    /// Numeric weight used by the aggregator.
    #[must_use]
    pub fn weight(self) -> u32 {
        match self {
            Self::Low => 1,
            Self::Medium => 2,
            Self::High => 3,
        }
    }

    /// The stored label for this level.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for CrimeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string is not one of the crime level labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCrimeLevel(pub String);

impl fmt::Display for UnknownCrimeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown crime level '{}'", self.0)
    }
}

impl std::error::Error for UnknownCrimeLevel {}

impl FromStr for CrimeLevel {
    type Err = UnknownCrimeLevel;

    /// Labels are matched exactly; stored data only ever uses lowercase.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(UnknownCrimeLevel(other.to_string())),
        }
    }
}

/// A single geotagged contribution, embedded in its owner's record.
///
/// `crime_level` keeps the raw stored string: early posts have none, and
/// anything outside the three labels must be carried through untouched.
///
/// Deserialization never rejects a post over its coordinates or label. A
/// missing or non-numeric coordinate becomes NaN, which matches no query,
/// and a non-string label is dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    /// Display address for where the post was made.
    #[serde(default)]
    pub location: String,

    /// Free-text description.
    #[serde(default)]
    pub description: String,

    /// URL of the uploaded image.
    #[serde(rename = "imageUrl", default)]
    pub image_ref: String,

    /// Latitude in degrees.
    #[serde(default = "missing_coordinate", deserialize_with = "lenient_coordinate")]
    pub latitude: f64,

    /// Longitude in degrees.
    #[serde(default = "missing_coordinate", deserialize_with = "lenient_coordinate")]
    pub longitude: f64,

    /// Raw crime level label, if any.
    #[serde(
        default,
        deserialize_with = "lenient_label",
        skip_serializing_if = "Option::is_none"
    )]
    pub crime_level: Option<String>,
}

fn missing_coordinate() -> f64 {
    f64::NAN
}

fn lenient_coordinate<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    Ok(Value::deserialize(deserializer)?
        .as_f64()
        .unwrap_or(f64::NAN))
}

fn lenient_label<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(label) => Some(label),
        _ => None,
    })
}

/// NaN payloads vary; hash them all the same way.
fn coordinate_bytes(value: f64) -> [u8; 8] {
    if value.is_nan() {
        f64::NAN.to_le_bytes()
    } else {
        value.to_le_bytes()
    }
}

impl Post {
    /// Create a post with a known crime level.
    #[must_use]
    pub fn new(
        location: impl Into<String>,
        description: impl Into<String>,
        image_ref: impl Into<String>,
        latitude: f64,
        longitude: f64,
        crime_level: Option<CrimeLevel>,
    ) -> Self {
        Self {
            location: location.into(),
            description: description.into(),
            image_ref: image_ref.into(),
            latitude,
            longitude,
            crime_level: crime_level.map(|level| level.as_str().to_string()),
        }
    }

    /// The parsed crime level, or `None` when absent or unrecognized.
    #[must_use]
    pub fn crime_level(&self) -> Option<CrimeLevel> {
        self.crime_level.as_deref().and_then(|s| s.parse().ok())
    }

    /// Weight this post contributes to an average (0 when unlabeled).
    #[must_use]
    pub fn weight(&self) -> u32 {
        self.crime_level().map_or(0, CrimeLevel::weight)
    }

    /// Content fingerprint used to recognise identical posts.
    ///
    /// BLAKE3 over every field, truncated to 16 hex characters.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for field in [&self.location, &self.description, &self.image_ref] {
            hasher.update(field.as_bytes());
            hasher.update(&[0]);
        }
        hasher.update(&coordinate_bytes(self.latitude));
        hasher.update(&coordinate_bytes(self.longitude));
        hasher.update(self.crime_level.as_deref().unwrap_or("").as_bytes());
        let hex = hasher.finalize().to_hex();
        hex.as_str()[..16].to_string()
    }
}

/// A registered user and the posts they own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Opaque identifier issued by the auth provider.
    #[serde(alias = "uid")]
    pub id: String,

    /// Account email.
    #[serde(default)]
    pub email: String,

    /// Display name.
    #[serde(default)]
    pub username: String,

    /// Avatar URL, empty when none was uploaded.
    #[serde(default)]
    pub profile_image_url: String,

    /// When the account was created.
    pub created_at: DateTime<Utc>,

    /// Posts in insertion order.
    #[serde(default)]
    pub posts: Vec<Post>,
}

impl User {
    /// Number of posts this user owns.
    #[must_use]
    pub fn post_count(&self) -> usize {
        self.posts.len()
    }
}

/// Fields required to register a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    /// Opaque identifier issued by the auth provider.
    pub id: String,
    /// Account email.
    pub email: String,
    /// Display name.
    pub username: String,
    /// Avatar URL, empty when none.
    pub profile_image_url: String,
}

impl NewUser {
    /// Build the stored record with an empty post list.
    #[must_use]
    pub fn into_user(self, created_at: DateTime<Utc>) -> User {
        User {
            id: self.id,
            email: self.email,
            username: self.username,
            profile_image_url: self.profile_image_url,
            created_at,
            posts: Vec::new(),
        }
    }
}

/// Severity computed for a location. Derived per query, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AggregationResult {
    /// Average weight at or below the low threshold.
    Low,
    /// Average weight between the two thresholds.
    Medium,
    /// Average weight above the high threshold.
    High,
    /// Nothing usable was posted near the location.
    InsufficientData,
}

impl fmt::Display for AggregationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
            Self::InsufficientData => write!(f, "insufficient-data"),
        }
    }
}

impl From<CrimeLevel> for AggregationResult {
    fn from(level: CrimeLevel) -> Self {
        match level {
            CrimeLevel::Low => Self::Low,
            CrimeLevel::Medium => Self::Medium,
            CrimeLevel::High => Self::High,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_post(level: Option<&str>) -> Post {
        Post {
            location: "Dark Alley".to_string(),
            description: "scary".to_string(),
            image_ref: "https://img.example/1.jpg".to_string(),
            latitude: 40.0,
            longitude: -73.0,
            crime_level: level.map(String::from),
        }
    }

    #[test]
    fn test_crime_level_weights() {
        assert_eq!(CrimeLevel::Low.weight(), 1);
        assert_eq!(CrimeLevel::Medium.weight(), 2);
        assert_eq!(CrimeLevel::High.weight(), 3);
    }

    #[test]
    fn test_crime_level_parse() {
        for level in CrimeLevel::ALL {
            assert_eq!(level.as_str().parse::<CrimeLevel>().unwrap(), level);
        }
        assert!("extreme".parse::<CrimeLevel>().is_err());
        assert!("".parse::<CrimeLevel>().is_err());
    }

    #[test]
    fn test_unknown_crime_level_display() {
        let err = "HIGH".parse::<CrimeLevel>().unwrap_err();
        assert_eq!(err.to_string(), "unknown crime level 'HIGH'");
    }

    #[test]
    fn test_post_weight_tolerates_missing_and_unknown() {
        assert_eq!(sample_post(Some("high")).weight(), 3);
        assert_eq!(sample_post(None).weight(), 0);
        assert_eq!(sample_post(Some("very bad")).weight(), 0);
        assert!(sample_post(Some("very bad")).crime_level().is_none());
    }

    #[test]
    fn test_fingerprint_is_stable_and_content_sensitive() {
        let a = sample_post(Some("low"));
        let b = sample_post(Some("low"));
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().len(), 16);

        let c = sample_post(Some("high"));
        assert_ne!(a.fingerprint(), c.fingerprint());

        let mut d = sample_post(Some("low"));
        d.latitude += 0.000_1;
        assert_ne!(a.fingerprint(), d.fingerprint());
    }

    #[test]
    fn test_post_deserializes_legacy_record_without_crime_level() {
        let json = r#"{
            "location": "Main St",
            "description": "quiet",
            "imageUrl": "https://img.example/2.jpg",
            "latitude": 1.5,
            "longitude": 2.5
        }"#;
        let post: Post = serde_json::from_str(json).unwrap();
        assert_eq!(post.image_ref, "https://img.example/2.jpg");
        assert!(post.crime_level.is_none());
        assert_eq!(post.weight(), 0);
    }

    #[test]
    fn test_post_missing_coordinates_become_nan() {
        let json = r#"{"location": "Old Town", "description": "legacy", "imageUrl": "x"}"#;
        let post: Post = serde_json::from_str(json).unwrap();
        assert!(post.latitude.is_nan());
        assert!(post.longitude.is_nan());
    }

    #[test]
    fn test_post_non_numeric_coordinates_become_nan() {
        let json = r#"{"latitude": "forty", "longitude": null}"#;
        let post: Post = serde_json::from_str(json).unwrap();
        assert!(post.latitude.is_nan());
        assert!(post.longitude.is_nan());
    }

    #[test]
    fn test_post_non_string_crime_level_is_dropped() {
        for level in ["3", "true", "null", r#"{"level": "high"}"#, r#"["high"]"#] {
            let json = format!(r#"{{"latitude": 1.0, "longitude": 2.0, "crimeLevel": {level}}}"#);
            let post: Post = serde_json::from_str(&json).unwrap();
            assert!(post.crime_level.is_none(), "{level}");
            assert_eq!(post.weight(), 0);
        }
    }

    #[test]
    fn test_user_with_malformed_post_still_loads() {
        let json = r#"{
            "uid": "u1",
            "createdAt": "2024-10-01T12:00:00Z",
            "posts": [
                {"location": "A", "latitude": 1.0, "longitude": 2.0, "crimeLevel": "high"},
                {"location": "B", "crimeLevel": 3}
            ]
        }"#;
        let user: User = serde_json::from_str(json).unwrap();
        assert_eq!(user.post_count(), 2);
        assert_eq!(user.posts[0].weight(), 3);
        assert!(user.posts[1].latitude.is_nan());
        assert!(user.posts[1].crime_level.is_none());
    }

    #[test]
    fn test_fingerprint_of_nan_coordinates_is_stable() {
        let mut a = sample_post(None);
        a.latitude = f64::NAN;
        let mut b = sample_post(None);
        b.latitude = -f64::NAN;
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_post_serializes_camel_case() {
        let json = serde_json::to_string(&sample_post(Some("medium"))).unwrap();
        assert!(json.contains("\"imageUrl\""));
        assert!(json.contains("\"crimeLevel\":\"medium\""));
    }

    #[test]
    fn test_user_deserializes_uid_alias() {
        let json = r#"{
            "uid": "u1",
            "email": "a@b.c",
            "username": "alice",
            "createdAt": "2024-10-01T12:00:00Z",
            "posts": []
        }"#;
        let user: User = serde_json::from_str(json).unwrap();
        assert_eq!(user.id, "u1");
        assert_eq!(user.profile_image_url, "");
        assert_eq!(user.post_count(), 0);
    }

    #[test]
    fn test_new_user_into_user() {
        let now = Utc::now();
        let user = NewUser {
            id: "u1".to_string(),
            email: "a@b.c".to_string(),
            username: "alice".to_string(),
            profile_image_url: String::new(),
        }
        .into_user(now);
        assert_eq!(user.created_at, now);
        assert!(user.posts.is_empty());
    }

    #[test]
    fn test_aggregation_result_display() {
        assert_eq!(AggregationResult::Low.to_string(), "low");
        assert_eq!(AggregationResult::Medium.to_string(), "medium");
        assert_eq!(AggregationResult::High.to_string(), "high");
        assert_eq!(
            AggregationResult::InsufficientData.to_string(),
            "insufficient-data"
        );
    }

    #[test]
    fn test_aggregation_result_serializes_kebab_case() {
        let json = serde_json::to_string(&AggregationResult::InsufficientData).unwrap();
        assert_eq!(json, "\"insufficient-data\"");
    }

    #[test]
    fn test_aggregation_result_from_level() {
        assert_eq!(
            AggregationResult::from(CrimeLevel::Medium),
            AggregationResult::Medium
        );
    }
}
