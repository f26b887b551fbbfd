//! Coordinate proximity test.
//!
//! Two points are "the same location" when both the latitude and the
//! longitude differ by strictly less than a tolerance. This is a per-axis
//! box, not a geodesic distance: the box is narrower in metres towards the
//! poles, and that is accepted.

/// Default per-axis tolerance in degrees (roughly 500m of latitude).
pub const DEFAULT_TOLERANCE: f64 = 0.005;

/// Check whether a post at `(post_lat, post_lng)` lies at the queried point.
///
/// NaN on either side makes every comparison false, so malformed
/// coordinates never match. A tolerance of exactly 0 degenerates to an
/// equality test on both axes.
#[must_use]
#[allow(clippy::float_cmp)]
pub fn matches(query_lat: f64, query_lng: f64, post_lat: f64, post_lng: f64, tolerance: f64) -> bool {
    if tolerance == 0.0 {
        return post_lat == query_lat && post_lng == query_lng;
    }
    (post_lat - query_lat).abs() < tolerance && (post_lng - query_lng).abs() < tolerance
}

/// A query point paired with a tolerance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProximityMatcher {
    latitude: f64,
    longitude: f64,
    tolerance: f64,
}

impl ProximityMatcher {
    /// Match around a point with the default tolerance.
    #[must_use]
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self::with_tolerance(latitude, longitude, DEFAULT_TOLERANCE)
    }

    /// Match around a point with a custom tolerance.
    #[must_use]
    pub fn with_tolerance(latitude: f64, longitude: f64, tolerance: f64) -> Self {
        Self {
            latitude,
            longitude,
            tolerance,
        }
    }

    /// The tolerance in degrees.
    #[must_use]
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Check a candidate coordinate against the query point.
    #[must_use]
    pub fn matches(&self, latitude: f64, longitude: f64) -> bool {
        matches(
            self.latitude,
            self.longitude,
            latitude,
            longitude,
            self.tolerance,
        )
    }
}
