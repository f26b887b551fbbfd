//! Per-location crime level aggregation.
//!
//! Every post of every user is tested against the query point; matching
//! posts are weighted `low=1`, `medium=2`, `high=3` and the mean weight is
//! bucketed into a severity.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::post::{AggregationResult, Post, User};
use crate::proximity::{ProximityMatcher, DEFAULT_TOLERANCE};

/// Highest average that still counts as `low`.
pub const LOW_THRESHOLD: f64 = 1.3;

/// Highest average that still counts as `medium`.
pub const MEDIUM_THRESHOLD: f64 = 2.3;

/// How matched posts without a recognised crime level are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnlabeledPolicy {
    /// Count toward the number of matches with weight 0.
    ///
    /// This pulls the average down and is how existing data has always
    /// been scored.
    #[default]
    CountAsZero,
    /// Leave them out of the average entirely.
    Exclude,
}

/// Everything the aggregator learned about one location.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LocationSummary {
    /// Posts inside the tolerance box.
    pub matched: usize,
    /// Matched posts carrying a recognised crime level.
    pub labeled: usize,
    /// Sum of weights over matched posts.
    pub total_weight: u64,
    /// Mean weight over the counted posts, if any were counted.
    pub average: Option<f64>,
    /// The bucketed severity.
    pub result: AggregationResult,
}

/// Bucket an average weight into a severity.
///
/// `<= 1.3` is low, `<= 2.3` is medium, anything above is high.
#[must_use]
pub fn bucket(average: f64) -> AggregationResult {
    if average <= LOW_THRESHOLD {
        AggregationResult::Low
    } else if average <= MEDIUM_THRESHOLD {
        AggregationResult::Medium
    } else {
        AggregationResult::High
    }
}

/// Folds a snapshot of users' posts into a severity for a point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CrimeAggregator {
    tolerance: f64,
    unlabeled: UnlabeledPolicy,
}

impl Default for CrimeAggregator {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            unlabeled: UnlabeledPolicy::default(),
        }
    }
}

impl CrimeAggregator {
    /// Aggregator with the default tolerance and unlabeled policy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different per-axis tolerance.
    ///
    /// The caller must pass a finite, non-negative value; configuration
    /// loading enforces this, direct callers are on their own. A negative
    /// or NaN tolerance matches nothing.
    #[must_use]
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        debug_assert!(
            tolerance.is_finite() && tolerance >= 0.0,
            "tolerance must be finite and non-negative, got {tolerance}"
        );
        self.tolerance = tolerance;
        self
    }

    /// Use a different unlabeled-post policy.
    #[must_use]
    pub fn with_unlabeled_policy(mut self, policy: UnlabeledPolicy) -> Self {
        self.unlabeled = policy;
        self
    }

    /// The per-axis tolerance in degrees.
    #[must_use]
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// The unlabeled-post policy.
    #[must_use]
    pub fn unlabeled_policy(&self) -> UnlabeledPolicy {
        self.unlabeled
    }

    /// Severity at `(latitude, longitude)` over every user's posts.
    #[must_use]
    pub fn aggregate(&self, latitude: f64, longitude: f64, users: &[User]) -> AggregationResult {
        self.summarize(latitude, longitude, users).result
    }

    /// Like [`aggregate`](Self::aggregate), keeping the intermediate counts.
    #[must_use]
    pub fn summarize(&self, latitude: f64, longitude: f64, users: &[User]) -> LocationSummary {
        let posts = users.iter().flat_map(|user| user.posts.iter());
        self.summarize_posts(latitude, longitude, posts)
    }

    /// Summarize an arbitrary sequence of posts.
    #[must_use]
    pub fn summarize_posts<'a, I>(&self, latitude: f64, longitude: f64, posts: I) -> LocationSummary
    where
        I: IntoIterator<Item = &'a Post>,
    {
        let matcher = ProximityMatcher::with_tolerance(latitude, longitude, self.tolerance);

        let mut matched = 0usize;
        let mut labeled = 0usize;
        let mut total_weight = 0u64;

        for post in posts {
            if !matcher.matches(post.latitude, post.longitude) {
                continue;
            }
            matched += 1;
            let weight = post.weight();
            if weight > 0 {
                labeled += 1;
            }
            total_weight += u64::from(weight);
        }

        let counted = match self.unlabeled {
            UnlabeledPolicy::CountAsZero => matched,
            UnlabeledPolicy::Exclude => labeled,
        };

        let (average, result) = if counted == 0 {
            (None, AggregationResult::InsufficientData)
        } else {
            #[allow(clippy::cast_precision_loss)]
            let average = total_weight as f64 / counted as f64;
            (Some(average), bucket(average))
        };

        trace!(
            latitude,
            longitude,
            matched,
            labeled,
            total_weight,
            %result,
            "Aggregated crime level"
        );

        LocationSummary {
            matched,
            labeled,
            total_weight,
            average,
            result,
        }
    }
}
