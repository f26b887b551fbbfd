//! The crime map service.
//!
//! Wires an injected [`PostStore`] to the aggregator, feed and compose
//! logic. Store and geocoder calls are the only steps that await;
//! everything after them is synchronous.

use std::fmt;

use tracing::{debug, info, warn};

use crate::aggregate::{CrimeAggregator, LocationSummary};
use crate::compose::{GeocodedPlace, PostDraft, ReverseGeocoder};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::feed::{self, FeedPost};
use crate::post::User;
use crate::storage::PostStore;

/// Read and write operations over a post store.
pub struct CrimeMap<S> {
    store: S,
    aggregator: CrimeAggregator,
    page_size: usize,
    geocoder: Option<Box<dyn ReverseGeocoder>>,
}

impl<S: fmt::Debug> fmt::Debug for CrimeMap<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CrimeMap")
            .field("store", &self.store)
            .field("aggregator", &self.aggregator)
            .field("page_size", &self.page_size)
            .field("geocoder", &self.geocoder.is_some())
            .finish()
    }
}

impl<S: PostStore> CrimeMap<S> {
    /// Service with default aggregation and feed settings.
    #[must_use]
    pub fn new(store: S) -> Self {
        Self::with_config(store, &Config::default())
    }

    /// Service using the aggregation and feed settings from `config`.
    #[must_use]
    pub fn with_config(store: S, config: &Config) -> Self {
        Self {
            store,
            aggregator: config.aggregator(),
            page_size: config.feed.page_size,
            geocoder: None,
        }
    }

    /// Resolve places for posts published without one.
    #[must_use]
    pub fn with_geocoder(mut self, geocoder: impl ReverseGeocoder + 'static) -> Self {
        self.geocoder = Some(Box::new(geocoder));
        self
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The aggregator in use.
    #[must_use]
    pub fn aggregator(&self) -> &CrimeAggregator {
        &self.aggregator
    }

    async fn snapshot(&self) -> Result<Vec<User>> {
        self.store.fetch_users().await.map_err(|err| {
            warn!(error = %err, "Failed to fetch post snapshot");
            unavailable(err)
        })
    }

    /// Crime level summary at a point.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DataUnavailable`] if the snapshot cannot be fetched.
    pub async fn crime_level_at(&self, latitude: f64, longitude: f64) -> Result<LocationSummary> {
        let users = self.snapshot().await?;
        let summary = self.aggregator.summarize(latitude, longitude, &users);
        debug!(
            latitude,
            longitude,
            matched = summary.matched,
            result = %summary.result,
            "Computed crime level"
        );
        Ok(summary)
    }

    /// Feed entries matching `query`, at most `limit` of them.
    ///
    /// `None` uses the configured page size; `Some(0)` means no limit.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DataUnavailable`] if the snapshot cannot be fetched.
    pub async fn feed(&self, query: &str, limit: Option<usize>) -> Result<Vec<FeedPost>> {
        let users = self.snapshot().await?;
        Ok(feed::build(&users, query, limit.unwrap_or(self.page_size)))
    }

    /// Validate a draft and append it to `user_id`'s posts.
    ///
    /// Without an explicit `place` the configured geocoder, if any, is asked
    /// for one. A failed lookup is logged and the post is stored with an
    /// unknown location. Returns `false` if an identical post was already
    /// there.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDraft`] for a bad draft and
    /// [`Error::UserNotFound`] for an unknown user.
    pub async fn publish(
        &self,
        user_id: &str,
        draft: PostDraft,
        place: Option<&GeocodedPlace>,
    ) -> Result<bool> {
        draft.validate()?;
        let resolved = match (place, &self.geocoder) {
            (None, Some(geocoder)) => {
                match geocoder.reverse(draft.latitude, draft.longitude).await {
                    Ok(found) => Some(found),
                    Err(err) => {
                        warn!(error = %err, "Reverse geocoding failed");
                        None
                    }
                }
            }
            _ => None,
        };
        let post = draft.into_post(place.or(resolved.as_ref()))?;
        let added = self
            .store
            .append_post(user_id, post)
            .await
            .map_err(|err| {
                if !err.is_user_error() {
                    warn!(error = %err, "Failed to append post for user {}", user_id);
                }
                unavailable(err)
            })?;
        if added {
            info!("Published post for user {}", user_id);
        } else {
            info!("Post for user {} already exists, nothing written", user_id);
        }
        Ok(added)
    }
}

/// Backend failures become [`Error::DataUnavailable`]; caller mistakes pass
/// through.
fn unavailable(err: Error) -> Error {
    if err.is_data_unavailable() || err.is_user_error() {
        err
    } else {
        Error::data_unavailable(err.to_string())
    }
}
