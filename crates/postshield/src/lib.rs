//! `postshield` - Crime awareness over user-submitted geotagged posts
//!
//! This library provides the core of a crime-awareness feed: users publish
//! posts tagged with coordinates and a perceived crime level, and the crate
//! answers two questions over the current set of posts. What is the crime
//! level around a point, and which posts match a free-text search.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod aggregate;
pub mod cli;
pub mod compose;
pub mod config;
pub mod error;
pub mod feed;
pub mod logging;
pub mod post;
pub mod proximity;
pub mod search;
pub mod service;
pub mod storage;

pub use aggregate::{CrimeAggregator, LocationSummary, UnlabeledPolicy};
pub use compose::{GeocodedPlace, PostDraft, ReverseGeocoder};
pub use config::Config;
pub use error::{Error, Result};
pub use feed::FeedPost;
pub use logging::init_logging;
pub use post::{AggregationResult, CrimeLevel, NewUser, Post, User};
pub use proximity::ProximityMatcher;
pub use search::SearchFilter;
pub use service::CrimeMap;
pub use storage::{PostStore, SqliteStore, StorageStats};
