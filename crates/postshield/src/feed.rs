//! Feed assembly.
//!
//! Posts live embedded in their owners' records; the feed flattens them into
//! a single list and joins each post with its author's display fields.

use serde::Serialize;

use crate::post::{Post, User};
use crate::search::SearchFilter;

/// A post as shown in the feed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedPost {
    /// Stable entry id: `{user_id}-{fingerprint}`.
    pub id: String,
    /// Author id.
    pub user_id: String,
    /// Author display name.
    pub username: String,
    /// Author avatar URL.
    pub profile_image_url: String,
    /// The post itself.
    #[serde(flatten)]
    pub post: Post,
}

impl FeedPost {
    /// Join a post with its author.
    #[must_use]
    pub fn new(user: &User, post: &Post) -> Self {
        Self {
            id: format!("{}-{}", user.id, post.fingerprint()),
            user_id: user.id.clone(),
            username: user.username.clone(),
            profile_image_url: user.profile_image_url.clone(),
            post: post.clone(),
        }
    }
}

/// Flatten users into feed entries: users in snapshot order, each user's
/// posts in insertion order.
#[must_use]
pub fn from_users(users: &[User]) -> Vec<FeedPost> {
    users
        .iter()
        .flat_map(|user| user.posts.iter().map(move |post| FeedPost::new(user, post)))
        .collect()
}

/// Assemble the feed, search it, and cut it to at most `limit` entries.
///
/// A `limit` of 0 means no limit.
#[must_use]
pub fn build(users: &[User], query: &str, limit: usize) -> Vec<FeedPost> {
    let mut entries = SearchFilter::new(query).apply(&from_users(users));
    if limit > 0 {
        entries.truncate(limit);
    }
    entries
}
