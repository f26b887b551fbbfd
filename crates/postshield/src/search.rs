//! Feed search.
//!
//! A query is split on whitespace into lowercase tokens. A post is kept when
//! every token occurs in its location or in its description; each token may
//! be satisfied by either field independently.

use tracing::debug;

use crate::feed::FeedPost;
use crate::post::Post;

/// Something that exposes the two searchable text fields of a post.
pub trait Searchable {
    /// Display address text.
    fn location(&self) -> &str;
    /// Free-text description.
    fn description(&self) -> &str;
}

impl Searchable for Post {
    fn location(&self) -> &str {
        &self.location
    }

    fn description(&self) -> &str {
        &self.description
    }
}

impl Searchable for FeedPost {
    fn location(&self) -> &str {
        &self.post.location
    }

    fn description(&self) -> &str {
        &self.post.description
    }
}

/// A parsed search query.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SearchFilter {
    tokens: Vec<String>,
}

impl SearchFilter {
    /// Parse a raw query string.
    #[must_use]
    pub fn new(query: &str) -> Self {
        let tokens = query.split_whitespace().map(str::to_lowercase).collect();
        Self { tokens }
    }

    /// The lowercase tokens, in query order.
    #[must_use]
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// True when the query had no tokens and keeps everything.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Check a single item against every token.
    #[must_use]
    pub fn matches<T: Searchable + ?Sized>(&self, item: &T) -> bool {
        if self.tokens.is_empty() {
            return true;
        }
        let location = item.location().to_lowercase();
        let description = item.description().to_lowercase();
        self.tokens
            .iter()
            .all(|token| location.contains(token.as_str()) || description.contains(token.as_str()))
    }

    /// Keep the matching items, preserving their order.
    #[must_use]
    pub fn apply<T: Searchable + Clone>(&self, items: &[T]) -> Vec<T> {
        if self.tokens.is_empty() {
            return items.to_vec();
        }
        let kept: Vec<T> = items
            .iter()
            .filter(|item| self.matches(*item))
            .cloned()
            .collect();
        debug!(
            tokens = self.tokens.len(),
            total = items.len(),
            kept = kept.len(),
            "Filtered posts"
        );
        kept
    }
}

/// Filter `posts` by `query`; a blank query returns everything unchanged.
#[must_use]
pub fn filter(posts: &[Post], query: &str) -> Vec<Post> {
    SearchFilter::new(query).apply(posts)
}
