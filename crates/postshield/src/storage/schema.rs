//! `SQLite` schema definitions for postshield.
//!
//! This module contains the SQL statements for creating the base (version 1)
//! schema. Later columns are added by migrations.

/// SQL statement to create the users table.
pub const CREATE_USERS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    email TEXT NOT NULL,
    username TEXT NOT NULL,
    profile_image_url TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL
)
";

/// SQL statement to create the posts table.
///
/// Posts are embedded in their owner: `position` is the insertion index
/// within the owner's list. Coordinates are NULL when the source record
/// had none.
pub const CREATE_POSTS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS posts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL REFERENCES users(id),
    position INTEGER NOT NULL,
    location TEXT NOT NULL,
    description TEXT NOT NULL,
    image_url TEXT NOT NULL,
    latitude REAL,
    longitude REAL,
    fingerprint TEXT NOT NULL,
    UNIQUE (user_id, position)
)
";

/// SQL statement to create an index on `(user_id, fingerprint)` for
/// duplicate detection.
pub const CREATE_FINGERPRINT_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_posts_fingerprint ON posts(user_id, fingerprint)
";

/// SQL statement to create an index on coordinates.
pub const CREATE_COORDINATE_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_posts_coordinates ON posts(latitude, longitude)
";

/// SQL statement to create the metadata table for storing key-value pairs.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    CREATE_USERS_TABLE,
    CREATE_POSTS_TABLE,
    CREATE_FINGERPRINT_INDEX,
    CREATE_COORDINATE_INDEX,
    CREATE_METADATA_TABLE,
];
