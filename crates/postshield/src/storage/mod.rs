//! Storage layer for postshield.
//!
//! [`PostStore`] is the collaborator interface the rest of the crate reads
//! snapshots from and writes posts through. [`SqliteStore`] is the bundled
//! implementation backed by `SQLite`.

pub mod migrations;
pub mod schema;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::post::{NewUser, Post, User};

/// Read and write access to users and their embedded posts.
///
/// Implementations may suspend while talking to a backend; callers get an
/// owned snapshot back and do all further work synchronously.
#[async_trait::async_trait]
pub trait PostStore: Send + Sync {
    /// Fetch every user with their posts.
    ///
    /// Users come back in creation order, each user's posts in insertion
    /// order.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    async fn fetch_users(&self) -> Result<Vec<User>>;

    /// Fetch a single user.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    async fn get_user(&self, id: &str) -> Result<Option<User>>;

    /// Register a user with an empty post list.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateUser`] if the id is taken.
    async fn create_user(&self, user: NewUser) -> Result<User>;

    /// Append a post to a user's list.
    ///
    /// Returns `false` without writing when the user already has an
    /// identical post.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UserNotFound`] for an unknown user.
    async fn append_post(&self, user_id: &str, post: Post) -> Result<bool>;
}

/// `SQLite`-backed post store.
#[derive(Debug)]
pub struct SqliteStore {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a store at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist
    /// and brings the schema up to date.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema
    /// initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        migrations::initialize_schema(&conn)?;

        info!("Database opened successfully at {}", path.display());
        Ok(Self {
            path,
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        migrations::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn: Mutex::new(conn),
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::internal("database connection lock poisoned"))
    }

    /// Read every user and their posts.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn load_users(&self) -> Result<Vec<User>> {
        let conn = self.lock()?;

        let mut users = {
            let mut stmt = conn.prepare(
                r"
                SELECT id, email, username, profile_image_url, created_at
                FROM users ORDER BY rowid
                ",
            )?;
            let rows = stmt.query_map([], Self::row_to_user)?;
            rows.collect::<std::result::Result<Vec<_>, _>>()?
        };

        let index: HashMap<String, usize> = users
            .iter()
            .enumerate()
            .map(|(i, user)| (user.id.clone(), i))
            .collect();

        let mut stmt = conn.prepare(
            r"
            SELECT user_id, location, description, image_url, latitude, longitude, crime_level
            FROM posts ORDER BY user_id, position
            ",
        )?;
        let rows = stmt.query_map([], |row| {
            let user_id: String = row.get(0)?;
            Ok((user_id, Self::row_to_post(row, 1)?))
        })?;

        for row in rows {
            let (user_id, post) = row?;
            match index.get(&user_id) {
                Some(&i) => users[i].posts.push(post),
                None => warn!("Skipping post owned by unknown user {}", user_id),
            }
        }

        debug!("Loaded {} users", users.len());
        Ok(users)
    }

    /// Read one user and their posts.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn load_user(&self, id: &str) -> Result<Option<User>> {
        let conn = self.lock()?;

        let user = conn
            .query_row(
                r"
                SELECT id, email, username, profile_image_url, created_at
                FROM users WHERE id = ?1
                ",
                [id],
                Self::row_to_user,
            )
            .optional()?;

        let Some(mut user) = user else {
            return Ok(None);
        };

        let mut stmt = conn.prepare(
            r"
            SELECT location, description, image_url, latitude, longitude, crime_level
            FROM posts WHERE user_id = ?1 ORDER BY position
            ",
        )?;
        user.posts = stmt
            .query_map([id], |row| Self::row_to_post(row, 0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Some(user))
    }

    /// Insert a user record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateUser`] if the id is taken.
    pub fn insert_user(&self, user: NewUser) -> Result<User> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let user = user.into_user(Utc::now());
        Self::insert_user_tx(&tx, &user)?;
        tx.commit()?;
        info!("Created user {}", user.id);
        Ok(user)
    }

    /// Append a post to a user's list, skipping exact duplicates.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UserNotFound`] for an unknown user.
    pub fn insert_post(&self, user_id: &str, post: &Post) -> Result<bool> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        if !Self::user_exists(&tx, user_id)? {
            return Err(Error::user_not_found(user_id));
        }
        let inserted = Self::insert_post_tx(&tx, user_id, post)?;
        tx.commit()?;
        Ok(inserted)
    }

    /// Load a snapshot of users, e.g. from a JSON export.
    ///
    /// Unknown users are created with their recorded creation time; posts
    /// are appended with the usual duplicate check, so importing the same
    /// snapshot twice changes nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails. Nothing is written
    /// in that case.
    pub fn import_snapshot(&self, users: &[User]) -> Result<ImportStats> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let mut stats = ImportStats::default();

        for user in users {
            if Self::user_exists(&tx, &user.id)? {
                debug!("User {} already present, merging posts", user.id);
            } else {
                Self::insert_user_tx(&tx, user)?;
                stats.users_created += 1;
            }

            for post in &user.posts {
                if Self::insert_post_tx(&tx, &user.id, post)? {
                    stats.posts_added += 1;
                } else {
                    stats.posts_skipped += 1;
                }
            }
        }

        tx.commit()?;
        info!(
            users_created = stats.users_created,
            posts_added = stats.posts_added,
            posts_skipped = stats.posts_skipped,
            "Imported snapshot"
        );
        Ok(stats)
    }

    /// Get database statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn stats(&self) -> Result<StorageStats> {
        let conn = self.lock()?;

        let users: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        let posts: i64 = conn.query_row("SELECT COUNT(*) FROM posts", [], |row| row.get(0))?;
        let unlabeled_posts: i64 = conn.query_row(
            "SELECT COUNT(*) FROM posts WHERE crime_level IS NULL",
            [],
            |row| row.get(0),
        )?;

        let db_size_bytes = if self.path.to_string_lossy() == ":memory:" {
            0
        } else {
            std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
        };

        Ok(StorageStats {
            users,
            posts,
            unlabeled_posts,
            db_size_bytes,
        })
    }

    fn user_exists(tx: &Transaction<'_>, id: &str) -> Result<bool> {
        let count: i64 =
            tx.query_row("SELECT COUNT(*) FROM users WHERE id = ?1", [id], |row| row.get(0))?;
        Ok(count > 0)
    }

    fn insert_user_tx(tx: &Transaction<'_>, user: &User) -> Result<()> {
        if Self::user_exists(tx, &user.id)? {
            return Err(Error::DuplicateUser {
                id: user.id.clone(),
            });
        }
        tx.execute(
            r"
            INSERT INTO users (id, email, username, profile_image_url, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ",
            params![
                user.id,
                user.email,
                user.username,
                user.profile_image_url,
                user.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn insert_post_tx(tx: &Transaction<'_>, user_id: &str, post: &Post) -> Result<bool> {
        let fingerprint = post.fingerprint();

        let duplicate: i64 = tx.query_row(
            "SELECT COUNT(*) FROM posts WHERE user_id = ?1 AND fingerprint = ?2",
            params![user_id, fingerprint],
            |row| row.get(0),
        )?;
        if duplicate > 0 {
            debug!("Skipping duplicate post {} for user {}", fingerprint, user_id);
            return Ok(false);
        }

        let position: i64 = tx.query_row(
            "SELECT COALESCE(MAX(position) + 1, 0) FROM posts WHERE user_id = ?1",
            [user_id],
            |row| row.get(0),
        )?;

        tx.execute(
            r"
            INSERT INTO posts (user_id, position, location, description, image_url,
                               latitude, longitude, fingerprint, crime_level)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ",
            params![
                user_id,
                position,
                post.location,
                post.description,
                post.image_ref,
                stored_coordinate(post.latitude),
                stored_coordinate(post.longitude),
                fingerprint,
                post.crime_level,
            ],
        )?;

        debug!("Appended post {} at position {} for user {}", fingerprint, position, user_id);
        Ok(true)
    }

    fn row_to_user(row: &rusqlite::Row) -> rusqlite::Result<User> {
        let id: String = row.get(0)?;
        let created_at_str: String = row.get(4)?;

        let created_at = DateTime::parse_from_rfc3339(&created_at_str).map_or_else(
            |_| {
                warn!("Unparseable created_at for user {}: {}", id, created_at_str);
                DateTime::<Utc>::default()
            },
            |dt| dt.with_timezone(&Utc),
        );

        Ok(User {
            email: row.get(1)?,
            username: row.get(2)?,
            profile_image_url: row.get(3)?,
            created_at,
            posts: Vec::new(),
            id,
        })
    }

    /// Read a post from `row`, starting at column `offset`.
    fn row_to_post(row: &rusqlite::Row, offset: usize) -> rusqlite::Result<Post> {
        Ok(Post {
            location: row.get(offset)?,
            description: row.get(offset + 1)?,
            image_ref: row.get(offset + 2)?,
            latitude: row.get::<_, Option<f64>>(offset + 3)?.unwrap_or(f64::NAN),
            longitude: row.get::<_, Option<f64>>(offset + 4)?.unwrap_or(f64::NAN),
            crime_level: row.get(offset + 5)?,
        })
    }
}

/// Unknown coordinates are stored as NULL.
fn stored_coordinate(value: f64) -> Option<f64> {
    (!value.is_nan()).then_some(value)
}

#[async_trait::async_trait]
impl PostStore for SqliteStore {
    async fn fetch_users(&self) -> Result<Vec<User>> {
        self.load_users()
    }

    async fn get_user(&self, id: &str) -> Result<Option<User>> {
        self.load_user(id)
    }

    async fn create_user(&self, user: NewUser) -> Result<User> {
        self.insert_user(user)
    }

    async fn append_post(&self, user_id: &str, post: Post) -> Result<bool> {
        self.insert_post(user_id, &post)
    }
}

/// Counts from a snapshot import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportStats {
    /// Users that did not exist before.
    pub users_created: usize,
    /// Posts written.
    pub posts_added: usize,
    /// Posts skipped as duplicates.
    pub posts_skipped: usize,
}

/// Statistics about the storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorageStats {
    /// Total number of users.
    pub users: i64,
    /// Total number of posts.
    pub posts: i64,
    /// Posts without a crime level.
    pub unlabeled_posts: i64,
    /// Size of the database file in bytes.
    pub db_size_bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::post::CrimeLevel;

    fn create_test_store() -> SqliteStore {
        SqliteStore::open_in_memory().expect("failed to create test store")
    }

    fn new_user(id: &str) -> NewUser {
        NewUser {
            id: id.to_string(),
            email: format!("{id}@example.com"),
            username: format!("{id}-name"),
            profile_image_url: String::new(),
        }
    }

    fn post(description: &str, level: Option<CrimeLevel>) -> Post {
        Post::new("Main St", description, "https://img.example/p.jpg", 1.0, 2.0, level)
    }

    #[test]
    fn test_open_in_memory() {
        let store = SqliteStore::open_in_memory();
        assert!(store.is_ok());
        assert_eq!(store.unwrap().path().to_string_lossy(), ":memory:");
    }

    #[test]
    fn test_insert_and_load_user() {
        let store = create_test_store();
        let created = store.insert_user(new_user("u1")).unwrap();

        let loaded = store.load_user("u1").unwrap().unwrap();
        assert_eq!(loaded.id, "u1");
        assert_eq!(loaded.username, "u1-name");
        assert!(loaded.posts.is_empty());
        assert_eq!(
            loaded.created_at.timestamp(),
            created.created_at.timestamp()
        );
    }

    #[test]
    fn test_load_missing_user() {
        let store = create_test_store();
        assert!(store.load_user("nobody").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_user_rejected() {
        let store = create_test_store();
        store.insert_user(new_user("u1")).unwrap();
        let err = store.insert_user(new_user("u1")).unwrap_err();
        assert!(matches!(err, Error::DuplicateUser { .. }));
    }

    #[test]
    fn test_posts_keep_insertion_order() {
        let store = create_test_store();
        store.insert_user(new_user("u1")).unwrap();
        for d in ["first", "second", "third"] {
            assert!(store.insert_post("u1", &post(d, None)).unwrap());
        }

        let user = store.load_user("u1").unwrap().unwrap();
        let descriptions: Vec<&str> = user.posts.iter().map(|p| p.description.as_str()).collect();
        assert_eq!(descriptions, ["first", "second", "third"]);
    }

    #[test]
    fn test_identical_post_not_appended_twice() {
        let store = create_test_store();
        store.insert_user(new_user("u1")).unwrap();
        let p = post("same", Some(CrimeLevel::High));

        assert!(store.insert_post("u1", &p).unwrap());
        assert!(!store.insert_post("u1", &p).unwrap());
        assert_eq!(store.load_user("u1").unwrap().unwrap().posts.len(), 1);
    }

    #[test]
    fn test_same_post_for_different_users() {
        let store = create_test_store();
        store.insert_user(new_user("u1")).unwrap();
        store.insert_user(new_user("u2")).unwrap();
        let p = post("same", None);

        assert!(store.insert_post("u1", &p).unwrap());
        assert!(store.insert_post("u2", &p).unwrap());
    }

    #[test]
    fn test_post_for_unknown_user() {
        let store = create_test_store();
        let err = store.insert_post("ghost", &post("x", None)).unwrap_err();
        assert!(matches!(err, Error::UserNotFound { .. }));
    }

    #[test]
    fn test_crime_level_round_trips_raw() {
        let store = create_test_store();
        store.insert_user(new_user("u1")).unwrap();
        let mut odd = post("odd", None);
        odd.crime_level = Some("extreme".to_string());
        store.insert_post("u1", &odd).unwrap();
        store
            .insert_post("u1", &post("labeled", Some(CrimeLevel::Low)))
            .unwrap();

        let user = store.load_user("u1").unwrap().unwrap();
        assert_eq!(user.posts[0].crime_level.as_deref(), Some("extreme"));
        assert_eq!(user.posts[0].crime_level(), None);
        assert_eq!(user.posts[1].crime_level(), Some(CrimeLevel::Low));
    }

    #[test]
    fn test_load_users_groups_posts() {
        let store = create_test_store();
        store.insert_user(new_user("b")).unwrap();
        store.insert_user(new_user("a")).unwrap();
        store.insert_post("a", &post("a1", None)).unwrap();
        store.insert_post("b", &post("b1", None)).unwrap();
        store.insert_post("a", &post("a2", None)).unwrap();

        let users = store.load_users().unwrap();
        assert_eq!(users.len(), 2);
        // Creation order, not id order.
        assert_eq!(users[0].id, "b");
        assert_eq!(users[1].id, "a");
        assert_eq!(users[0].posts.len(), 1);
        assert_eq!(users[1].posts[0].description, "a1");
        assert_eq!(users[1].posts[1].description, "a2");
    }

    #[test]
    fn test_import_snapshot_is_idempotent() {
        let store = create_test_store();
        let json = r#"[
            {
                "uid": "u1",
                "email": "one@example.com",
                "username": "one",
                "profileImageUrl": "",
                "createdAt": "2024-10-01T12:00:00Z",
                "posts": [
                    {"location": "Dark Alley", "description": "scary", "imageUrl": "x",
                     "latitude": 1.0, "longitude": 2.0, "crimeLevel": "high"},
                    {"location": "Main St", "description": "legacy", "imageUrl": "y",
                     "latitude": 1.0, "longitude": 2.0}
                ]
            },
            {"uid": "u2", "createdAt": "2024-10-02T12:00:00Z"}
        ]"#;
        let users: Vec<User> = serde_json::from_str(json).unwrap();

        let first = store.import_snapshot(&users).unwrap();
        assert_eq!(
            first,
            ImportStats {
                users_created: 2,
                posts_added: 2,
                posts_skipped: 0
            }
        );

        let second = store.import_snapshot(&users).unwrap();
        assert_eq!(
            second,
            ImportStats {
                users_created: 0,
                posts_added: 0,
                posts_skipped: 2
            }
        );

        let loaded = store.load_users().unwrap();
        assert_eq!(loaded, users);
    }

    #[test]
    fn test_import_snapshot_with_malformed_posts() {
        let store = create_test_store();
        let json = r#"[
            {
                "uid": "u1",
                "createdAt": "2024-10-01T12:00:00Z",
                "posts": [
                    {"location": "Dark Alley", "description": "scary", "imageUrl": "x",
                     "latitude": 1.0, "longitude": 2.0, "crimeLevel": "high"},
                    {"location": "Somewhere", "description": "no coordinates", "imageUrl": "y",
                     "crimeLevel": 3}
                ]
            }
        ]"#;
        let users: Vec<User> = serde_json::from_str(json).unwrap();

        let stats = store.import_snapshot(&users).unwrap();
        assert_eq!(stats.posts_added, 2);
        assert_eq!(store.import_snapshot(&users).unwrap().posts_skipped, 2);

        let loaded = store.load_user("u1").unwrap().unwrap();
        assert_eq!(loaded.posts.len(), 2);
        let legacy = &loaded.posts[1];
        assert!(legacy.latitude.is_nan());
        assert!(legacy.longitude.is_nan());
        assert!(legacy.crime_level.is_none());
        assert_eq!(legacy.fingerprint(), users[0].posts[1].fingerprint());

        let summary = crate::aggregate::CrimeAggregator::new().summarize(1.0, 2.0, &[loaded]);
        assert_eq!(summary.matched, 1);
        assert_eq!(summary.result, crate::post::AggregationResult::High);
    }

    #[test]
    fn test_stats() {
        let store = create_test_store();
        let stats = store.stats().unwrap();
        assert_eq!(stats.users, 0);
        assert_eq!(stats.posts, 0);
        assert_eq!(stats.db_size_bytes, 0);

        store.insert_user(new_user("u1")).unwrap();
        store.insert_post("u1", &post("a", None)).unwrap();
        store
            .insert_post("u1", &post("b", Some(CrimeLevel::Low)))
            .unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.users, 1);
        assert_eq!(stats.posts, 2);
        assert_eq!(stats.unlabeled_posts, 1);
    }

    #[tokio::test]
    async fn test_post_store_trait() {
        let store = create_test_store();
        let user = store.create_user(new_user("u1")).await.unwrap();
        assert_eq!(user.id, "u1");

        assert!(store.append_post("u1", post("a", None)).await.unwrap());
        let fetched = store.get_user("u1").await.unwrap().unwrap();
        assert_eq!(fetched.posts.len(), 1);

        let all = store.fetch_users().await.unwrap();
        assert_eq!(all.len(), 1);
    }

    #[test]
    fn test_open_creates_parent_directories() {
        let dir = std::env::temp_dir().join(format!(
            "postshield-test-{}-{}",
            std::process::id(),
            Utc::now().timestamp_nanos_opt().unwrap_or_default()
        ));
        let path = dir.join("nested").join("posts.db");

        let store = SqliteStore::open(&path).unwrap();
        store.insert_user(new_user("u1")).unwrap();
        assert!(path.exists());
        assert_eq!(store.stats().unwrap().users, 1);

        drop(store);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
