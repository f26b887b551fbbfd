//! Database migration system for postshield.
//!
//! This module handles database schema versioning and migrations. Version 1
//! is the base schema; version 2 adds the optional `crime_level` column,
//! which posts written before crime levels existed leave `NULL`. Version 3
//! relaxes `NOT NULL` on post coordinates in databases created before
//! unknown coordinates were accepted.

use rusqlite::Connection;
use tracing::info;

use crate::error::{Error, Result};

use super::schema::{CREATE_COORDINATE_INDEX, CREATE_FINGERPRINT_INDEX, SCHEMA_STATEMENTS};

/// The current schema version.
pub const CURRENT_VERSION: i32 = 3;

/// Key used to store the schema version in the metadata table.
const VERSION_KEY: &str = "schema_version";

/// Initialize the database schema.
///
/// Creates all tables and indexes if they don't exist, then runs any
/// pending migrations to bring the schema up to the current version.
///
/// # Errors
///
/// Returns an error if schema creation or migration fails.
pub fn initialize_schema(conn: &Connection) -> Result<()> {
    for statement in SCHEMA_STATEMENTS {
        conn.execute(statement, [])?;
    }

    let version = get_schema_version(conn)?;
    if version > CURRENT_VERSION {
        return Err(Error::DatabaseMigration {
            message: format!(
                "database schema version {version} is newer than supported version {CURRENT_VERSION}"
            ),
        });
    }
    if version < CURRENT_VERSION {
        run_migrations(conn, version)?;
    }

    Ok(())
}

/// Get the current schema version from the database.
///
/// Returns 0 if no version is set (fresh database).
fn get_schema_version(conn: &Connection) -> Result<i32> {
    let result: std::result::Result<String, rusqlite::Error> = conn.query_row(
        "SELECT value FROM metadata WHERE key = ?1",
        [VERSION_KEY],
        |row| row.get(0),
    );

    match result {
        Ok(value) => value.parse().map_err(|_| Error::DatabaseMigration {
            message: format!("invalid schema version: {value}"),
        }),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(0),
        Err(e) => Err(e.into()),
    }
}

/// Set the schema version in the database.
fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
        (VERSION_KEY, version.to_string()),
    )?;
    Ok(())
}

/// Run migrations from the given version to the current version.
fn run_migrations(conn: &Connection, from_version: i32) -> Result<()> {
    let mut current = from_version;

    while current < CURRENT_VERSION {
        current += 1;
        run_migration(conn, current)?;
        info!("Migrated database schema to version {}", current);
    }

    set_schema_version(conn, CURRENT_VERSION)?;
    Ok(())
}

/// Run a specific migration version.
fn run_migration(conn: &Connection, version: i32) -> Result<()> {
    match version {
        1 => migrate_v1(conn),
        2 => migrate_v2(conn),
        3 => migrate_v3(conn),
        _ => Err(Error::DatabaseMigration {
            message: format!("unknown migration version: {version}"),
        }),
    }
}

/// Migration to version 1 (initial schema).
///
/// Version 1 is the base schema created by `SCHEMA_STATEMENTS`.
fn migrate_v1(conn: &Connection) -> Result<()> {
    set_schema_version(conn, 1)?;
    Ok(())
}

/// Migration to version 2: posts gain an optional crime level.
fn migrate_v2(conn: &Connection) -> Result<()> {
    if !column_exists(conn, "posts", "crime_level")? {
        conn.execute("ALTER TABLE posts ADD COLUMN crime_level TEXT", [])?;
    }
    set_schema_version(conn, 2)?;
    Ok(())
}

/// Rebuild statements for `migrate_v3`. `SQLite` cannot drop a column
/// constraint in place, so the table is copied.
const REBUILD_POSTS_NULLABLE_COORDINATES: &str = r"
CREATE TABLE posts_v3 (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL REFERENCES users(id),
    position INTEGER NOT NULL,
    location TEXT NOT NULL,
    description TEXT NOT NULL,
    image_url TEXT NOT NULL,
    latitude REAL,
    longitude REAL,
    fingerprint TEXT NOT NULL,
    crime_level TEXT,
    UNIQUE (user_id, position)
);
INSERT INTO posts_v3 (id, user_id, position, location, description, image_url,
                      latitude, longitude, fingerprint, crime_level)
    SELECT id, user_id, position, location, description, image_url,
           latitude, longitude, fingerprint, crime_level
    FROM posts;
DROP TABLE posts;
ALTER TABLE posts_v3 RENAME TO posts;
";

/// Migration to version 3: post coordinates become nullable.
fn migrate_v3(conn: &Connection) -> Result<()> {
    if column_not_null(conn, "posts", "latitude")? || column_not_null(conn, "posts", "longitude")? {
        conn.execute_batch(&format!(
            "SAVEPOINT migrate_v3;{REBUILD_POSTS_NULLABLE_COORDINATES}{}{}RELEASE migrate_v3;",
            terminated(CREATE_FINGERPRINT_INDEX),
            terminated(CREATE_COORDINATE_INDEX),
        ))?;
    }
    set_schema_version(conn, 3)?;
    Ok(())
}

fn terminated(statement: &str) -> String {
    format!("{};", statement.trim())
}

/// `(name, notnull)` for every column of `table`.
fn columns(conn: &Connection, table: &str) -> Result<Vec<(String, bool)>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let columns = stmt
        .query_map([], |row| Ok((row.get::<_, String>(1)?, row.get::<_, i64>(3)? != 0)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(columns)
}

fn column_exists(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    Ok(columns(conn, table)?.iter().any(|(name, _)| name == column))
}

fn column_not_null(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    Ok(columns(conn, table)?
        .iter()
        .any(|(name, not_null)| name == column && *not_null))
}
