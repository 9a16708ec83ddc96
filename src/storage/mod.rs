//! SQLite persistence and media storage backends

use crate::core::geo::{central_angle, GeoPoint};
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use rusqlite::functions::FunctionFlags;
use rusqlite::types::Type;
use rusqlite::{Connection, Row};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

pub mod conversations;
pub mod listings;
pub mod media;
pub mod reviews;
pub mod sql;
pub mod users;

/// Database schema version
const SCHEMA_VERSION: i32 = 1;

/// Name of the SQL scalar used by the geo radius filter
pub(crate) const GEO_ANGLE_FN: &str = "geo_central_angle";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Duplicate value: {0}")]
    Duplicate(String),

    #[error("JSON column error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Row counts per table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreCounts {
    pub users: u64,
    pub listings: u64,
    pub conversations: u64,
    pub messages: u64,
    pub reviews: u64,
}

/// Handle to the CommonGood database
///
/// A single connection behind an async mutex; clones share it.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Open (creating if needed) the database at `path` and migrate it.
    /// `:memory:` opens a private in-memory database.
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = if path.as_os_str() == ":memory:" {
            Connection::open_in_memory()?
        } else {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            Connection::open(path)?
        };
        Self::from_connection(conn)
    }

    pub async fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        register_functions(&conn)?;
        migrate(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` with exclusive access to the connection
    pub(crate) async fn with_conn<T>(
        &self,
        f: impl FnOnce(&mut Connection) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut conn = self.conn.lock().await;
        f(&mut conn)
    }

    pub async fn schema_version(&self) -> Result<i32, StoreError> {
        self.with_conn(|conn| Ok(current_version(conn))).await
    }

    pub async fn counts(&self) -> Result<StoreCounts, StoreError> {
        self.with_conn(|conn| {
            let count = |table: &str| -> Result<u64, StoreError> {
                let n: i64 =
                    conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))?;
                Ok(n.max(0) as u64)
            };
            Ok(StoreCounts {
                users: count("users")?,
                listings: count("listings")?,
                conversations: count("conversations")?,
                messages: count("messages")?,
                reviews: count("reviews")?,
            })
        })
        .await
    }
}

fn register_functions(conn: &Connection) -> Result<(), StoreError> {
    conn.create_scalar_function(
        GEO_ANGLE_FN,
        4,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            // NULL in, NULL out: rows without coordinates never match
            let lat1: Option<f64> = ctx.get(0)?;
            let lng1: Option<f64> = ctx.get(1)?;
            let lat2: Option<f64> = ctx.get(2)?;
            let lng2: Option<f64> = ctx.get(3)?;
            Ok(match (lat1, lng1, lat2, lng2) {
                (Some(lat1), Some(lng1), Some(lat2), Some(lng2)) => Some(central_angle(
                    GeoPoint {
                        longitude: lng1,
                        latitude: lat1,
                    },
                    GeoPoint {
                        longitude: lng2,
                        latitude: lat2,
                    },
                )),
                _ => None,
            })
        },
    )?;
    Ok(())
}

fn current_version(conn: &Connection) -> i32 {
    conn.query_row(
        "SELECT version FROM schema_version ORDER BY version DESC LIMIT 1",
        [],
        |row| row.get(0),
    )
    .unwrap_or(0)
}

fn migrate(conn: &Connection) -> Result<(), StoreError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        )",
        [],
    )?;

    let version = current_version(conn);
    if version >= SCHEMA_VERSION {
        debug!("Database schema at version {}", version);
        return Ok(());
    }

    if version < 1 {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                password_changed_at TEXT,
                profile_picture_url TEXT NOT NULL,
                profile_picture_public_id TEXT,
                bio TEXT,
                location TEXT,
                longitude REAL,
                latitude REAL,
                skills_offered TEXT NOT NULL DEFAULT '[]',
                skills_sought TEXT NOT NULL DEFAULT '[]',
                average_rating REAL NOT NULL DEFAULT 0,
                num_reviews INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS listings (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES users(id),
                listing_type TEXT NOT NULL,
                title TEXT NOT NULL,
                description TEXT NOT NULL,
                category TEXT NOT NULL,
                tags TEXT NOT NULL DEFAULT '[]',
                photos TEXT NOT NULL DEFAULT '[]',
                estimated_effort TEXT,
                exchange_preference TEXT,
                status TEXT NOT NULL DEFAULT 'active',
                location TEXT,
                longitude REAL,
                latitude REAL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_listings_status ON listings(status);
            CREATE INDEX IF NOT EXISTS idx_listings_user ON listings(user_id);
            CREATE INDEX IF NOT EXISTS idx_listings_created ON listings(created_at);

            CREATE TABLE IF NOT EXISTS conversations (
                id TEXT PRIMARY KEY,
                participant_a TEXT NOT NULL REFERENCES users(id),
                participant_b TEXT NOT NULL REFERENCES users(id),
                listing_id TEXT,
                last_message_id TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                CHECK (participant_a < participant_b)
            );
            CREATE UNIQUE INDEX IF NOT EXISTS idx_conversations_pair_listing
                ON conversations(participant_a, participant_b, COALESCE(listing_id, ''));
            CREATE INDEX IF NOT EXISTS idx_conversations_b ON conversations(participant_b);

            CREATE TABLE IF NOT EXISTS messages (
                id TEXT PRIMARY KEY,
                conversation_id TEXT NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
                sender_id TEXT NOT NULL REFERENCES users(id),
                receiver_id TEXT NOT NULL REFERENCES users(id),
                content TEXT NOT NULL,
                is_read INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_messages_conversation
                ON messages(conversation_id, created_at);

            CREATE TABLE IF NOT EXISTS reviews (
                id TEXT PRIMARY KEY,
                listing_id TEXT NOT NULL,
                reviewer_id TEXT NOT NULL REFERENCES users(id),
                reviewee_id TEXT NOT NULL REFERENCES users(id),
                rating INTEGER NOT NULL CHECK (rating BETWEEN 1 AND 5),
                comment TEXT NOT NULL,
                created_at TEXT NOT NULL,
                UNIQUE (listing_id, reviewer_id, reviewee_id)
            );
            CREATE INDEX IF NOT EXISTS idx_reviews_reviewee ON reviews(reviewee_id);",
        )?;
    }

    conn.execute(
        "INSERT OR REPLACE INTO schema_version (version) VALUES (?)",
        [SCHEMA_VERSION],
    )?;
    info!("Migrated database schema from version {} to {}", version, SCHEMA_VERSION);
    Ok(())
}

/// Current time at the precision stored in the database
pub(crate) fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// Storage format for timestamps; lexicographic order matches time order
pub(crate) fn ts(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub(crate) fn conversion_error(message: impl Into<String>) -> rusqlite::Error {
    let message: String = message.into();
    rusqlite::Error::FromSqlConversionFailure(0, Type::Text, message.into())
}

pub(crate) fn get_ts(row: &Row<'_>, column: &str) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(column)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(format!("{}: {}", column, e)))
}

pub(crate) fn get_opt_ts(row: &Row<'_>, column: &str) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(column)?;
    raw.map(|raw| {
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| conversion_error(format!("{}: {}", column, e)))
    })
    .transpose()
}

pub(crate) fn get_id(row: &Row<'_>, column: &str) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(column)?;
    Uuid::parse_str(&raw).map_err(|e| conversion_error(format!("{}: {}", column, e)))
}

pub(crate) fn get_opt_id(row: &Row<'_>, column: &str) -> rusqlite::Result<Option<Uuid>> {
    let raw: Option<String> = row.get(column)?;
    raw.map(|raw| Uuid::parse_str(&raw).map_err(|e| conversion_error(format!("{}: {}", column, e))))
        .transpose()
}

pub(crate) fn get_json<T: DeserializeOwned>(row: &Row<'_>, column: &str) -> rusqlite::Result<T> {
    let raw: String = row.get(column)?;
    serde_json::from_str(&raw).map_err(|e| conversion_error(format!("{}: {}", column, e)))
}

pub(crate) fn get_point(
    row: &Row<'_>,
    longitude: &str,
    latitude: &str,
) -> rusqlite::Result<Option<GeoPoint>> {
    let lng: Option<f64> = row.get(longitude)?;
    let lat: Option<f64> = row.get(latitude)?;
    Ok(match (lng, lat) {
        (Some(longitude), Some(latitude)) => Some(GeoPoint {
            longitude,
            latitude,
        }),
        _ => None,
    })
}

pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
    )
}
