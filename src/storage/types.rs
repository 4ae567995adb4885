use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

// ============================================================================
// Error Types
// ============================================================================

/// Storage errors, classified so callers can tell expected conditions
/// (missing rows, duplicate keys) apart from real failures.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Another process holds a lock on the database file
    #[error("Database is locked by another process. Please close it and try again.")]
    InstanceLocked,

    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// The query matched no rows
    #[error("Record not found")]
    NotFound,

    /// A UNIQUE constraint rejected the write
    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    /// A stored value could not be converted back into a domain type
    #[error("Invalid stored value: {0}")]
    InvalidRow(String),

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[source] sqlx::Error),
}

impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DatabaseError::NotFound,
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                DatabaseError::UniqueViolation(db_err.message().to_string())
            }
            other => DatabaseError::Other(other),
        }
    }
}

impl DatabaseError {
    /// Classify a connection-time error, detecting SQLite lock conditions
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        if is_lock_message(&err.to_string()) {
            return DatabaseError::InstanceLocked;
        }
        DatabaseError::from(err)
    }

    pub fn is_unique_violation(&self) -> bool {
        matches!(self, DatabaseError::UniqueViolation(_))
    }
}

/// SQLITE_BUSY (5), SQLITE_LOCKED (6) and SQLITE_CANTOPEN (14) all surface
/// as one of these messages.
pub(crate) fn is_lock_message(message: &str) -> bool {
    let message = message.to_lowercase();
    message.contains("database is locked")
        || message.contains("database table is locked")
        || message.contains("sqlite_busy")
        || message.contains("sqlite_locked")
        || message.contains("unable to open database file")
}

// ============================================================================
// Timestamp Conversion
// ============================================================================

/// All timestamps are stored as Unix milliseconds.
pub(crate) fn to_millis(dt: DateTime<Utc>) -> i64 {
    dt.timestamp_millis()
}

pub(crate) fn from_millis(ms: i64) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| DatabaseError::InvalidRow(format!("timestamp out of range: {ms}")))
}

// ============================================================================
// Row Types
// ============================================================================

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct UserRow {
    pub id: i64,
    pub created_at: i64,
    pub updated_at: i64,
    pub name: String,
}

impl UserRow {
    pub(crate) fn into_user(self) -> Result<User, DatabaseError> {
        Ok(User {
            id: self.id,
            created_at: from_millis(self.created_at)?,
            updated_at: from_millis(self.updated_at)?,
            name: self.name,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct FeedRow {
    pub id: i64,
    pub created_at: i64,
    pub updated_at: i64,
    pub name: String,
    pub url: String,
    pub user_id: i64,
    pub last_fetched_at: Option<i64>,
}

impl FeedRow {
    pub(crate) fn into_feed(self) -> Result<Feed, DatabaseError> {
        Ok(Feed {
            id: self.id,
            created_at: from_millis(self.created_at)?,
            updated_at: from_millis(self.updated_at)?,
            name: self.name,
            url: self.url,
            user_id: self.user_id,
            last_fetched_at: self.last_fetched_at.map(from_millis).transpose()?,
        })
    }
}

/// Post ids are stored as hyphenated UUID text.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct PostRow {
    pub id: String,
    pub created_at: i64,
    pub updated_at: i64,
    pub title: String,
    pub url: String,
    pub description: Option<String>,
    pub published_at: Option<i64>,
    pub feed_id: i64,
}

impl PostRow {
    pub(crate) fn into_post(self) -> Result<Post, DatabaseError> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| DatabaseError::InvalidRow(format!("post id {:?}: {e}", self.id)))?;
        Ok(Post {
            id,
            created_at: from_millis(self.created_at)?,
            updated_at: from_millis(self.updated_at)?,
            title: self.title,
            url: self.url,
            description: self.description,
            published_at: self.published_at.map(from_millis).transpose()?,
            feed_id: self.feed_id,
        })
    }
}

// ============================================================================
// Data Structures
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub name: String,
}

/// A registered feed.
///
/// `last_fetched_at` is `None` until the feed is claimed for the first time;
/// such feeds are always polled before any feed that has been fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feed {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub name: String,
    pub url: String,
    pub user_id: i64,
    pub last_fetched_at: Option<DateTime<Utc>>,
}

/// A stored post. `url` is unique across all feeds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub title: String,
    pub url: String,
    pub description: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub feed_id: i64,
}

/// Fields for a post insert
#[derive(Debug, Clone)]
pub struct NewPost {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub title: String,
    pub url: String,
    pub description: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub feed_id: i64,
}
