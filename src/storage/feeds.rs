use chrono::{DateTime, Utc};

use super::schema::Database;
use super::types::{to_millis, DatabaseError, Feed, FeedRow};

const FEED_COLUMNS: &str = "id, created_at, updated_at, name, url, user_id, last_fetched_at";

impl Database {
    // ========================================================================
    // Feed Operations
    // ========================================================================

    /// Register a feed owned by `user_id`.
    ///
    /// A URL that is already registered is `DatabaseError::UniqueViolation`.
    pub async fn create_feed(
        &self,
        name: &str,
        url: &str,
        user_id: i64,
    ) -> Result<Feed, DatabaseError> {
        let now = to_millis(Utc::now());
        let row: FeedRow = sqlx::query_as(&format!(
            "INSERT INTO feeds (created_at, updated_at, name, url, user_id) \
             VALUES (?, ?, ?, ?, ?) RETURNING {FEED_COLUMNS}"
        ))
        .bind(now)
        .bind(now)
        .bind(name)
        .bind(url)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        row.into_feed()
    }

    pub async fn get_feed(&self, feed_id: i64) -> Result<Feed, DatabaseError> {
        let row: FeedRow = sqlx::query_as(&format!("SELECT {FEED_COLUMNS} FROM feeds WHERE id = ?"))
            .bind(feed_id)
            .fetch_one(&self.pool)
            .await?;

        row.into_feed()
    }

    /// All feeds ordered by id
    pub async fn list_feeds(&self) -> Result<Vec<Feed>, DatabaseError> {
        let rows: Vec<FeedRow> =
            sqlx::query_as(&format!("SELECT {FEED_COLUMNS} FROM feeds ORDER BY id"))
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter().map(FeedRow::into_feed).collect()
    }

    // ========================================================================
    // Fetch Claiming
    // ========================================================================

    /// Select the feed that has waited longest and stamp it as fetched, in a
    /// single statement.
    ///
    /// Never-fetched feeds come first, then the oldest `last_fetched_at`,
    /// ties broken by id. Doing the select and the stamp in one `UPDATE`
    /// means two aggregators sharing this database can never claim the same
    /// feed for the same round.
    ///
    /// The stamp is `now`, raised to one millisecond past the newest existing
    /// stamp when the clock has not moved past it. Claims are therefore
    /// strictly ordered and every other feed is visited before a feed comes
    /// around again. A stamp left in the future by clock skew pulls later
    /// stamps along only until the wall clock passes it.
    ///
    /// # Errors
    ///
    /// `DatabaseError::NotFound` when no feeds are registered.
    pub async fn claim_next_feed(&self, now: DateTime<Utc>) -> Result<Feed, DatabaseError> {
        let now = to_millis(now);
        let row: FeedRow = sqlx::query_as(&format!(
            r#"
            UPDATE feeds
            SET last_fetched_at = MAX(?, COALESCE((SELECT MAX(last_fetched_at) FROM feeds), ?) + 1),
                updated_at = ?
            WHERE id = (
                SELECT id FROM feeds
                ORDER BY last_fetched_at IS NOT NULL, last_fetched_at, id
                LIMIT 1
            )
            RETURNING {FEED_COLUMNS}
        "#
        ))
        .bind(now)
        .bind(now - 1)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        row.into_feed()
    }
}

#[cfg(test)]
mod tests {
    use crate::storage::{Database, DatabaseError};
    use chrono::{Duration, TimeZone, Utc};

    async fn test_db() -> (Database, i64) {
        let db = Database::open(":memory:").await.unwrap();
        let user = db.create_user("owner").await.unwrap();
        (db, user.id)
    }

    #[tokio::test]
    async fn test_create_feed() {
        let (db, user_id) = test_db().await;
        let feed = db
            .create_feed("Example", "https://example.com/rss", user_id)
            .await
            .unwrap();

        assert_eq!(feed.name, "Example");
        assert_eq!(feed.url, "https://example.com/rss");
        assert_eq!(feed.user_id, user_id);
        assert!(feed.last_fetched_at.is_none());
        assert_eq!(db.get_feed(feed.id).await.unwrap(), feed);
    }

    #[tokio::test]
    async fn test_duplicate_feed_url_rejected() {
        let (db, user_id) = test_db().await;
        db.create_feed("One", "https://example.com/rss", user_id)
            .await
            .unwrap();

        let err = db
            .create_feed("Two", "https://example.com/rss", user_id)
            .await
            .unwrap_err();
        assert!(err.is_unique_violation());
        assert_eq!(db.list_feeds().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_claim_with_no_feeds_is_not_found() {
        let (db, _) = test_db().await;
        let err = db.claim_next_feed(Utc::now()).await.unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound));
    }

    #[tokio::test]
    async fn test_claim_prefers_never_fetched_then_id() {
        let (db, user_id) = test_db().await;
        let a = db.create_feed("A", "https://a.example.com/rss", user_id).await.unwrap();
        let b = db.create_feed("B", "https://b.example.com/rss", user_id).await.unwrap();

        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let first = db.claim_next_feed(now).await.unwrap();
        assert_eq!(first.id, a.id);
        assert_eq!(first.last_fetched_at, Some(now));

        // A has been stamped, B never fetched: B wins even though the clock went back
        let second = db.claim_next_feed(now - Duration::hours(1)).await.unwrap();
        assert_eq!(second.id, b.id);
    }

    #[tokio::test]
    async fn test_claim_picks_oldest_stamp() {
        let (db, user_id) = test_db().await;
        let a = db.create_feed("A", "https://a.example.com/rss", user_id).await.unwrap();
        let b = db.create_feed("B", "https://b.example.com/rss", user_id).await.unwrap();
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        db.claim_next_feed(t0).await.unwrap();
        db.claim_next_feed(t0 + Duration::minutes(1)).await.unwrap();

        let third = db.claim_next_feed(t0 + Duration::minutes(2)).await.unwrap();
        assert_eq!(third.id, a.id);
        let fourth = db.claim_next_feed(t0 + Duration::minutes(3)).await.unwrap();
        assert_eq!(fourth.id, b.id);
    }

    #[tokio::test]
    async fn test_claim_stamps_strictly_increase_when_clock_stalls() {
        let (db, user_id) = test_db().await;
        db.create_feed("A", "https://a.example.com/rss", user_id).await.unwrap();
        db.create_feed("B", "https://b.example.com/rss", user_id).await.unwrap();
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        let first = db.claim_next_feed(now).await.unwrap();
        let second = db.claim_next_feed(now).await.unwrap();

        assert_ne!(first.id, second.id);
        assert_eq!(
            second.last_fetched_at,
            Some(now + Duration::milliseconds(1))
        );
    }

    #[tokio::test]
    async fn test_claim_stamps_return_to_wall_clock_after_skew() {
        let (db, user_id) = test_db().await;
        db.create_feed("A", "https://a.example.com/rss", user_id).await.unwrap();
        db.create_feed("B", "https://b.example.com/rss", user_id).await.unwrap();
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        // Skewed clock leaves a stamp ten minutes ahead
        db.claim_next_feed(now + Duration::minutes(10)).await.unwrap();
        let dragged = db.claim_next_feed(now).await.unwrap();
        assert_eq!(
            dragged.last_fetched_at,
            Some(now + Duration::minutes(10) + Duration::milliseconds(1))
        );

        let later = now + Duration::minutes(11);
        let recovered = db.claim_next_feed(later).await.unwrap();
        assert_eq!(recovered.last_fetched_at, Some(later));
    }
}
