use chrono::{DateTime, Utc};

use super::AggregateError;
use crate::storage::{Database, DatabaseError, Feed};

/// Claim the feed to poll this cycle.
///
/// The feed is stamped as fetched at `now` before any network traffic, so a
/// feed whose fetch stalls or fails still yields its turn to the others.
pub async fn select_feed(db: &Database, now: DateTime<Utc>) -> Result<Feed, AggregateError> {
    match db.claim_next_feed(now).await {
        Ok(feed) => {
            tracing::debug!(feed_id = feed.id, url = %feed.url, "Claimed feed");
            Ok(feed)
        }
        Err(DatabaseError::NotFound) => Err(AggregateError::NoFeeds),
        Err(e) => Err(AggregateError::Storage(e)),
    }
}
