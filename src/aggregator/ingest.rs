use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::AggregateError;
use crate::feed::{parse_pub_date, FetchedDocument};
use crate::storage::{Database, DatabaseError, Feed, NewPost};

/// Outcome of ingesting one document
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IngestReport {
    /// Posts inserted this cycle
    pub created: usize,
    /// Items whose URL was already stored
    pub skipped: usize,
}

/// Store the items of `document` as posts of `feed`, in document order.
///
/// An item whose URL already exists anywhere is skipped. Any other failure,
/// including an unparseable publication date, stops ingestion and is
/// returned; posts created before that point are kept.
pub async fn ingest(
    db: &Database,
    feed: &Feed,
    document: &FetchedDocument,
    now: DateTime<Utc>,
) -> Result<IngestReport, AggregateError> {
    let mut report = IngestReport::default();

    for item in &document.items {
        let published_at = parse_pub_date(&item.pub_date)?;

        let post = NewPost {
            id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            title: item.title.clone(),
            url: item.link.clone(),
            description: (!item.description.is_empty()).then(|| item.description.clone()),
            published_at: Some(published_at),
            feed_id: feed.id,
        };

        match db.create_post(&post).await {
            Ok(created) => {
                report.created += 1;
                tracing::debug!(feed_id = feed.id, title = %created.title, url = %created.url, "Post created");
            }
            Err(DatabaseError::UniqueViolation(_)) => {
                report.skipped += 1;
                tracing::debug!(feed_id = feed.id, url = %post.url, "Post already ingested, skipping");
            }
            Err(e) => return Err(AggregateError::Storage(e)),
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::FeedItem;
    use chrono::TimeZone;

    async fn setup() -> (Database, Feed) {
        let db = Database::open(":memory:").await.unwrap();
        let user = db.create_user("owner").await.unwrap();
        let feed = db
            .create_feed("Feed", "https://f.example.com/rss", user.id)
            .await
            .unwrap();
        (db, feed)
    }

    fn item(link: &str, description: &str, pub_date: &str) -> FeedItem {
        FeedItem {
            title: format!("Title for {link}"),
            link: link.to_string(),
            description: description.to_string(),
            pub_date: pub_date.to_string(),
        }
    }

    fn document(items: Vec<FeedItem>) -> FetchedDocument {
        FetchedDocument {
            title: "Feed".to_string(),
            description: String::new(),
            items,
        }
    }

    const DATE: &str = "Mon, 02 Jan 2006 15:04:05 GMT";

    #[tokio::test]
    async fn test_ingest_creates_posts_with_normalized_fields() {
        let (db, feed) = setup().await;
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let doc = document(vec![item("https://f.example.com/1", "Body", DATE)]);

        let report = ingest(&db, &feed, &doc, now).await.unwrap();
        assert_eq!(report, IngestReport { created: 1, skipped: 0 });

        let post = db.get_post_by_url("https://f.example.com/1").await.unwrap();
        assert_eq!(post.feed_id, feed.id);
        assert_eq!(post.title, "Title for https://f.example.com/1");
        assert_eq!(post.description.as_deref(), Some("Body"));
        assert_eq!(post.created_at, now);
        assert_eq!(post.updated_at, now);
        assert_eq!(
            post.published_at,
            Some(Utc.with_ymd_and_hms(2006, 1, 2, 15, 4, 5).unwrap())
        );
    }

    #[tokio::test]
    async fn test_empty_description_stored_as_absent() {
        let (db, feed) = setup().await;
        let doc = document(vec![item("https://f.example.com/1", "", DATE)]);

        ingest(&db, &feed, &doc, Utc::now()).await.unwrap();

        let post = db.get_post_by_url("https://f.example.com/1").await.unwrap();
        assert_eq!(post.description, None);
    }

    #[tokio::test]
    async fn test_repeated_url_in_one_document_ingested_once() {
        let (db, feed) = setup().await;
        let doc = document(vec![
            item("https://f.example.com/1", "original", DATE),
            item("https://f.example.com/1", "republished", DATE),
        ]);

        let report = ingest(&db, &feed, &doc, Utc::now()).await.unwrap();
        assert_eq!(report, IngestReport { created: 1, skipped: 1 });
        assert_eq!(db.count_posts().await.unwrap(), 1);

        let post = db.get_post_by_url("https://f.example.com/1").await.unwrap();
        assert_eq!(post.description.as_deref(), Some("original"));
    }

    #[tokio::test]
    async fn test_second_pass_skips_everything() {
        let (db, feed) = setup().await;
        let doc = document(vec![
            item("https://f.example.com/1", "a", DATE),
            item("https://f.example.com/2", "b", DATE),
        ]);

        ingest(&db, &feed, &doc, Utc::now()).await.unwrap();
        let report = ingest(&db, &feed, &doc, Utc::now()).await.unwrap();

        assert_eq!(report, IngestReport { created: 0, skipped: 2 });
        assert_eq!(db.count_posts().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_bad_date_aborts_after_earlier_items() {
        let (db, feed) = setup().await;
        let doc = document(vec![
            item("https://f.example.com/1", "a", DATE),
            item("https://f.example.com/2", "b", "not a date"),
            item("https://f.example.com/3", "c", DATE),
        ]);

        let err = ingest(&db, &feed, &doc, Utc::now()).await.unwrap_err();
        match err {
            AggregateError::Date(e) => assert_eq!(e.input, "not a date"),
            e => panic!("Expected Date error, got {:?}", e),
        }

        assert_eq!(db.count_posts().await.unwrap(), 1);
        assert!(db.get_post_by_url("https://f.example.com/3").await.is_err());
    }

    #[tokio::test]
    async fn test_feed_removed_mid_cycle_is_storage_error() {
        let (db, feed) = setup().await;
        db.reset().await.unwrap();
        let doc = document(vec![
            item("https://f.example.com/1", "a", DATE),
            item("https://f.example.com/2", "b", DATE),
        ]);

        let err = ingest(&db, &feed, &doc, Utc::now()).await.unwrap_err();
        match err {
            AggregateError::Storage(e) => assert!(!e.is_unique_violation()),
            e => panic!("Expected Storage error, got {:?}", e),
        }
        assert_eq!(db.count_posts().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_storage_failure_stops_remaining_items() {
        let (db, feed) = setup().await;
        sqlx::query(
            r#"
            CREATE TRIGGER reject_second_post BEFORE INSERT ON posts
            WHEN NEW.url = 'https://f.example.com/2'
            BEGIN SELECT RAISE(ABORT, 'rejected'); END
        "#,
        )
        .execute(&db.pool)
        .await
        .unwrap();
        let doc = document(vec![
            item("https://f.example.com/1", "a", DATE),
            item("https://f.example.com/2", "b", DATE),
            item("https://f.example.com/3", "c", DATE),
        ]);

        let err = ingest(&db, &feed, &doc, Utc::now()).await.unwrap_err();
        assert!(matches!(err, AggregateError::Storage(_)), "got {:?}", err);

        assert_eq!(db.count_posts().await.unwrap(), 1);
        assert!(db.get_post_by_url("https://f.example.com/1").await.is_ok());
        assert!(db.get_post_by_url("https://f.example.com/3").await.is_err());
    }
}
