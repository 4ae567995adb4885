use super::schema::Database;
use super::types::{to_millis, DatabaseError, NewPost, Post, PostRow};

const POST_COLUMNS: &str =
    "id, created_at, updated_at, title, url, description, published_at, feed_id";

impl Database {
    // ========================================================================
    // Post Operations
    // ========================================================================

    /// Insert a post.
    ///
    /// There is deliberately no existence check: a URL that is already
    /// stored fails with `DatabaseError::UniqueViolation`, and the UNIQUE
    /// index is the only arbiter of duplicates across concurrent writers.
    pub async fn create_post(&self, post: &NewPost) -> Result<Post, DatabaseError> {
        let row: PostRow = sqlx::query_as(&format!(
            "INSERT INTO posts (id, created_at, updated_at, title, url, description, published_at, feed_id) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?) RETURNING {POST_COLUMNS}"
        ))
        .bind(post.id.to_string())
        .bind(to_millis(post.created_at))
        .bind(to_millis(post.updated_at))
        .bind(&post.title)
        .bind(&post.url)
        .bind(&post.description)
        .bind(post.published_at.map(to_millis))
        .bind(post.feed_id)
        .fetch_one(&self.pool)
        .await?;

        row.into_post()
    }

    /// Posts for a feed, most recently published first
    pub async fn get_posts_for_feed(&self, feed_id: i64) -> Result<Vec<Post>, DatabaseError> {
        let rows: Vec<PostRow> = sqlx::query_as(&format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE feed_id = ? \
             ORDER BY published_at DESC, created_at DESC"
        ))
        .bind(feed_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(PostRow::into_post).collect()
    }

    pub async fn get_post_by_url(&self, url: &str) -> Result<Post, DatabaseError> {
        let row: PostRow =
            sqlx::query_as(&format!("SELECT {POST_COLUMNS} FROM posts WHERE url = ?"))
                .bind(url)
                .fetch_one(&self.pool)
                .await?;

        row.into_post()
    }

    pub async fn count_posts(&self) -> Result<i64, DatabaseError> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM posts")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0)
    }
}
