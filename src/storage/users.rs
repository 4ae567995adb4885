use chrono::Utc;

use super::schema::Database;
use super::types::{to_millis, DatabaseError, User, UserRow};

impl Database {
    /// Register a user. A taken name is `DatabaseError::UniqueViolation`.
    pub async fn create_user(&self, name: &str) -> Result<User, DatabaseError> {
        let now = to_millis(Utc::now());
        let row: UserRow = sqlx::query_as(
            r#"
            INSERT INTO users (created_at, updated_at, name)
            VALUES (?, ?, ?)
            RETURNING id, created_at, updated_at, name
        "#,
        )
        .bind(now)
        .bind(now)
        .bind(name)
        .fetch_one(&self.pool)
        .await?;

        row.into_user()
    }

    pub async fn get_user_by_name(&self, name: &str) -> Result<User, DatabaseError> {
        let row: UserRow =
            sqlx::query_as("SELECT id, created_at, updated_at, name FROM users WHERE name = ?")
                .bind(name)
                .fetch_one(&self.pool)
                .await?;

        row.into_user()
    }
}
