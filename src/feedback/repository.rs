//! Handle database requests for feedback.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};

use crate::error::{Result, ServerError};
use crate::feedback::{Feedback, FeedbackFilter, FeedbackStore};
use crate::id::ObjectId;

const FEEDBACK_COLUMNS: &str =
    "id, username, avatar_url, attachment_urls, comment, categories, resolved, created_at, updated_at";

// `$1` username pattern or NULL, `$2` categories (empty matches all).
const FILTER: &str = "($1::TEXT IS NULL OR username ILIKE $1) \
     AND (cardinality($2::TEXT[]) = 0 OR categories && $2::TEXT[])";

#[derive(sqlx::FromRow)]
struct FeedbackRow {
    id: String,
    username: String,
    avatar_url: Option<String>,
    attachment_urls: Vec<String>,
    comment: String,
    categories: Vec<String>,
    resolved: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<FeedbackRow> for Feedback {
    type Error = ServerError;

    fn try_from(row: FeedbackRow) -> Result<Self> {
        Ok(Feedback {
            id: ObjectId::parse(&row.id).map_err(|err| ServerError::internal("corrupted feedback id", err))?,
            username: row.username,
            avatar_url: row.avatar_url,
            attachment_urls: row.attachment_urls,
            comment: row.comment,
            categories: row.categories,
            resolved: row.resolved,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn username_pattern(username: &str) -> String {
    let escaped: String = username
        .chars()
        .flat_map(|c| match c {
            '%' | '_' | '\\' => vec!['\\', c],
            c => vec![c],
        })
        .collect();
    format!("%{escaped}%")
}

#[derive(Clone)]
pub struct PostgresFeedbackStore {
    pool: Pool<Postgres>,
}

impl PostgresFeedbackStore {
    /// Create a new [`PostgresFeedbackStore`].
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FeedbackStore for PostgresFeedbackStore {
    async fn create(&self, feedback: &Feedback) -> Result<()> {
        sqlx::query(&format!(
            "INSERT INTO feedbacks ({FEEDBACK_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"
        ))
        .bind(feedback.id.to_string())
        .bind(&feedback.username)
        .bind(&feedback.avatar_url)
        .bind(&feedback.attachment_urls)
        .bind(&feedback.comment)
        .bind(&feedback.categories)
        .bind(feedback.resolved)
        .bind(feedback.created_at)
        .bind(feedback.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list(&self, filter: &FeedbackFilter, skip: u64, limit: u64) -> Result<(Vec<Feedback>, u64)> {
        let pattern = filter.username.as_deref().map(username_pattern);

        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ")
            .execute(&mut *tx)
            .await?;

        let total = sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM feedbacks WHERE {FILTER}"))
            .bind(&pattern)
            .bind(&filter.categories)
            .fetch_one(&mut *tx)
            .await?;

        let rows = sqlx::query_as::<_, FeedbackRow>(&format!(
            "SELECT {FEEDBACK_COLUMNS} FROM feedbacks WHERE {FILTER} \
             ORDER BY created_at DESC, id DESC LIMIT $3 OFFSET $4"
        ))
        .bind(&pattern)
        .bind(&filter.categories)
        .bind(limit as i64)
        .bind(skip as i64)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        let feedbacks = rows.into_iter().map(Feedback::try_from).collect::<Result<Vec<_>>>()?;
        Ok((feedbacks, total.max(0) as u64))
    }

    async fn set_resolved(&self, id: &ObjectId, resolved: bool) -> Result<bool> {
        let result = sqlx::query("UPDATE feedbacks SET resolved = $2, updated_at = NOW() WHERE id = $1")
            .bind(id.to_string())
            .bind(resolved)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_username_pattern() {
        assert_eq!(username_pattern("rally"), "%rally%");
        assert_eq!(username_pattern("a_b"), "%a\\_b%");
    }
}
