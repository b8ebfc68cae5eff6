//! Handle database requests for follow edges.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};

use crate::error::{Result, ServerError};
use crate::follow::{EdgeStore, FollowEdge};
use crate::id::ObjectId;

const EDGE_COLUMNS: &str = "id, follower_id, following_id, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct EdgeRow {
    id: String,
    follower_id: String,
    following_id: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn parse(id: &str) -> Result<ObjectId> {
    ObjectId::parse(id).map_err(|err| ServerError::internal("corrupted follow edge", err))
}

impl TryFrom<EdgeRow> for FollowEdge {
    type Error = ServerError;

    fn try_from(row: EdgeRow) -> Result<Self> {
        Ok(FollowEdge {
            id: parse(&row.id)?,
            follower_id: parse(&row.follower_id)?,
            following_id: parse(&row.following_id)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Clone)]
pub struct PostgresEdgeStore {
    pool: Pool<Postgres>,
}

impl PostgresEdgeStore {
    /// Create a new [`PostgresEdgeStore`].
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Read count and page from one snapshot.
    async fn list(&self, column: &str, user_id: &ObjectId, skip: u64, limit: u64) -> Result<(Vec<FollowEdge>, u64)> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ")
            .execute(&mut *tx)
            .await?;

        let total = sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM follows WHERE {column} = $1"))
            .bind(user_id.to_string())
            .fetch_one(&mut *tx)
            .await?;

        let rows = sqlx::query_as::<_, EdgeRow>(&format!(
            "SELECT {EDGE_COLUMNS} FROM follows WHERE {column} = $1 \
             ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3"
        ))
        .bind(user_id.to_string())
        .bind(limit as i64)
        .bind(skip as i64)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        let edges = rows.into_iter().map(FollowEdge::try_from).collect::<Result<Vec<_>>>()?;
        Ok((edges, total.max(0) as u64))
    }
}

#[async_trait]
impl EdgeStore for PostgresEdgeStore {
    async fn create(&self, follower_id: &ObjectId, following_id: &ObjectId) -> Result<Option<FollowEdge>> {
        let edge = FollowEdge::new(*follower_id, *following_id);

        let row = sqlx::query_as::<_, EdgeRow>(&format!(
            r#"INSERT INTO follows ({EDGE_COLUMNS}) VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (follower_id, following_id) DO NOTHING
                RETURNING {EDGE_COLUMNS}"#
        ))
        .bind(edge.id.to_string())
        .bind(edge.follower_id.to_string())
        .bind(edge.following_id.to_string())
        .bind(edge.created_at)
        .bind(edge.updated_at)
        .fetch_optional(&self.pool)
        .await?;

        row.map(FollowEdge::try_from).transpose()
    }

    async fn delete(&self, follower_id: &ObjectId, following_id: &ObjectId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM follows WHERE follower_id = $1 AND following_id = $2")
            .bind(follower_id.to_string())
            .bind(following_id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn get(&self, follower_id: &ObjectId, following_id: &ObjectId) -> Result<Option<FollowEdge>> {
        sqlx::query_as::<_, EdgeRow>(&format!(
            "SELECT {EDGE_COLUMNS} FROM follows WHERE follower_id = $1 AND following_id = $2"
        ))
        .bind(follower_id.to_string())
        .bind(following_id.to_string())
        .fetch_optional(&self.pool)
        .await?
        .map(FollowEdge::try_from)
        .transpose()
    }

    async fn list_by_following(&self, user_id: &ObjectId, skip: u64, limit: u64) -> Result<(Vec<FollowEdge>, u64)> {
        self.list("following_id", user_id, skip, limit).await
    }

    async fn list_by_follower(&self, user_id: &ObjectId, skip: u64, limit: u64) -> Result<(Vec<FollowEdge>, u64)> {
        self.list("follower_id", user_id, skip, limit).await
    }

    async fn counts(&self, user_id: &ObjectId) -> Result<(u64, u64)> {
        let (followers, following) = sqlx::query_as::<_, (i64, i64)>(
            r#"SELECT
                (SELECT COUNT(*) FROM follows WHERE following_id = $1),
                (SELECT COUNT(*) FROM follows WHERE follower_id = $1)"#,
        )
        .bind(user_id.to_string())
        .fetch_one(&self.pool)
        .await?;

        Ok((followers.max(0) as u64, following.max(0) as u64))
    }
}
