//! Handle database requests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};

use crate::error::{Result, ServerError};
use crate::id::ObjectId;
use crate::user::{ProfileUpdate, User, UserDirectory};

const USER_COLUMNS: &str = "id, firebase_uid, email, username, first_name, last_name, avatar_url, bio_text, \
     followers_count, following_count, is_active, is_email_verified, is_onboarding, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct UserRow {
    id: String,
    firebase_uid: String,
    email: String,
    username: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    avatar_url: Option<String>,
    bio_text: Option<String>,
    followers_count: i64,
    following_count: i64,
    is_active: bool,
    is_email_verified: bool,
    is_onboarding: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = ServerError;

    fn try_from(row: UserRow) -> Result<Self> {
        Ok(User {
            id: ObjectId::parse(&row.id).map_err(|err| ServerError::internal("corrupted user id", err))?,
            firebase_uid: row.firebase_uid,
            email: row.email,
            username: row.username,
            first_name: row.first_name,
            last_name: row.last_name,
            avatar_url: row.avatar_url,
            bio_text: row.bio_text,
            followers_count: row.followers_count,
            following_count: row.following_count,
            is_active: row.is_active,
            is_email_verified: row.is_email_verified,
            is_onboarding: row.is_onboarding,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Translate unique violations into conflicts.
fn conflict(err: sqlx::Error) -> ServerError {
    let constraint = err
        .as_database_error()
        .filter(|e| e.is_unique_violation())
        .map(|e| e.constraint().unwrap_or_default().to_owned());

    match constraint.as_deref() {
        Some("users_username_key") => ServerError::Conflict("username already taken"),
        Some("users_email_key") => ServerError::Conflict("email already registered"),
        Some(_) => ServerError::Conflict("user already registered"),
        None => ServerError::Sql(err),
    }
}

/// Escape `LIKE` wildcards.
fn like_pattern(query: &str) -> String {
    let mut pattern = String::with_capacity(query.len() + 2);
    pattern.push('%');
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[derive(Clone)]
pub struct PostgresUserDirectory {
    pool: Pool<Postgres>,
}

impl PostgresUserDirectory {
    /// Create a new [`PostgresUserDirectory`].
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    async fn find_by(&self, field: Field, value: &str) -> Result<Option<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE {field} = $1");

        sqlx::query_as::<_, UserRow>(&query)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn exists(&self, field: Field, value: &str) -> Result<bool> {
        let query = format!("SELECT EXISTS(SELECT 1 FROM users WHERE {field} = $1)");

        Ok(sqlx::query_scalar::<_, bool>(&query)
            .bind(value)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn add(&self, id: &ObjectId, field: Field, delta: i64) -> Result<bool> {
        // a decrement only applies while the counter is positive.
        let query = format!(
            "UPDATE users SET {field} = {field} + $2, updated_at = NOW() \
             WHERE id = $1 AND {field} + $2 >= 0"
        );

        let result = sqlx::query(&query)
            .bind(id.to_string())
            .bind(delta)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl UserDirectory for PostgresUserDirectory {
    async fn get_by_id(&self, id: &ObjectId) -> Result<Option<User>> {
        self.find_by(Field::Id, &id.to_string()).await
    }

    async fn get_by_external_identity(&self, firebase_uid: &str) -> Result<Option<User>> {
        self.find_by(Field::FirebaseUid, firebase_uid).await
    }

    async fn create(&self, user: &User) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO users (id, firebase_uid, email, username, first_name, last_name, avatar_url,
                bio_text, is_active, is_email_verified, is_onboarding, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)"#,
        )
        .bind(user.id.to_string())
        .bind(&user.firebase_uid)
        .bind(&user.email)
        .bind(&user.username)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.avatar_url)
        .bind(&user.bio_text)
        .bind(user.is_active)
        .bind(user.is_email_verified)
        .bind(user.is_onboarding)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(conflict)?;

        Ok(())
    }

    async fn update_profile(&self, id: &ObjectId, update: &ProfileUpdate) -> Result<Option<User>> {
        let query = format!(
            r#"UPDATE users SET
                username = COALESCE($2, username),
                first_name = COALESCE($3, first_name),
                last_name = COALESCE($4, last_name),
                avatar_url = COALESCE($5, avatar_url),
                bio_text = COALESCE($6, bio_text),
                is_onboarding = COALESCE($7, is_onboarding),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}"#
        );

        sqlx::query_as::<_, UserRow>(&query)
            .bind(id.to_string())
            .bind(&update.username)
            .bind(&update.first_name)
            .bind(&update.last_name)
            .bind(&update.avatar_url)
            .bind(&update.bio_text)
            .bind(update.is_onboarding)
            .fetch_optional(&self.pool)
            .await
            .map_err(conflict)?
            .map(User::try_from)
            .transpose()
    }

    async fn increment_followers(&self, id: &ObjectId) -> Result<bool> {
        self.add(id, Field::FollowersCount, 1).await
    }

    async fn decrement_followers(&self, id: &ObjectId) -> Result<bool> {
        self.add(id, Field::FollowersCount, -1).await
    }

    async fn increment_following(&self, id: &ObjectId) -> Result<bool> {
        self.add(id, Field::FollowingCount, 1).await
    }

    async fn decrement_following(&self, id: &ObjectId) -> Result<bool> {
        self.add(id, Field::FollowingCount, -1).await
    }

    async fn exists_email(&self, email: &str) -> Result<bool> {
        self.exists(Field::Email, &email.to_lowercase()).await
    }

    async fn exists_username(&self, username: &str) -> Result<bool> {
        self.exists(Field::Username, username).await
    }

    async fn search(&self, query: &str, skip: u64, limit: u64) -> Result<(Vec<User>, u64)> {
        let pattern = like_pattern(query);
        let filter = "username ILIKE $1 OR first_name ILIKE $1 OR last_name ILIKE $1";

        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ")
            .execute(&mut *tx)
            .await?;

        let total = sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM users WHERE {filter}"))
            .bind(&pattern)
            .fetch_one(&mut *tx)
            .await?;

        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE {filter} ORDER BY username ASC, id ASC LIMIT $2 OFFSET $3"
        ))
        .bind(&pattern)
        .bind(limit as i64)
        .bind(skip as i64)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        let users = rows.into_iter().map(User::try_from).collect::<Result<Vec<_>>>()?;
        Ok((users, total.max(0) as u64))
    }

    async fn ids(&self, skip: u64, limit: u64) -> Result<Vec<ObjectId>> {
        let ids = sqlx::query_scalar::<_, String>("SELECT id FROM users ORDER BY id ASC LIMIT $1 OFFSET $2")
            .bind(limit as i64)
            .bind(skip as i64)
            .fetch_all(&self.pool)
            .await?;

        ids.iter()
            .map(|id| ObjectId::parse(id).map_err(|err| ServerError::internal("corrupted user id", err)))
            .collect()
    }

    async fn set_counters(&self, id: &ObjectId, followers: i64, following: i64) -> Result<()> {
        sqlx::query(
            r#"UPDATE users SET followers_count = $2, following_count = $3, updated_at = NOW()
                WHERE id = $1"#,
        )
        .bind(id.to_string())
        .bind(followers)
        .bind(following)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
enum Field {
    Id,
    FirebaseUid,
    Email,
    Username,
    FollowersCount,
    FollowingCount,
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Field::Id => write!(f, "id"),
            Field::FirebaseUid => write!(f, "firebase_uid"),
            Field::Email => write!(f, "email"),
            Field::Username => write!(f, "username"),
            Field::FollowersCount => write!(f, "followers_count"),
            Field::FollowingCount => write!(f, "following_count"),
        }
    }
}
