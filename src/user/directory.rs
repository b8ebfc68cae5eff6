//! User directory port.

use async_trait::async_trait;

use crate::error::Result;
use crate::id::ObjectId;
use crate::user::{ProfileUpdate, User};

/// Storage of user records.
///
/// Lookups return `Ok(None)` when nothing matches; `Err` is reserved for
/// storage faults. Counter updates are atomic at the storage layer and
/// return `false` when nothing was written (unknown user, or a decrement
/// that would go below zero).
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn get_by_id(&self, id: &ObjectId) -> Result<Option<User>>;

    /// Find a user by its identity provider subject.
    async fn get_by_external_identity(&self, firebase_uid: &str) -> Result<Option<User>>;

    /// Insert a new user. Duplicate identity, email or username is a
    /// [`crate::error::ServerError::Conflict`].
    async fn create(&self, user: &User) -> Result<()>;

    /// Update provided fields and return the stored user.
    async fn update_profile(&self, id: &ObjectId, update: &ProfileUpdate) -> Result<Option<User>>;

    async fn increment_followers(&self, id: &ObjectId) -> Result<bool>;

    async fn decrement_followers(&self, id: &ObjectId) -> Result<bool>;

    async fn increment_following(&self, id: &ObjectId) -> Result<bool>;

    async fn decrement_following(&self, id: &ObjectId) -> Result<bool>;

    async fn exists_email(&self, email: &str) -> Result<bool>;

    async fn exists_username(&self, username: &str) -> Result<bool>;

    /// Case-insensitive search on username and names, ordered by username.
    async fn search(&self, query: &str, skip: u64, limit: u64) -> Result<(Vec<User>, u64)>;

    /// Stable iteration over every user identifier.
    async fn ids(&self, skip: u64, limit: u64) -> Result<Vec<ObjectId>>;

    /// Overwrite both follow counters.
    async fn set_counters(&self, id: &ObjectId, followers: i64, following: i64) -> Result<()>;
}
