//! Edge store port.

use async_trait::async_trait;

use crate::error::Result;
use crate::follow::FollowEdge;
use crate::id::ObjectId;

/// Storage of follow edges.
///
/// Implementations MUST enforce uniqueness of the
/// `(follower_id, following_id)` pair. Listings are ordered by creation
/// time, most recent first.
#[async_trait]
pub trait EdgeStore: Send + Sync {
    /// Insert an edge. `None` when the pair already exists.
    async fn create(&self, follower_id: &ObjectId, following_id: &ObjectId) -> Result<Option<FollowEdge>>;

    /// Remove an edge. `false` when it did not exist.
    async fn delete(&self, follower_id: &ObjectId, following_id: &ObjectId) -> Result<bool>;

    async fn get(&self, follower_id: &ObjectId, following_id: &ObjectId) -> Result<Option<FollowEdge>>;

    /// Edges pointing to `user_id`, with their total.
    async fn list_by_following(&self, user_id: &ObjectId, skip: u64, limit: u64) -> Result<(Vec<FollowEdge>, u64)>;

    /// Edges leaving `user_id`, with their total.
    async fn list_by_follower(&self, user_id: &ObjectId, skip: u64, limit: u64) -> Result<(Vec<FollowEdge>, u64)>;

    /// `(followers, following)` cardinalities of `user_id`.
    async fn counts(&self, user_id: &ObjectId) -> Result<(u64, u64)>;
}
