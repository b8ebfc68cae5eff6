use std::sync::Arc;

use crate::error::{Result, ServerError};
use crate::follow::{Direction, EdgeStore, FollowListResponse, FollowResponse, FollowStatus};
use crate::id::ObjectId;
use crate::pagination::Pagination;
use crate::token::IdentityVerifier;
use crate::user::{PublicProfile, USER_NOT_FOUND, User, UserDirectory};

pub const FOLLOWED: &str = "Successfully followed user";
pub const ALREADY_FOLLOWING: &str = "Already following this user";
pub const UNFOLLOWED: &str = "Successfully unfollowed user";
pub const NOT_FOLLOWING: &str = "Not following this user";

const CURRENT_USER_NOT_FOUND: &str = "current user not found";
const TARGET_USER_NOT_FOUND: &str = "target user not found";
const INVALID_TARGET_ID: &str = "invalid target user ID";
const INVALID_USER_ID: &str = "invalid user ID";
const SELF_FOLLOW: &str = "cannot follow yourself";

/// Sole writer of follow edges and of the counters derived from them.
///
/// Edge writes happen before counter writes. A failed counter write is
/// logged and returned, the edge mutation stays; see
/// [`Reconciler`](crate::follow::Reconciler) for the repair path.
#[derive(Clone)]
pub struct FollowService {
    verifier: Arc<dyn IdentityVerifier>,
    users: Arc<dyn UserDirectory>,
    edges: Arc<dyn EdgeStore>,
}

impl FollowService {
    /// Create a new [`FollowService`].
    pub fn new(verifier: Arc<dyn IdentityVerifier>, users: Arc<dyn UserDirectory>, edges: Arc<dyn EdgeStore>) -> Self {
        Self { verifier, users, edges }
    }

    async fn acting_user(&self, credential: &str) -> Result<User> {
        let identity = self.verifier.verify(credential).await?;
        self.users
            .get_by_external_identity(&identity.subject)
            .await?
            .ok_or(ServerError::NotFound(CURRENT_USER_NOT_FOUND))
    }

    /// Make the credential owner follow `target_id`. Idempotent.
    pub async fn follow(&self, credential: &str, target_id: &str) -> Result<FollowResponse> {
        let acting = self.acting_user(credential).await?;
        let target_id = ObjectId::parse(target_id).map_err(|_| ServerError::InvalidInput(INVALID_TARGET_ID))?;

        if acting.id == target_id {
            return Err(ServerError::InvalidInput(SELF_FOLLOW));
        }

        let target = self
            .users
            .get_by_id(&target_id)
            .await?
            .ok_or(ServerError::NotFound(TARGET_USER_NOT_FOUND))?;

        if self.edges.get(&acting.id, &target.id).await?.is_some() {
            return Ok(FollowResponse::new(ALREADY_FOLLOWING, true));
        }

        // a concurrent request inserted the same pair first.
        if self.edges.create(&acting.id, &target.id).await?.is_none() {
            return Ok(FollowResponse::new(ALREADY_FOLLOWING, true));
        }

        self.apply_counters(&acting.id, &target.id, true).await?;

        tracing::debug!(follower = %acting.id, following = %target.id, "user followed");
        Ok(FollowResponse::new(FOLLOWED, true))
    }

    /// Make the credential owner stop following `target_id`. Idempotent.
    pub async fn unfollow(&self, credential: &str, target_id: &str) -> Result<FollowResponse> {
        let acting = self.acting_user(credential).await?;
        let target_id = ObjectId::parse(target_id).map_err(|_| ServerError::InvalidInput(INVALID_TARGET_ID))?;

        if self.edges.get(&acting.id, &target_id).await?.is_none() {
            return Ok(FollowResponse::new(NOT_FOLLOWING, false));
        }

        if !self.edges.delete(&acting.id, &target_id).await? {
            return Ok(FollowResponse::new(NOT_FOLLOWING, false));
        }

        self.apply_counters(&acting.id, &target_id, false).await?;

        tracing::debug!(follower = %acting.id, following = %target_id, "user unfollowed");
        Ok(FollowResponse::new(UNFOLLOWED, false))
    }

    /// Update both counters after an edge mutation.
    async fn apply_counters(&self, follower: &ObjectId, following: &ObjectId, followed: bool) -> Result<()> {
        let result = if followed {
            self.increment(follower, following).await
        } else {
            self.decrement(follower, following).await
        };

        result.inspect_err(|err| {
            tracing::error!(
                %follower,
                %following,
                followed,
                error = %err,
                "counter update failed after edge mutation, counters drifted"
            )
        })
    }

    async fn increment(&self, follower: &ObjectId, following: &ObjectId) -> Result<()> {
        if !self.users.increment_followers(following).await? {
            tracing::warn!(user_id = %following, "followers counter not incremented, user is missing");
        }
        if !self.users.increment_following(follower).await? {
            tracing::warn!(user_id = %follower, "following counter not incremented, user is missing");
        }
        Ok(())
    }

    async fn decrement(&self, follower: &ObjectId, following: &ObjectId) -> Result<()> {
        if !self.users.decrement_followers(following).await? {
            tracing::warn!(user_id = %following, "followers counter already at zero, clamped");
        }
        if !self.users.decrement_following(follower).await? {
            tracing::warn!(user_id = %follower, "following counter already at zero, clamped");
        }
        Ok(())
    }

    /// Whether the credential owner follows `target_id`.
    pub async fn is_following(&self, credential: &str, target_id: &str) -> Result<FollowStatus> {
        let acting = self.acting_user(credential).await?;
        let target_id = ObjectId::parse(target_id).map_err(|_| ServerError::InvalidInput(INVALID_TARGET_ID))?;

        Ok(FollowStatus {
            is_following: self.edges.get(&acting.id, &target_id).await?.is_some(),
        })
    }

    /// Public profile of any user, with both counters.
    pub async fn public_profile(&self, user_id: &str) -> Result<PublicProfile> {
        let user_id = ObjectId::parse(user_id).map_err(|_| ServerError::InvalidInput(INVALID_USER_ID))?;

        self.users
            .get_by_id(&user_id)
            .await?
            .map(|user| user.public_profile())
            .ok_or(ServerError::NotFound(USER_NOT_FOUND))
    }

    /// Users following `user_id`, newest first.
    pub async fn followers(&self, user_id: &str, pagination: Pagination) -> Result<FollowListResponse> {
        self.list(user_id, pagination, Direction::Followers).await
    }

    /// Users followed by `user_id`, newest first.
    pub async fn following(&self, user_id: &str, pagination: Pagination) -> Result<FollowListResponse> {
        self.list(user_id, pagination, Direction::Following).await
    }

    async fn list(&self, user_id: &str, pagination: Pagination, direction: Direction) -> Result<FollowListResponse> {
        let user_id = ObjectId::parse(user_id).map_err(|_| ServerError::InvalidInput(INVALID_USER_ID))?;
        let (skip, limit) = (pagination.skip(), pagination.limit());

        let (edges, total) = match direction {
            Direction::Followers => self.edges.list_by_following(&user_id, skip, limit).await?,
            Direction::Following => self.edges.list_by_follower(&user_id, skip, limit).await?,
        };

        let mut users = Vec::with_capacity(edges.len());
        let mut skipped = 0;
        for edge in &edges {
            let other = direction.other_end(edge);
            match self.users.get_by_id(&other).await? {
                Some(user) => users.push(user.summary()),
                None => {
                    skipped += 1;
                    tracing::warn!(edge_id = %edge.id, user_id = %other, list = direction.as_str(), "orphaned follow edge skipped");
                    metrics::counter!("follow_list_orphans_total", "list" => direction.as_str()).increment(1);
                },
            }
        }

        Ok(FollowListResponse {
            users,
            total,
            page: pagination.page,
            page_size: pagination.page_size,
            total_pages: pagination.total_pages(total),
            skipped,
        })
    }
}
