//! Directed follow graph between users.

mod memory;
pub mod reconcile;
mod repository;
mod service;
mod store;

pub use memory::*;
pub use reconcile::Reconciler;
pub use repository::*;
pub use service::*;
pub use store::*;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::ObjectId;
use crate::user::UserSummary;

/// Edge `follower_id -> following_id`. Edges are never updated, they only
/// exist or not.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowEdge {
    pub id: ObjectId,
    pub follower_id: ObjectId,
    pub following_id: ObjectId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FollowEdge {
    pub fn new(follower_id: ObjectId, following_id: ObjectId) -> Self {
        let now = Utc::now();
        Self {
            id: ObjectId::new(),
            follower_id,
            following_id,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Outcome of follow and unfollow commands.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowResponse {
    pub success: bool,
    pub message: String,
    pub is_following: bool,
}

impl FollowResponse {
    fn new(message: &str, is_following: bool) -> Self {
        Self {
            success: true,
            message: message.to_owned(),
            is_following,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowStatus {
    pub is_following: bool,
}

/// One page of followers or followed users.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowListResponse {
    pub users: Vec<UserSummary>,
    pub total: u64,
    pub page: u64,
    pub page_size: u64,
    pub total_pages: u64,
    /// Edges dropped because their user no longer exists.
    #[serde(skip)]
    pub skipped: usize,
}

/// Which side of the edges a listing walks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// Users following the subject.
    Followers,
    /// Users the subject follows.
    Following,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Followers => "followers",
            Direction::Following => "following",
        }
    }

    /// The endpoint of `edge` to show in the list.
    pub fn other_end(&self, edge: &FollowEdge) -> ObjectId {
        match self {
            Direction::Followers => edge.follower_id,
            Direction::Following => edge.following_id,
        }
    }
}
