//! Follow graph routes.

use axum::extract::{Path, Query, State};
use axum::{Extension, Json};

use crate::follow::{FollowListResponse, FollowResponse, FollowStatus};
use crate::router::{Credential, PageQuery};
use crate::user::PublicProfile;
use crate::{AppState, ServerError};

pub async fn follow(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Extension(Credential(credential)): Extension<Credential>,
) -> Result<Json<FollowResponse>, ServerError> {
    Ok(Json(state.follows.follow(&credential, &user_id).await?))
}

pub async fn unfollow(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Extension(Credential(credential)): Extension<Credential>,
) -> Result<Json<FollowResponse>, ServerError> {
    Ok(Json(state.follows.unfollow(&credential, &user_id).await?))
}

pub async fn status(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Extension(Credential(credential)): Extension<Credential>,
) -> Result<Json<FollowStatus>, ServerError> {
    Ok(Json(state.follows.is_following(&credential, &user_id).await?))
}

pub async fn public_profile(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<PublicProfile>, ServerError> {
    Ok(Json(state.follows.public_profile(&user_id).await?))
}

pub async fn followers(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Json<FollowListResponse>, ServerError> {
    Ok(Json(state.follows.followers(&user_id, query.pagination()).await?))
}

pub async fn following(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Json<FollowListResponse>, ServerError> {
    Ok(Json(state.follows.following(&user_id, query.pagination()).await?))
}
