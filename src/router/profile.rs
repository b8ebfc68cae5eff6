//! Profiles and user search.

use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use serde::Deserialize;

use crate::router::{Credential, PageQuery, Valid};
use crate::user::{Profile, ProfileDetails, ProfileUpdate, SearchResponse};
use crate::{AppState, ServerError};

pub async fn me(
    State(state): State<AppState>,
    Extension(Credential(credential)): Extension<Credential>,
) -> Result<Json<Profile>, ServerError> {
    Ok(Json(state.users.current_user(&credential).await?.profile()))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(Credential(credential)): Extension<Credential>,
    Valid(body): Valid<ProfileUpdate>,
) -> Result<Json<Profile>, ServerError> {
    let user = state.users.update_my_profile(&credential, body).await?;
    Ok(Json(user.profile()))
}

pub async fn get_by_id(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Profile>, ServerError> {
    Ok(Json(state.users.get_profile(&user_id).await?.profile()))
}

pub async fn update_by_id(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Extension(Credential(credential)): Extension<Credential>,
    Valid(body): Valid<ProfileUpdate>,
) -> Result<Json<Profile>, ServerError> {
    let user = state.users.update_owned_profile(&credential, &user_id, body).await?;
    Ok(Json(user.profile()))
}

pub async fn details(
    State(state): State<AppState>,
    Extension(Credential(credential)): Extension<Credential>,
) -> Result<Json<ProfileDetails>, ServerError> {
    Ok(Json(state.users.my_details(&credential).await?))
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    q: String,
    #[serde(flatten)]
    page: PageQuery,
}

pub async fn search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<SearchResponse>, ServerError> {
    Ok(Json(state.users.search(&query.q, query.page.pagination()).await?))
}
