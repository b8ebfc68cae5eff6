//! Account provisioning from an ID token.

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};

use crate::router::Credential;
use crate::user::Profile;
use crate::{AppState, ServerError};

/// Create the local account on first sight, return it otherwise.
pub async fn register(
    State(state): State<AppState>,
    Extension(Credential(credential)): Extension<Credential>,
) -> Result<(StatusCode, Json<Profile>), ServerError> {
    let (user, created) = state.users.register_or_login(&credential).await?;
    let status = if created { StatusCode::CREATED } else { StatusCode::OK };

    Ok((status, Json(user.profile())))
}

pub async fn login(
    State(state): State<AppState>,
    Extension(Credential(credential)): Extension<Credential>,
) -> Result<Json<Profile>, ServerError> {
    Ok(Json(state.users.login(&credential).await?.profile()))
}
