//! Media upload routes.

use axum::extract::State;
use axum::{Extension, Json};

use crate::media::{self, AvatarUpdated, SignRequest, UploadSignature, VerifyAvatar};
use crate::router::{Credential, Valid};
use crate::{AppState, ServerError};

pub async fn sign(
    State(state): State<AppState>,
    Json(body): Json<SignRequest>,
) -> Result<Json<UploadSignature>, ServerError> {
    let signer = state.media.as_ref().ok_or_else(media::not_configured)?;
    let timestamp = chrono::Utc::now().timestamp();

    Ok(Json(signer.sign_upload(&body, timestamp)))
}

pub async fn verify_avatar(
    State(state): State<AppState>,
    Extension(Credential(credential)): Extension<Credential>,
    Valid(body): Valid<VerifyAvatar>,
) -> Result<Json<AvatarUpdated>, ServerError> {
    Ok(Json(media::verify_avatar(&state.users, &credential, body).await?))
}
