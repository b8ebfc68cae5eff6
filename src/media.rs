//! Signed direct uploads to Cloudinary and avatar confirmation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use thiserror::Error;
use url::Url;
use validator::Validate;

use crate::error::{Result, ServerError};
use crate::user::{ProfileUpdate, UserService};

const SCHEME: &str = "cloudinary";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MediaUrlError {
    #[error("media url is not a valid URL")]
    Malformed,
    #[error("media url must use the `cloudinary://` scheme")]
    Scheme,
    #[error("media url must carry `<api_key>:<api_secret>@<cloud_name>`")]
    Credentials,
}

/// Signs upload parameters with the account secret.
#[derive(Clone)]
pub struct MediaSigner {
    api_key: String,
    api_secret: String,
    cloud_name: String,
}

impl std::fmt::Debug for MediaSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaSigner")
            .field("api_key", &self.api_key)
            .field("cloud_name", &self.cloud_name)
            .finish_non_exhaustive()
    }
}

impl MediaSigner {
    /// Parse `cloudinary://<api_key>:<api_secret>@<cloud_name>`.
    pub fn from_url(url: &str) -> std::result::Result<Self, MediaUrlError> {
        let url = Url::parse(url).map_err(|_| MediaUrlError::Malformed)?;
        if url.scheme() != SCHEME {
            return Err(MediaUrlError::Scheme);
        }

        let api_key = url.username();
        let api_secret = url.password().unwrap_or_default();
        let cloud_name = url.host_str().unwrap_or_default();
        if api_key.is_empty() || api_secret.is_empty() || cloud_name.is_empty() {
            return Err(MediaUrlError::Credentials);
        }

        Ok(Self {
            api_key: api_key.to_owned(),
            api_secret: api_secret.to_owned(),
            cloud_name: cloud_name.to_owned(),
        })
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn cloud_name(&self) -> &str {
        &self.cloud_name
    }

    /// SHA-1 of the sorted `k=v` pairs joined by `&`, followed by the secret.
    pub fn sign(&self, params: &BTreeMap<&str, String>) -> String {
        let payload = params
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join("&");

        let mut hasher = Sha1::new();
        hasher.update(payload.as_bytes());
        hasher.update(self.api_secret.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Signature for a client-side upload at `timestamp`.
    pub fn sign_upload(&self, request: &SignRequest, timestamp: i64) -> UploadSignature {
        let folder = request.folder.as_deref().filter(|f| !f.is_empty());
        let public_id = request.user_id.as_deref().filter(|id| !id.is_empty());

        let mut params = BTreeMap::from([("timestamp", timestamp.to_string())]);
        if let Some(folder) = folder {
            params.insert("folder", folder.to_owned());
        }
        if let Some(public_id) = public_id {
            params.insert("public_id", public_id.to_owned());
        }

        UploadSignature {
            signature: self.sign(&params),
            timestamp,
            api_key: self.api_key.clone(),
            cloud_name: self.cloud_name.clone(),
            public_id: public_id.unwrap_or_default().to_owned(),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignRequest {
    #[serde(default)]
    pub folder: Option<String>,
    #[serde(default, alias = "user_id")]
    pub user_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSignature {
    pub signature: String,
    pub timestamp: i64,
    pub api_key: String,
    pub cloud_name: String,
    pub public_id: String,
}

#[derive(Clone, Debug, Validate, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyAvatar {
    #[serde(alias = "public_id")]
    #[validate(length(min = 1, message = "Public ID is required."))]
    pub public_id: String,
    #[serde(alias = "avatar_url")]
    #[validate(url(message = "Avatar must be a valid URL."))]
    pub avatar_url: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AvatarUpdated {
    pub message: String,
    pub url: String,
}

/// Store a freshly uploaded avatar on the credential owner.
pub async fn verify_avatar(users: &UserService, credential: &str, request: VerifyAvatar) -> Result<AvatarUpdated> {
    request.validate()?;
    let user = users.current_user(credential).await?;

    let update = ProfileUpdate {
        avatar_url: Some(request.avatar_url.clone()),
        ..Default::default()
    };

    match users.update_profile(&user, &update).await {
        Ok(_) => Ok(AvatarUpdated {
            message: "Avatar updated successfully".to_owned(),
            url: request.avatar_url,
        }),
        Err(err) => {
            tracing::error!(
                user_id = %user.id,
                public_id = %request.public_id,
                error = %err,
                "avatar update failed, uploaded asset is left in media storage"
            );
            Err(err)
        },
    }
}

/// Error returned when no media account is configured.
pub fn not_configured() -> ServerError {
    ServerError::Internal {
        details: "media storage is not configured".to_owned(),
        source: None,
    }
}
