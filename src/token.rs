//! Verify ID tokens issued by the identity provider.

use std::collections::HashMap;
use std::str::FromStr;

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use serde::{Deserialize, Serialize};

use crate::config;
use crate::error::{Result, ServerError};

const DEFAULT_ISSUER: &str = "https://securetoken.google.com/";
pub const INVALID_TOKEN: &str = "invalid or expired token";

/// Subject asserted by a verified credential.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Identity {
    /// Identity provider user identifier.
    pub subject: String,
    pub email: Option<String>,
    pub email_verified: bool,
}

/// Pieces of information asserted on an ID token.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Claims {
    /// Recipients that the JWT is intended for.
    pub aud: String,
    /// Identifies the expiration time on or after which the JWT must not be
    /// accepted for processing.
    pub exp: u64,
    /// Identifies the time at which the JWT was issued.
    pub iat: u64,
    /// Identifies the organization that issued the JWT.
    pub iss: String,
    /// User ID on the identity provider.
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub email_verified: bool,
}

/// Maps an opaque credential to a stable identity.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// Fails with [`ServerError::Unauthorized`] for expired, malformed or
    /// forged credentials.
    async fn verify(&self, credential: &str) -> Result<Identity>;
}

/// Errors raised while loading verification keys.
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("unsupported algorithm `{0}`")]
    Algorithm(String),
    #[error("no public key configured")]
    Missing,
    #[error(transparent)]
    Pem(#[from] jsonwebtoken::errors::Error),
}

/// Verify signed JWTs against configured public keys.
#[derive(Clone)]
pub struct JwtVerifier {
    keys: HashMap<Option<String>, DecodingKey>,
    validation: Validation,
}

impl JwtVerifier {
    /// Create a new [`JwtVerifier`] instance.
    pub fn new(config: &config::Identity) -> std::result::Result<Self, KeyError> {
        let name = config.algorithm.as_deref().unwrap_or("RS256");
        let algorithm =
            Algorithm::from_str(name).map_err(|_| KeyError::Algorithm(name.to_owned()))?;

        let mut keys = HashMap::with_capacity(config.keys.len());
        for key in &config.keys {
            let pem = key.public_key_pem.as_bytes();
            let decoding_key = match algorithm {
                Algorithm::RS256
                | Algorithm::RS384
                | Algorithm::RS512
                | Algorithm::PS256
                | Algorithm::PS384
                | Algorithm::PS512 => DecodingKey::from_rsa_pem(pem)?,
                Algorithm::ES256 | Algorithm::ES384 => DecodingKey::from_ec_pem(pem)?,
                Algorithm::EdDSA => DecodingKey::from_ed_pem(pem)?,
                _ => return Err(KeyError::Algorithm(name.to_owned())),
            };
            keys.insert(key.kid.clone(), decoding_key);
        }

        if keys.is_empty() {
            return Err(KeyError::Missing);
        }

        let issuer = config
            .issuer
            .clone()
            .unwrap_or_else(|| format!("{DEFAULT_ISSUER}{}", config.project_id));

        let mut validation = Validation::new(algorithm);
        validation.set_audience(&[&config.project_id]);
        validation.set_issuer(&[issuer]);
        validation.set_required_spec_claims(&["exp", "sub", "aud", "iss"]);

        Ok(Self { keys, validation })
    }

    fn key(&self, kid: Option<String>) -> Option<&DecodingKey> {
        match self.keys.get(&kid) {
            Some(key) => Some(key),
            None if kid.is_none() && self.keys.len() == 1 => self.keys.values().next(),
            None => None,
        }
    }

    /// Decode and check a token.
    pub fn decode(&self, token: &str) -> Result<Claims> {
        let header = decode_header(token).map_err(|err| {
            tracing::debug!(error = %err, "malformed token header");
            ServerError::Unauthorized(INVALID_TOKEN)
        })?;

        let Some(key) = self.key(header.kid) else {
            tracing::debug!("token signed with an unknown key");
            return Err(ServerError::Unauthorized(INVALID_TOKEN));
        };

        let claims = decode::<Claims>(token, key, &self.validation)
            .map_err(|err| {
                tracing::debug!(error = %err, "token rejected");
                ServerError::Unauthorized(INVALID_TOKEN)
            })?
            .claims;

        if claims.sub.is_empty() {
            return Err(ServerError::Unauthorized(INVALID_TOKEN));
        }

        Ok(claims)
    }
}

#[async_trait]
impl IdentityVerifier for JwtVerifier {
    async fn verify(&self, credential: &str) -> Result<Identity> {
        let claims = self.decode(credential)?;

        Ok(Identity {
            subject: claims.sub,
            email: claims.email.filter(|e| !e.is_empty()),
            email_verified: claims.email_verified,
        })
    }
}

/// Reject every credential. Used when no identity provider is configured.
#[derive(Clone, Copy, Debug, Default)]
pub struct DenyAll;

#[async_trait]
impl IdentityVerifier for DenyAll {
    async fn verify(&self, _credential: &str) -> Result<Identity> {
        Err(ServerError::Unauthorized(INVALID_TOKEN))
    }
}
