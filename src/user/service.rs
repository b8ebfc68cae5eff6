use std::sync::Arc;

use validator::Validate;

use crate::error::{Result, ServerError};
use crate::id::ObjectId;
use crate::pagination::Pagination;
use crate::token::{Identity, IdentityVerifier};
use crate::user::{ProfileDetails, ProfileUpdate, User, UserDirectory, UserSummary};

pub const USER_NOT_FOUND: &str = "user not found";
pub const NOT_PROFILE_OWNER: &str = "unauthorized: cannot modify another user's profile";

const INVALID_USER_ID: &str = "invalid user ID";

/// Result of a search, paginated.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub users: Vec<UserSummary>,
    pub total: u64,
    pub page: u64,
    pub page_size: u64,
    pub total_pages: u64,
}

/// User account manager.
#[derive(Clone)]
pub struct UserService {
    verifier: Arc<dyn IdentityVerifier>,
    users: Arc<dyn UserDirectory>,
}

impl UserService {
    /// Create a new [`UserService`].
    pub fn new(verifier: Arc<dyn IdentityVerifier>, users: Arc<dyn UserDirectory>) -> Self {
        Self { verifier, users }
    }

    /// Resolve a credential to its local user.
    pub async fn current_user(&self, credential: &str) -> Result<User> {
        let identity = self.verifier.verify(credential).await?;
        self.users
            .get_by_external_identity(&identity.subject)
            .await?
            .ok_or(ServerError::NotFound(USER_NOT_FOUND))
    }

    /// Return the local user of the credential, creating it on first sight.
    ///
    /// The boolean is `true` when the user has just been created.
    pub async fn register_or_login(&self, credential: &str) -> Result<(User, bool)> {
        let identity = self.verifier.verify(credential).await?;
        let Some(email) = identity.email.clone() else {
            return Err(ServerError::Unauthorized("email not found in token claims"));
        };

        if let Some(user) = self.users.get_by_external_identity(&identity.subject).await? {
            return Ok((user, false));
        }

        if self.users.exists_email(&email).await? {
            return Err(ServerError::Conflict("email already registered"));
        }

        let user = User::builder()
            .firebase_uid(&identity.subject)
            .email(email)
            .email_verified(identity.email_verified)
            .build();

        match self.users.create(&user).await {
            Ok(()) => {
                tracing::info!(user_id = %user.id, "user registered");
                Ok((user, true))
            },
            Err(ServerError::Conflict(reason)) => self.lost_registration_race(&identity, reason).await,
            Err(err) => Err(err),
        }
    }

    /// A concurrent registration of the same identity won; read it back.
    async fn lost_registration_race(&self, identity: &Identity, reason: &'static str) -> Result<(User, bool)> {
        match self.users.get_by_external_identity(&identity.subject).await? {
            Some(user) => Ok((user, false)),
            None => Err(ServerError::Conflict(reason)),
        }
    }

    /// Resolve an already registered user.
    pub async fn login(&self, credential: &str) -> Result<User> {
        self.current_user(credential).await
    }

    /// Profile page details of the credential owner.
    pub async fn my_details(&self, credential: &str) -> Result<ProfileDetails> {
        Ok(self.current_user(credential).await?.details())
    }

    /// Update the credential owner profile.
    pub async fn update_my_profile(&self, credential: &str, update: ProfileUpdate) -> Result<User> {
        update.validate()?;
        let user = self.current_user(credential).await?;
        self.update_profile(&user, &update).await
    }

    /// Any user by id.
    pub async fn get_profile(&self, user_id: &str) -> Result<User> {
        let user_id = ObjectId::parse(user_id).map_err(|_| ServerError::InvalidInput(INVALID_USER_ID))?;

        self.users
            .get_by_id(&user_id)
            .await?
            .ok_or(ServerError::NotFound(USER_NOT_FOUND))
    }

    /// Update `user_id` profile, only when the credential owns it.
    pub async fn update_owned_profile(&self, credential: &str, user_id: &str, update: ProfileUpdate) -> Result<User> {
        update.validate()?;
        let user = self.current_user(credential).await?;

        if user.id.to_string() != user_id {
            tracing::warn!(user_id = %user.id, target = user_id, "profile update on foreign account refused");
            return Err(ServerError::Forbidden(NOT_PROFILE_OWNER));
        }

        self.update_profile(&user, &update).await
    }

    /// Update a known user profile.
    pub async fn update_profile(&self, user: &User, update: &ProfileUpdate) -> Result<User> {
        if let Some(username) = &update.username {
            if user.username.as_deref() != Some(username.as_str())
                && self.users.exists_username(username).await?
            {
                return Err(ServerError::Conflict("username already taken"));
            }
        }

        self.users
            .update_profile(&user.id, update)
            .await?
            .ok_or(ServerError::NotFound(USER_NOT_FOUND))
    }

    /// Search users by username, first or last name.
    pub async fn search(&self, query: &str, pagination: Pagination) -> Result<SearchResponse> {
        let (users, total) = self
            .users
            .search(query.trim(), pagination.skip(), pagination.limit())
            .await?;

        Ok(SearchResponse {
            users: users.iter().map(User::summary).collect(),
            total,
            page: pagination.page,
            page_size: pagination.page_size,
            total_pages: pagination.total_pages(total),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{StaticVerifier, credential};
    use crate::user::MemoryUserDirectory;

    fn service() -> (UserService, Arc<MemoryUserDirectory>) {
        let users = Arc::new(MemoryUserDirectory::new());
        (UserService::new(Arc::new(StaticVerifier), users.clone()), users)
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let (service, _) = service();

        let (created, is_new) = service.register_or_login(&credential("uid-1")).await.unwrap();
        assert!(is_new);
        assert_eq!(created.email, "uid-1@rally.test");
        assert!(created.is_onboarding);

        let (again, is_new) = service.register_or_login(&credential("uid-1")).await.unwrap();
        assert!(!is_new);
        assert_eq!(again.id, created.id);

        let logged = service.login(&credential("uid-1")).await.unwrap();
        assert_eq!(logged.id, created.id);
    }

    #[tokio::test]
    async fn test_login_unknown_user() {
        let (service, _) = service();

        let err = service.login(&credential("ghost")).await.unwrap_err();
        assert_eq!(err.to_string(), USER_NOT_FOUND);

        let err = service.login("garbage").await.unwrap_err();
        assert_eq!(err.to_string(), "invalid or expired token");
    }

    #[tokio::test]
    async fn test_register_requires_email() {
        let (service, _) = service();

        let err = service
            .register_or_login(&crate::testing::credential_without_email("uid"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "email not found in token claims");
    }

    #[tokio::test]
    async fn test_update_profile_conflicts_on_taken_username() {
        let (service, _) = service();
        service.register_or_login(&credential("a")).await.unwrap();
        service.register_or_login(&credential("b")).await.unwrap();

        let update = ProfileUpdate {
            username: Some("rally".into()),
            ..Default::default()
        };
        let updated = service.update_my_profile(&credential("a"), update.clone()).await.unwrap();
        assert_eq!(updated.username.as_deref(), Some("rally"));

        // same owner may resend its own username.
        assert!(service.update_my_profile(&credential("a"), update.clone()).await.is_ok());

        let err = service.update_my_profile(&credential("b"), update).await.unwrap_err();
        assert!(matches!(err, ServerError::Conflict("username already taken")));
    }

    #[tokio::test]
    async fn test_update_profile_is_validated() {
        let (service, _) = service();
        service.register_or_login(&credential("a")).await.unwrap();

        let update = ProfileUpdate {
            avatar_url: Some("nope".into()),
            ..Default::default()
        };
        assert!(matches!(
            service.update_my_profile(&credential("a"), update).await,
            Err(ServerError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_profile_by_id() {
        let (service, _) = service();
        let (user, _) = service.register_or_login(&credential("a")).await.unwrap();

        let found = service.get_profile(&user.id.to_string()).await.unwrap();
        assert_eq!(found.id, user.id);

        assert!(matches!(
            service.get_profile(&ObjectId::new().to_string()).await,
            Err(ServerError::NotFound(USER_NOT_FOUND))
        ));
        assert!(matches!(
            service.get_profile("me").await,
            Err(ServerError::InvalidInput(INVALID_USER_ID))
        ));
    }

    #[tokio::test]
    async fn test_update_requires_ownership() {
        let (service, users) = service();
        let (a, _) = service.register_or_login(&credential("a")).await.unwrap();
        let (b, _) = service.register_or_login(&credential("b")).await.unwrap();
        let update = ProfileUpdate {
            first_name: Some("Hello".into()),
            ..Default::default()
        };

        let err = service
            .update_owned_profile(&credential("a"), &b.id.to_string(), update.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::Forbidden(NOT_PROFILE_OWNER)));
        assert_eq!(err.kind().status(), axum::http::StatusCode::FORBIDDEN);
        let b = users.get_by_id(&b.id).await.unwrap().unwrap();
        assert_eq!(b.first_name, None);

        let updated = service
            .update_owned_profile(&credential("a"), &a.id.to_string(), update)
            .await
            .unwrap();
        assert_eq!(updated.first_name.as_deref(), Some("Hello"));
    }

    #[tokio::test]
    async fn test_search_paginates() {
        let (service, _) = service();
        for uid in ["a", "b", "c"] {
            service.register_or_login(&credential(uid)).await.unwrap();
            let update = ProfileUpdate {
                username: Some(format!("runner_{uid}")),
                ..Default::default()
            };
            service.update_my_profile(&credential(uid), update).await.unwrap();
        }

        let page = service.search(" RUNNER ", Pagination::new(Some(2), Some(2))).await.unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.users.len(), 1);
        assert_eq!(page.users[0].username.as_deref(), Some("runner_c"));
    }
}
