//! Typed builder for User.

use chrono::Utc;

use crate::id::ObjectId;
use crate::user::User;

/// [`User`] builder.
#[derive(Debug, Clone)]
pub struct UserBuilder<Uid, Email> {
    firebase_uid: Uid,
    email: Email,
    email_verified: bool,
}

/// Value is missing on [`UserBuilder`].
#[derive(Debug, Clone)]
pub struct Missing;

/// Value is present on [`UserBuilder`].
#[derive(Debug, Clone)]
pub struct Present<T>(pub T);

impl User {
    /// Start building a new [`User`].
    pub fn builder() -> UserBuilder<Missing, Missing> {
        UserBuilder::new()
    }
}

impl UserBuilder<Missing, Missing> {
    /// Create a new [`UserBuilder`].
    pub fn new() -> Self {
        Self {
            firebase_uid: Missing,
            email: Missing,
            email_verified: false,
        }
    }
}

impl Default for UserBuilder<Missing, Missing> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Email> UserBuilder<Missing, Email> {
    /// Update `firebase_uid` field on [`UserBuilder`].
    pub fn firebase_uid(self, uid: impl Into<String>) -> UserBuilder<Present<String>, Email> {
        UserBuilder {
            firebase_uid: Present(uid.into()),
            email: self.email,
            email_verified: self.email_verified,
        }
    }
}

impl<Uid> UserBuilder<Uid, Missing> {
    /// Update `email` field on [`UserBuilder`].
    pub fn email(self, email: impl Into<String>) -> UserBuilder<Uid, Present<String>> {
        UserBuilder {
            firebase_uid: self.firebase_uid,
            email: Present(email.into().to_lowercase()),
            email_verified: self.email_verified,
        }
    }
}

impl<Uid, Email> UserBuilder<Uid, Email> {
    /// Whether the identity provider verified the email.
    pub fn email_verified(mut self, verified: bool) -> Self {
        self.email_verified = verified;
        self
    }
}

impl UserBuilder<Present<String>, Present<String>> {
    /// Build a fresh, onboarding [`User`] with a new identifier.
    pub fn build(self) -> User {
        let now = Utc::now();

        User {
            id: ObjectId::new(),
            firebase_uid: self.firebase_uid.0,
            email: self.email.0,
            username: None,
            first_name: None,
            last_name: None,
            avatar_url: None,
            bio_text: None,
            followers_count: 0,
            following_count: 0,
            is_active: true,
            is_email_verified: self.email_verified,
            is_onboarding: true,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_user() {
        let user = User::builder()
            .email("Someone@Rally.test")
            .firebase_uid("uid-1")
            .email_verified(true)
            .build();

        assert_eq!(user.firebase_uid, "uid-1");
        assert_eq!(user.email, "someone@rally.test");
        assert!(user.is_email_verified);
        assert!(user.is_onboarding);
        assert_eq!(user.followers_count, 0);
        assert_eq!(user.following_count, 0);
    }
}
