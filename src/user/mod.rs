mod builder;
mod directory;
mod memory;
mod repository;
mod service;

pub use builder::*;
pub use directory::*;
pub use memory::*;
pub use repository::*;
pub use service::*;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::id::ObjectId;

/// User as saved on the directory.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: ObjectId,
    /// Subject identifier on the identity provider.
    #[serde(skip)]
    pub firebase_uid: String,
    pub email: String,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub avatar_url: Option<String>,
    pub bio_text: Option<String>,
    pub followers_count: i64,
    pub following_count: i64,
    pub is_active: bool,
    pub is_email_verified: bool,
    pub is_onboarding: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Lightweight projection used in follow lists and search.
    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id,
            username: self.username.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            avatar_url: self.avatar_url.clone(),
        }
    }

    /// Fields anyone can read, with follow counters.
    pub fn public_profile(&self) -> PublicProfile {
        PublicProfile {
            id: self.id,
            username: self.username.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            avatar_url: self.avatar_url.clone(),
            bio_text: self.bio_text.clone(),
            followers_count: self.followers_count,
            following_count: self.following_count,
        }
    }

    /// Profile returned to its owner.
    pub fn profile(&self) -> Profile {
        Profile {
            id: self.id,
            email: self.email.clone(),
            username: self.username.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            avatar_url: self.avatar_url.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            is_active: self.is_active,
            is_email_verified: self.is_email_verified,
            is_onboarding: self.is_onboarding,
        }
    }

    /// Profile page details.
    pub fn details(&self) -> ProfileDetails {
        ProfileDetails {
            id: self.id,
            bio_text: self.bio_text.clone(),
            followers_count: self.followers_count,
            following_count: self.following_count,
        }
    }

    /// Apply a partial update in place.
    pub fn apply(&mut self, update: &ProfileUpdate) {
        if let Some(username) = &update.username {
            self.username = Some(username.clone());
        }
        if let Some(first_name) = &update.first_name {
            self.first_name = Some(first_name.clone());
        }
        if let Some(last_name) = &update.last_name {
            self.last_name = Some(last_name.clone());
        }
        if let Some(avatar_url) = &update.avatar_url {
            self.avatar_url = Some(avatar_url.clone());
        }
        if let Some(bio_text) = &update.bio_text {
            self.bio_text = Some(bio_text.clone());
        }
        if let Some(is_onboarding) = update.is_onboarding {
            self.is_onboarding = is_onboarding;
        }
        self.updated_at = Utc::now();
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: ObjectId,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicProfile {
    pub id: ObjectId,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub avatar_url: Option<String>,
    pub bio_text: Option<String>,
    pub followers_count: i64,
    pub following_count: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: ObjectId,
    pub email: String,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_active: bool,
    pub is_email_verified: bool,
    pub is_onboarding: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileDetails {
    pub id: ObjectId,
    pub bio_text: Option<String>,
    pub followers_count: i64,
    pub following_count: i64,
}

/// Partial profile update. Missing fields are left untouched.
#[derive(Clone, Debug, Default, PartialEq, Validate, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[validate(
        length(min = 3, max = 30, message = "Username must be 3 to 30 characters long."),
        custom(
            function = "validate_username",
            message = "Username may only contain letters, digits, '_' and '.'."
        )
    )]
    pub username: Option<String>,
    #[validate(length(max = 50, message = "First name must be at most 50 characters long."))]
    pub first_name: Option<String>,
    #[validate(length(max = 50, message = "Last name must be at most 50 characters long."))]
    pub last_name: Option<String>,
    #[validate(url(message = "Avatar must be a valid URL."))]
    pub avatar_url: Option<String>,
    #[validate(length(max = 300, message = "Biography must be at most 300 characters long."))]
    pub bio_text: Option<String>,
    pub is_onboarding: Option<bool>,
}

fn validate_username(username: &str) -> Result<(), ValidationError> {
    if username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
    {
        Ok(())
    } else {
        Err(ValidationError::new("username"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_update_validation() {
        let update = ProfileUpdate {
            username: Some("rally_fan.01".into()),
            avatar_url: Some("https://res.cloudinary.com/rally/avatar.webp".into()),
            ..Default::default()
        };
        assert!(update.validate().is_ok());

        let update = ProfileUpdate {
            username: Some("no spaces".into()),
            ..Default::default()
        };
        assert!(update.validate().is_err());

        let update = ProfileUpdate {
            username: Some("ab".into()),
            avatar_url: Some("not a url".into()),
            ..Default::default()
        };
        let errors = update.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("username"));
        assert!(errors.field_errors().contains_key("avatar_url"));
    }

    #[test]
    fn test_apply_keeps_missing_fields() {
        let mut user = User::builder()
            .firebase_uid("uid")
            .email("someone@rally.test")
            .build();
        user.first_name = Some("Ada".into());

        user.apply(&ProfileUpdate {
            last_name: Some("Lovelace".into()),
            is_onboarding: Some(false),
            ..Default::default()
        });

        assert_eq!(user.first_name.as_deref(), Some("Ada"));
        assert_eq!(user.last_name.as_deref(), Some("Lovelace"));
        assert!(!user.is_onboarding);
    }
}
