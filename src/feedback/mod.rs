//! User feedback submitted from the apps.

mod memory;
mod repository;
mod service;

pub use memory::*;
pub use repository::*;
pub use service::*;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::Result;
use crate::id::ObjectId;

pub const MAX_ATTACHMENTS: usize = 3;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    pub id: ObjectId,
    pub username: String,
    pub avatar_url: Option<String>,
    pub attachment_urls: Vec<String>,
    pub comment: String,
    pub categories: Vec<String>,
    pub resolved: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Body of a feedback submission.
#[derive(Clone, Debug, Default, Validate, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFeedback {
    #[validate(length(min = 1, message = "Username is required."))]
    pub username: String,
    #[serde(default, alias = "avatar_url")]
    pub avatar_url: Option<String>,
    #[serde(default, alias = "attachment_urls")]
    #[validate(length(max = 3, message = "Maximum 3 attachments allowed."))]
    pub attachment_urls: Vec<String>,
    #[validate(length(min = 1, message = "Comment is required."))]
    pub comment: String,
    #[serde(default)]
    pub categories: Vec<String>,
}

impl From<NewFeedback> for Feedback {
    fn from(new: NewFeedback) -> Self {
        let now = Utc::now();
        Self {
            id: ObjectId::new(),
            username: new.username,
            avatar_url: new.avatar_url.filter(|url| !url.is_empty()),
            attachment_urls: new.attachment_urls,
            comment: new.comment,
            categories: new.categories,
            resolved: false,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Listing filter. Empty fields match everything.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FeedbackFilter {
    /// Case-insensitive substring of the username.
    pub username: Option<String>,
    /// Match feedback carrying any of these categories.
    pub categories: Vec<String>,
}

impl FeedbackFilter {
    pub fn matches(&self, feedback: &Feedback) -> bool {
        let username = self
            .username
            .as_ref()
            .is_none_or(|name| feedback.username.to_lowercase().contains(&name.to_lowercase()));
        let categories = self.categories.is_empty()
            || feedback
                .categories
                .iter()
                .any(|category| self.categories.contains(category));

        username && categories
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackListResponse {
    pub feedbacks: Vec<Feedback>,
    pub total: u64,
    pub page: u64,
    pub page_size: u64,
    pub total_pages: u64,
}

/// Storage of feedback.
#[async_trait]
pub trait FeedbackStore: Send + Sync {
    async fn create(&self, feedback: &Feedback) -> Result<()>;

    /// Matching feedback, newest first, with their total.
    async fn list(&self, filter: &FeedbackFilter, skip: u64, limit: u64) -> Result<(Vec<Feedback>, u64)>;

    /// `false` when the feedback does not exist.
    async fn set_resolved(&self, id: &ObjectId, resolved: bool) -> Result<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feedback(username: &str, categories: &[&str]) -> Feedback {
        Feedback::from(NewFeedback {
            username: username.into(),
            comment: "hello".into(),
            categories: categories.iter().map(|c| c.to_string()).collect(),
            ..Default::default()
        })
    }

    #[test]
    fn test_filter() {
        let entry = feedback("RallyFan", &["bug", "ui"]);

        assert!(FeedbackFilter::default().matches(&entry));
        assert!(
            FeedbackFilter {
                username: Some("fan".into()),
                categories: vec!["perf".into(), "ui".into()],
            }
            .matches(&entry)
        );
        assert!(
            !FeedbackFilter {
                username: None,
                categories: vec!["perf".into()],
            }
            .matches(&entry)
        );
        assert!(
            !FeedbackFilter {
                username: Some("someone".into()),
                categories: vec![],
            }
            .matches(&entry)
        );
    }

    #[test]
    fn test_submission_validation() {
        let mut new = NewFeedback {
            username: "rider".into(),
            comment: "great".into(),
            attachment_urls: vec!["a".into(); MAX_ATTACHMENTS],
            ..Default::default()
        };
        assert!(new.validate().is_ok());

        new.attachment_urls.push("d".into());
        assert!(new.validate().is_err());

        let empty = NewFeedback::default();
        let errors = empty.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("username"));
        assert!(errors.field_errors().contains_key("comment"));
    }
}
