use std::sync::Arc;

use validator::Validate;

use crate::error::{Result, ServerError};
use crate::feedback::{Feedback, FeedbackFilter, FeedbackListResponse, FeedbackStore, NewFeedback};
use crate::id::ObjectId;
use crate::pagination::Pagination;

#[derive(Clone)]
pub struct FeedbackService {
    store: Arc<dyn FeedbackStore>,
}

impl FeedbackService {
    pub fn new(store: Arc<dyn FeedbackStore>) -> Self {
        Self { store }
    }

    /// Validate and save a submission.
    pub async fn submit(&self, new: NewFeedback) -> Result<Feedback> {
        new.validate()?;

        let feedback = Feedback::from(new);
        self.store.create(&feedback).await?;

        tracing::info!(feedback_id = %feedback.id, username = %feedback.username, "feedback submitted");
        Ok(feedback)
    }

    pub async fn list(&self, pagination: Pagination, filter: FeedbackFilter) -> Result<FeedbackListResponse> {
        let (feedbacks, total) = self
            .store
            .list(&filter, pagination.skip(), pagination.limit())
            .await?;

        Ok(FeedbackListResponse {
            feedbacks,
            total,
            page: pagination.page,
            page_size: pagination.page_size,
            total_pages: pagination.total_pages(total),
        })
    }

    /// Mark a feedback as resolved or not.
    pub async fn resolve(&self, id: &str, resolved: bool) -> Result<()> {
        let id = ObjectId::parse(id).map_err(|_| ServerError::InvalidInput("invalid feedback ID"))?;

        if self.store.set_resolved(&id, resolved).await? {
            Ok(())
        } else {
            Err(ServerError::NotFound("feedback not found"))
        }
    }
}
