use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::feedback::{Feedback, FeedbackFilter, FeedbackStore};
use crate::id::ObjectId;

/// [`FeedbackStore`] kept in process memory.
#[derive(Default)]
pub struct MemoryFeedbackStore {
    feedbacks: RwLock<Vec<Feedback>>,
}

impl MemoryFeedbackStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FeedbackStore for MemoryFeedbackStore {
    async fn create(&self, feedback: &Feedback) -> Result<()> {
        self.feedbacks.write().await.push(feedback.clone());
        Ok(())
    }

    async fn list(&self, filter: &FeedbackFilter, skip: u64, limit: u64) -> Result<(Vec<Feedback>, u64)> {
        let feedbacks = self.feedbacks.read().await;
        // stable sort keeps the latest insertion first on equal timestamps.
        let mut found: Vec<&Feedback> = feedbacks.iter().rev().filter(|f| filter.matches(f)).collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = found.len() as u64;
        let page = found
            .into_iter()
            .skip(skip as usize)
            .take(limit as usize)
            .cloned()
            .collect();

        Ok((page, total))
    }

    async fn set_resolved(&self, id: &ObjectId, resolved: bool) -> Result<bool> {
        Ok(match self.feedbacks.write().await.iter_mut().find(|f| f.id == *id) {
            Some(feedback) => {
                feedback.resolved = resolved;
                feedback.updated_at = Utc::now();
                true
            },
            None => false,
        })
    }
}
