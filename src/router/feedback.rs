//! Feedback routes.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::feedback::{Feedback, FeedbackFilter, FeedbackListResponse, NewFeedback};
use crate::router::{PageQuery, Valid};
use crate::{AppState, ServerError};

pub async fn submit(
    State(state): State<AppState>,
    Valid(body): Valid<NewFeedback>,
) -> Result<(StatusCode, Json<Feedback>), ServerError> {
    Ok((StatusCode::CREATED, Json(state.feedback.submit(body).await?)))
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    username: Option<String>,
    /// Comma separated.
    categories: Option<String>,
    #[serde(flatten)]
    page: PageQuery,
}

impl ListQuery {
    fn filter(&self) -> FeedbackFilter {
        FeedbackFilter {
            username: self.username.clone().filter(|u| !u.is_empty()),
            categories: self
                .categories
                .as_deref()
                .unwrap_or_default()
                .split(',')
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_owned)
                .collect(),
        }
    }
}

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<FeedbackListResponse>, ServerError> {
    Ok(Json(state.feedback.list(query.page.pagination(), query.filter()).await?))
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Resolve {
    resolved: bool,
}

#[derive(Debug, Serialize)]
pub struct Resolved {
    message: &'static str,
    resolved: bool,
}

pub async fn resolve(
    State(state): State<AppState>,
    Path(feedback_id): Path<String>,
    Json(body): Json<Resolve>,
) -> Result<Json<Resolved>, ServerError> {
    state.feedback.resolve(&feedback_id, body.resolved).await?;

    Ok(Json(Resolved {
        message: "Feedback status updated successfully",
        resolved: body.resolved,
    }))
}
