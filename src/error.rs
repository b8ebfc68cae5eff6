//! Error handler for rally.

use axum::extract::rejection::JsonRejection;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use sqlx::Error as SQLxError;
use thiserror::Error;
use validator::ValidationErrors;

pub type Result<T> = std::result::Result<T, ServerError>;

/// Closed set of error kinds callers can branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Authentication,
    Authorization,
    Validation,
    NotFound,
    Conflict,
    Dependency,
}

impl ErrorKind {
    /// Machine-stable code sent to clients.
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::Authentication => "authentication_error",
            ErrorKind::Authorization => "authorization_error",
            ErrorKind::Validation => "validation_error",
            ErrorKind::NotFound => "not_found_error",
            ErrorKind::Conflict => "conflict_error",
            ErrorKind::Dependency => "dependency_error",
        }
    }

    /// HTTP status bound to the kind.
    pub fn status(&self) -> StatusCode {
        match self {
            ErrorKind::Authentication => StatusCode::UNAUTHORIZED,
            ErrorKind::Authorization => StatusCode::FORBIDDEN,
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Dependency => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Enum representing server-side errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("{0}")]
    Unauthorized(&'static str),

    #[error("{0}")]
    Forbidden(&'static str),

    #[error("{0}")]
    InvalidInput(&'static str),

    #[error("validation error occurred")]
    Validation(#[from] ValidationErrors),

    #[error(transparent)]
    Axum(#[from] JsonRejection),

    #[error("{0}")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(&'static str),

    #[error("SQL request failed: {0}")]
    Sql(#[from] SQLxError),

    #[error("internal server error, {details}")]
    Internal {
        details: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl ServerError {
    /// Build an [`ServerError::Internal`] from any error.
    pub fn internal<E>(details: &str, err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Internal {
            details: details.to_owned(),
            source: Some(Box::new(err)),
        }
    }

    /// Kind of the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServerError::Unauthorized(_) => ErrorKind::Authentication,
            ServerError::Forbidden(_) => ErrorKind::Authorization,
            ServerError::InvalidInput(_)
            | ServerError::Validation(_)
            | ServerError::Axum(_) => ErrorKind::Validation,
            ServerError::NotFound(_) => ErrorKind::NotFound,
            ServerError::Conflict(_) => ErrorKind::Conflict,
            ServerError::Sql(_) | ServerError::Internal { .. } => ErrorKind::Dependency,
        }
    }
}

/// Structure for detailed error responses.
#[derive(Debug, Serialize)]
pub struct ResponseError {
    code: &'static str,
    title: String,
    status: u16,
    detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<Vec<FieldError>>,
}

impl ResponseError {
    /// Create a response from an error kind.
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            code: kind.code(),
            status: kind.status().as_u16(),
            ..Default::default()
        }
    }

    /// Update `title` field.
    pub fn title(mut self, title: &str) -> Self {
        self.title = title.into();
        self
    }

    /// Add detailed error.
    pub fn details(mut self, description: &str) -> Self {
        self.detail = description.into();
        self
    }

    /// Automatically add errors field.
    pub fn errors(mut self, errors: &ValidationErrors) -> Self {
        self.errors = Some(parse_validation_errors(errors));
        self
    }

    /// Transform [`ResponseError`] into axum [`Response`].
    pub fn into_response(self) -> std::result::Result<Response, axum::http::Error> {
        if let Ok(body) = serde_json::to_string(&self) {
            Response::builder()
                .status(self.status)
                .header(header::CONTENT_TYPE, "application/json")
                .body(body.into())
        } else {
            Ok(internal_server_error())
        }
    }
}

impl Default for ResponseError {
    fn default() -> Self {
        Self {
            code: ErrorKind::Dependency.code(),
            title: "Internal server error.".to_owned(),
            status: StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
            detail: String::default(),
            errors: None,
        }
    }
}

#[derive(Debug, Serialize)]
struct FieldError {
    field: String,
    message: String,
}

fn parse_validation_errors(errors: &ValidationErrors) -> Vec<FieldError> {
    errors
        .field_errors()
        .iter()
        .flat_map(|(field, issues)| {
            issues.iter().map(move |issue| FieldError {
                field: field.to_string(),
                message: issue
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| issue.code.to_string()),
            })
        })
        .collect()
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let response = ResponseError::new(kind).details(&self.to_string());

        let response = match &self {
            ServerError::Unauthorized(_) => {
                response.title("Missing or invalid credentials.")
            },

            ServerError::Forbidden(_) => response.title("Operation not allowed for these credentials."),

            ServerError::Validation(validation_errors) => response
                .title("There were validation errors with your request.")
                .errors(validation_errors),

            ServerError::InvalidInput(_) | ServerError::Axum(_) => {
                response.title("There were validation errors with your request.")
            },

            ServerError::NotFound(_) => response.title("Resource not found."),

            ServerError::Conflict(_) => response.title("Resource already exists."),

            ServerError::Sql(err) => {
                tracing::error!(error = %err, "storage request failed");
                ResponseError::new(kind).details("storage dependency failed")
            },

            ServerError::Internal { details, source } => {
                tracing::error!(err = ?source, %details, "server returned 500 status");
                ResponseError::new(kind)
            },
        };

        response
            .into_response()
            .unwrap_or_else(|_| internal_server_error())
    }
}

fn internal_server_error() -> Response {
    Response::builder()
        .status(StatusCode::INTERNAL_SERVER_ERROR)
        .header(header::CONTENT_TYPE, "application/json")
        .body(
            serde_json::json!({
                "code": ErrorKind::Dependency.code(),
                "title": "Internal server error.",
                "status": StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
                "detail": null,
            })
            .to_string()
            .into(),
        )
        .unwrap_or_else(|_| Response::new("Internal server error".into()))
}
