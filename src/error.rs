use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

/// Business rules that reject an otherwise well-formed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainRule {
    IsOrganizer,
    OrganizerCannotLeave,
    OrganizerCannotBeRemoved,
    OrganizerAttending,
    ParentMismatch,
}

impl DomainRule {
    pub fn code(&self) -> &'static str {
        match self {
            DomainRule::IsOrganizer => "IsOrganizer",
            DomainRule::OrganizerCannotLeave => "OrganizerCannotLeave",
            DomainRule::OrganizerCannotBeRemoved => "OrganizerCannotBeRemoved",
            DomainRule::OrganizerAttending => "OrganizerAttending",
            DomainRule::ParentMismatch => "ParentMismatch",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            DomainRule::IsOrganizer => "Organizers cannot join their own group",
            DomainRule::OrganizerCannotLeave => "The organizer cannot leave",
            DomainRule::OrganizerCannotBeRemoved => "The organizer cannot be removed",
            DomainRule::OrganizerAttending => "The organizer is already attending this event",
            DomainRule::ParentMismatch => "Parent comment does not belong to this post",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            DomainRule::ParentMismatch => StatusCode::BAD_REQUEST,
            _ => StatusCode::FORBIDDEN,
        }
    }
}

#[derive(Debug)]
pub enum AppError {
    Database(sqlx::Error),
    Validation(String),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    Conflict(String),
    Rule(DomainRule),
    Storage { message: String, committed: bool },
    PayloadTooLarge(String),
    Internal(String),
}

impl AppError {
    pub fn not_found(what: &str) -> Self {
        AppError::NotFound(format!("{} couldn't be found", what))
    }

    pub fn unauthenticated() -> Self {
        AppError::Unauthorized("Unauthorized".to_string())
    }

    pub fn forbidden() -> Self {
        AppError::Forbidden("Forbidden".to_string())
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Database(err) => write!(f, "Database error: {}", err),
            AppError::Validation(msg) => write!(f, "Validation error: {}", msg),
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            AppError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            AppError::Rule(rule) => write!(f, "{}: {}", rule.code(), rule.message()),
            AppError::Storage { message, committed } => {
                write!(f, "Storage error (committed: {}): {}", committed, message)
            }
            AppError::PayloadTooLarge(msg) => write!(f, "Payload too large: {}", msg),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            AppError::Database(err) => {
                tracing::error!("Database error: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "message": "Internal server error" }),
                )
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "message": "Internal server error" }),
                )
            }
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, json!({ "message": msg })),
            AppError::Conflict(msg) => (StatusCode::BAD_REQUEST, json!({ "message": msg })),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, json!({ "message": msg })),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, json!({ "message": msg })),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, json!({ "message": msg })),
            AppError::Rule(rule) => (
                rule.status(),
                json!({ "message": rule.message(), "code": rule.code() }),
            ),
            AppError::Storage { message, committed } => {
                tracing::error!("Storage error: {}", message);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "message": "Image storage failed", "committed": committed }),
                )
            }
            AppError::PayloadTooLarge(msg) => {
                (StatusCode::PAYLOAD_TOO_LARGE, json!({ "message": msg }))
            }
        };

        (status, Json(json!({ "errors": body }))).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => AppError::NotFound("Record couldn't be found".to_string()),
            other => AppError::Database(other),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::PayloadTooLarge("File exceeds the 5 MB upload limit".to_string())
        } else {
            AppError::Validation(err.body_text())
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn unauthenticated_body_is_canonical() {
        let (status, body) = body_json(AppError::unauthenticated()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, json!({ "errors": { "message": "Unauthorized" } }));
    }

    #[tokio::test]
    async fn domain_rules_carry_their_code() {
        let (status, body) = body_json(AppError::Rule(DomainRule::IsOrganizer)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["errors"]["code"], "IsOrganizer");

        let (status, _) = body_json(AppError::Rule(DomainRule::ParentMismatch)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn internal_details_are_not_leaked() {
        let (status, body) = body_json(AppError::Internal("pool exhausted".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["errors"]["message"], "Internal server error");
    }

    #[test]
    fn row_not_found_maps_to_not_found() {
        assert!(matches!(
            AppError::from(sqlx::Error::RowNotFound),
            AppError::NotFound(_)
        ));
    }
}
