//! API error types and handling.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use thiserror::Error;
use utoipa::ToSchema;

use ct_core::{StoreError, TransitionError};

/// Field validation failures, keyed by field name.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// API error type.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request (invalid input).
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Unauthorized (missing or invalid identity headers).
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Forbidden (authenticated but not allowed).
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Conflict (e.g., duplicate resource).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Unprocessable entity (semantic errors).
    #[error("Unprocessable entity: {0}")]
    UnprocessableEntity(String),

    /// Request body failed field validation.
    #[error("Validation failed for {}", format_field_list(.0))]
    Validation(FieldErrors),

    /// A rejected workflow transition.
    #[error(transparent)]
    Workflow(#[from] TransitionError),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),

    /// Ticket store error.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Service unavailable (e.g., during shutdown).
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

fn format_field_list(fields: &FieldErrors) -> String {
    let names: Vec<&str> = fields.keys().map(String::as_str).collect();
    match names.as_slice() {
        [single] => format!("field '{}'", single),
        many => format!("{} fields", many.len()),
    }
}

/// JSON error response body.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Additional error details (optional).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    /// Request ID for tracing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl ApiError {
    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::UnprocessableEntity(_) | ApiError::Validation(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ApiError::Workflow(err) => match err {
                TransitionError::InvalidStatus { .. } => StatusCode::BAD_REQUEST,
                TransitionError::IllegalTransition { .. } => StatusCode::CONFLICT,
                TransitionError::MissingJustification { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            },
            ApiError::Internal(_) | ApiError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Returns the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::UnprocessableEntity(_) => "UNPROCESSABLE_ENTITY",
            ApiError::Validation(_) => "VALIDATION_ERROR",
            ApiError::Workflow(err) => match err {
                TransitionError::InvalidStatus { .. } => "INVALID_STATUS",
                TransitionError::IllegalTransition { .. } => "ILLEGAL_TRANSITION",
                TransitionError::MissingJustification { .. } => "MISSING_JUSTIFICATION",
            },
            ApiError::Internal(_) => "INTERNAL_ERROR",
            ApiError::Storage(_) => "STORAGE_ERROR",
            ApiError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
        }
    }

    /// Structured details for error bodies, when the variant carries any.
    fn details(&self) -> Option<serde_json::Value> {
        match self {
            ApiError::Validation(fields) => serde_json::to_value(fields).ok(),
            // Workflow rejections carry structured details so clients can
            // react (a missing justification is a prompt, not a dead end).
            ApiError::Workflow(err) => Some(workflow_details(err)),
            _ => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            code: self.error_code().to_string(),
            message: self.to_string(),
            details: self.details(),
            request_id: None,
        };

        (self.status_code(), Json(body)).into_response()
    }
}

fn workflow_details(err: &TransitionError) -> serde_json::Value {
    match err {
        TransitionError::InvalidStatus { value } => json!({ "value": value }),
        TransitionError::IllegalTransition { from, to } => json!({
            "from": from.as_str(),
            "to": to.as_str(),
        }),
        TransitionError::MissingJustification { to } => json!({
            "target_status": to.as_str(),
            "requires_comment": true,
        }),
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{} with id {} not found", entity, id))
            }
            StoreError::Conflict(msg) => ApiError::Conflict(msg),
            StoreError::Serialization(msg) => ApiError::BadRequest(msg),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        let fields: FieldErrors = err
            .field_errors()
            .into_iter()
            .map(|(field, errors)| {
                let messages = errors
                    .iter()
                    .map(|e| match &e.message {
                        Some(message) => message.to_string(),
                        None => format!("failed '{}' constraint", e.code),
                    })
                    .collect();
                (field.to_string(), messages)
            })
            .collect();

        ApiError::Validation(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ct_core::TicketStatus;

    #[test]
    fn test_workflow_error_status_codes() {
        let invalid = ApiError::from(TransitionError::InvalidStatus {
            value: "archived".to_string(),
        });
        assert_eq!(invalid.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(invalid.error_code(), "INVALID_STATUS");

        let illegal = ApiError::from(TransitionError::IllegalTransition {
            from: TicketStatus::Open,
            to: TicketStatus::Closed,
        });
        assert_eq!(illegal.status_code(), StatusCode::CONFLICT);
        assert_eq!(illegal.error_code(), "ILLEGAL_TRANSITION");

        let missing = ApiError::from(TransitionError::MissingJustification {
            to: TicketStatus::Resolved,
        });
        assert_eq!(missing.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(missing.error_code(), "MISSING_JUSTIFICATION");
    }

    #[test]
    fn test_missing_justification_flags_the_comment_prompt() {
        let details = workflow_details(&TransitionError::MissingJustification {
            to: TicketStatus::Cancelled,
        });

        assert_eq!(details["requires_comment"], true);
        assert_eq!(details["target_status"], "cancelled");
    }

    #[test]
    fn test_store_error_mapping() {
        let not_found = ApiError::from(StoreError::ticket_not_found(42));
        assert_eq!(not_found.status_code(), StatusCode::NOT_FOUND);

        let conflict = ApiError::from(StoreError::Conflict("duplicate id".to_string()));
        assert_eq!(conflict.status_code(), StatusCode::CONFLICT);

        let serialization = ApiError::from(StoreError::Serialization("bad json".to_string()));
        assert_eq!(serialization.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_validation_error_names_the_failing_field() {
        let mut fields = FieldErrors::new();
        fields.insert("summary".to_string(), vec!["too short".to_string()]);

        let err = ApiError::Validation(fields);
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
        assert!(err.to_string().contains("field 'summary'"));
    }

    #[test]
    fn test_validation_details_carry_the_messages() {
        let mut fields = FieldErrors::new();
        fields.insert("summary".to_string(), vec!["too short".to_string()]);
        fields.insert("category".to_string(), vec!["missing".to_string()]);

        let err = ApiError::Validation(fields);
        assert!(err.to_string().contains("2 fields"));

        let details = err.details().unwrap();
        assert_eq!(details["summary"][0], "too short");
    }
}
