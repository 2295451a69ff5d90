use crate::ai_providers::ProviderId;
use crate::api::ApiResponse;
use axum::{http::StatusCode, response::Json};
use tracing::{error, info, warn};

/// Failures of a completion round trip
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AiError {
    #[error("No API key configured for provider '{provider}'. Add one in settings.")]
    MissingApiKey { provider: ProviderId },

    #[error("AI request failed: {0}")]
    Transport(String),

    #[error("Malformed model output: {reason}")]
    MalformedOutput { reason: String, snippet: String },
}

/// Domain-level failures raised by the store and services
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DomainError {
    #[error("{resource} with id '{id}' not found")]
    NotFound { resource: &'static str, id: String },

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    InvalidState(String),
}

impl DomainError {
    pub fn not_found(resource: &'static str, id: impl ToString) -> Self {
        DomainError::NotFound {
            resource,
            id: id.to_string(),
        }
    }
}

/// Centralized error types for consistent API error handling
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] anyhow::Error),

    #[error("AI service error: {0}")]
    AiServiceError(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

/// Error context for structured logging
#[derive(Debug)]
pub struct ErrorContext {
    pub operation: String,
    pub resource_id: Option<String>,
    pub resource_type: String,
}

impl ErrorContext {
    pub fn new(operation: &str, resource_type: &str) -> Self {
        Self {
            operation: operation.to_string(),
            resource_id: None,
            resource_type: resource_type.to_string(),
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.resource_id = Some(id.to_string());
        self
    }
}

impl ApiError {
    /// Convert API error to HTTP response with consistent structure and logging
    pub fn to_response_with_context(
        self,
        context: ErrorContext,
    ) -> (StatusCode, Json<ApiResponse<()>>) {
        match &self {
            ApiError::NotFound(_) => {
                info!(
                    operation = %context.operation,
                    resource_type = %context.resource_type,
                    resource_id = ?context.resource_id,
                    error = %self,
                    "Resource not found"
                );
                (
                    StatusCode::NOT_FOUND,
                    Json(ApiResponse::error(format!("{} not found", context.resource_type))),
                )
            }
            ApiError::ValidationError(_) => {
                warn!(
                    operation = %context.operation,
                    resource_type = %context.resource_type,
                    resource_id = ?context.resource_id,
                    error = %self,
                    "Rejected request"
                );
                (StatusCode::BAD_REQUEST, Json(ApiResponse::error(self.to_string())))
            }
            ApiError::InvalidState(_) => {
                warn!(
                    operation = %context.operation,
                    resource_type = %context.resource_type,
                    resource_id = ?context.resource_id,
                    error = %self,
                    "Invalid state transition"
                );
                (StatusCode::CONFLICT, Json(ApiResponse::error(self.to_string())))
            }
            ApiError::AiServiceError(message) => {
                error!(
                    operation = %context.operation,
                    resource_type = %context.resource_type,
                    resource_id = ?context.resource_id,
                    error = %self,
                    "AI service error"
                );
                // The raw message is surfaced so the user can see e.g. a missing key.
                (StatusCode::BAD_GATEWAY, Json(ApiResponse::error(message.clone())))
            }
            ApiError::DatabaseError(_) => {
                error!(
                    operation = %context.operation,
                    resource_type = %context.resource_type,
                    resource_id = ?context.resource_id,
                    error = %self,
                    "Database error"
                );
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ApiResponse::error(
                        "Database operation failed. Please try again.".to_string(),
                    )),
                )
            }
        }
    }
}

/// Helper macro for structured error responses
#[macro_export]
macro_rules! api_error {
    (not_found, $operation:expr, $resource_type:expr, $id:expr) => {
        $crate::errors::ApiError::NotFound(format!(
            "{} with id '{}' not found",
            $resource_type, $id
        ))
        .to_response_with_context(
            $crate::errors::ErrorContext::new($operation, $resource_type)
                .with_id(&$id.to_string()),
        )
    };

    (validation, $operation:expr, $resource_type:expr, $message:expr) => {
        $crate::errors::ApiError::ValidationError($message.to_string())
            .to_response_with_context($crate::errors::ErrorContext::new($operation, $resource_type))
    };

    (service, $operation:expr, $resource_type:expr, $error:expr) => {
        $crate::errors::classify_service_error(&$error)
            .to_response_with_context($crate::errors::ErrorContext::new($operation, $resource_type))
    };
}

/// Map an error bubbling out of the store or a service to its API shape
pub fn classify_service_error(error: &anyhow::Error) -> ApiError {
    if let Some(ai_error) = error.downcast_ref::<AiError>() {
        return ApiError::AiServiceError(ai_error.to_string());
    }

    if let Some(domain_error) = error.downcast_ref::<DomainError>() {
        return match domain_error {
            DomainError::NotFound { .. } => ApiError::NotFound(domain_error.to_string()),
            DomainError::Validation(message) => ApiError::ValidationError(message.clone()),
            DomainError::InvalidState(message) => ApiError::InvalidState(message.clone()),
        };
    }

    ApiError::DatabaseError(anyhow::anyhow!("{:#}", error))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_context_creation() {
        let context = ErrorContext::new("delete_song", "song").with_id("123");

        assert_eq!(context.operation, "delete_song");
        assert_eq!(context.resource_type, "song");
        assert_eq!(context.resource_id, Some("123".to_string()));
    }

    #[test]
    fn test_service_error_classification() {
        let missing_key = anyhow::Error::new(AiError::MissingApiKey {
            provider: ProviderId::Gemini,
        });
        assert!(matches!(classify_service_error(&missing_key), ApiError::AiServiceError(_)));

        let not_found = anyhow::Error::new(DomainError::not_found("word", "abc"));
        assert!(matches!(classify_service_error(&not_found), ApiError::NotFound(_)));

        let invalid = anyhow::Error::new(DomainError::InvalidState("already answered".to_string()));
        assert!(matches!(classify_service_error(&invalid), ApiError::InvalidState(_)));

        let validation = anyhow::Error::new(DomainError::Validation("empty".to_string()));
        assert!(matches!(classify_service_error(&validation), ApiError::ValidationError(_)));

        let other = anyhow::anyhow!("disk I/O error");
        assert!(matches!(classify_service_error(&other), ApiError::DatabaseError(_)));
    }

    #[test]
    fn test_classification_sees_through_context() {
        let wrapped =
            anyhow::Error::new(DomainError::not_found("song", "42")).context("deleting song");
        assert!(matches!(classify_service_error(&wrapped), ApiError::NotFound(_)));
    }

    #[test]
    fn test_api_error_responses() {
        let error = ApiError::NotFound("Word not found".to_string());
        let context = ErrorContext::new("get_word", "word").with_id("123");
        let (status, _response) = error.to_response_with_context(context);
        assert_eq!(status, StatusCode::NOT_FOUND);

        let cases = [
            (ApiError::ValidationError("Invalid data".to_string()), StatusCode::BAD_REQUEST),
            (ApiError::InvalidState("awaiting evaluation".to_string()), StatusCode::CONFLICT),
            (ApiError::AiServiceError("timeout".to_string()), StatusCode::BAD_GATEWAY),
            (ApiError::DatabaseError(anyhow::anyhow!("locked")), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (error, expected) in cases {
            let context = ErrorContext::new("submit_answer", "practice session");
            let (status, _) = error.to_response_with_context(context);
            assert_eq!(status, expected);
        }
    }

    #[test]
    fn test_missing_key_message_names_provider() {
        let error = AiError::MissingApiKey {
            provider: ProviderId::OpenAi,
        };
        assert!(error.to_string().contains("openai"));
    }
}
