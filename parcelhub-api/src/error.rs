/// Error handling for the API server
///
/// This module provides a unified error type that maps to HTTP responses.
/// All handlers return `Result<T, ApiError>`, and every library error has a
/// `From` conversion so `?` picks the right status code.
///
/// # Response Body
///
/// ```json
/// { "error": "conflict", "message": "Parcel is already paid" }
/// ```
///
/// # Example
///
/// ```
/// use parcelhub_api::error::{ApiError, ApiResult};
/// use axum::Json;
/// use serde_json::{json, Value};
///
/// async fn handler(email: Option<String>) -> ApiResult<Json<Value>> {
///     let email = email.ok_or_else(|| ApiError::BadRequest("email is required".to_string()))?;
///     Ok(Json(json!({ "email": email })))
/// }
/// ```

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use parcelhub_shared::auth::authorization::AuthzError;
use parcelhub_shared::auth::identity::IdentityError;
use parcelhub_shared::db::{StoreError, StoreTimeout};
use parcelhub_shared::gateway::GatewayError;
use parcelhub_shared::lifecycle::LifecycleError;
use parcelhub_shared::settlement::SettlementError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// API result type alias
pub type ApiResult<T> = Result<T, ApiError>;

/// Unified API error type
#[derive(Debug)]
pub enum ApiError {
    /// Bad request (400)
    BadRequest(String),

    /// Field-level validation failure (400)
    ValidationError(Vec<ValidationErrorDetail>),

    /// Unauthorized (401) - no usable credential
    Unauthorized(String),

    /// Forbidden (403) - credential rejected or caller not allowed
    Forbidden(String),

    /// Not found (404)
    NotFound(String),

    /// Conflict (409) - duplicate settlement, illegal transition
    Conflict(String),

    /// Bad gateway (502) - the payment processor failed
    BadGateway(String),

    /// Gateway timeout (504) - a collaborator did not answer in time
    Timeout(String),

    /// Internal server error (500)
    InternalError(String),
}

/// Validation error detail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationErrorDetail {
    /// Field that failed validation
    pub field: String,

    /// Error message
    pub message: String,
}

/// Error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code (e.g., "bad_request", "unauthorized")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// Optional validation errors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<ValidationErrorDetail>>,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::ValidationError(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            ApiError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Single-field validation failure
    pub fn invalid_field(field: &str, message: impl Into<String>) -> Self {
        ApiError::ValidationError(vec![ValidationErrorDetail {
            field: field.to_string(),
            message: message.into(),
        }])
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            ApiError::ValidationError(errors) => {
                write!(f, "Validation failed: {} errors", errors.len())
            }
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::BadGateway(msg) => write!(f, "Bad gateway: {}", msg),
            ApiError::Timeout(msg) => write!(f, "Timeout: {}", msg),
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let (error_code, message, details) = match self {
            ApiError::BadRequest(msg) => ("bad_request", msg, None),
            ApiError::ValidationError(errors) => {
                let message = errors
                    .first()
                    .map(|e| e.message.clone())
                    .unwrap_or_else(|| "Request validation failed".to_string());
                ("validation_error", message, Some(errors))
            }
            ApiError::Unauthorized(msg) => ("unauthorized", msg, None),
            ApiError::Forbidden(msg) => ("forbidden", msg, None),
            ApiError::NotFound(msg) => ("not_found", msg, None),
            ApiError::Conflict(msg) => ("conflict", msg, None),
            ApiError::BadGateway(msg) => {
                tracing::warn!("Bad gateway: {}", msg);
                ("bad_gateway", msg, None)
            }
            ApiError::Timeout(msg) => {
                tracing::warn!("Timeout: {}", msg);
                ("timeout", msg, None)
            }
            ApiError::InternalError(msg) => {
                // Log internal errors but don't expose details to clients
                tracing::error!("Internal error: {}", msg);
                ("internal_error", "An internal error occurred".to_string(), None)
            }
        };

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
            details,
        });

        (status, body).into_response()
    }
}

/// Malformed JSON bodies are the caller's fault
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

/// Convert validator errors to API errors
impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let details: Vec<ValidationErrorDetail> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |error| ValidationErrorDetail {
                    field: field.to_string(),
                    message: error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| "Validation failed".to_string()),
                })
            })
            .collect();

        ApiError::ValidationError(details)
    }
}

/// Convert sqlx errors to API errors
impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ApiError::NotFound("Resource not found".to_string()),
            sqlx::Error::PoolTimedOut => ApiError::Timeout("Database did not respond in time".to_string()),
            _ => ApiError::InternalError(format!("Database error: {}", err)),
        }
    }
}

impl From<StoreTimeout> for ApiError {
    fn from(err: StoreTimeout) -> Self {
        ApiError::Timeout(err.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Timeout(timeout) => timeout.into(),
            StoreError::Database(db_err) => db_err.into(),
        }
    }
}

impl From<SettlementError> for ApiError {
    fn from(err: SettlementError) -> Self {
        match err {
            SettlementError::Invalid { field, message } => ApiError::invalid_field(field, message),
            SettlementError::ParcelNotFound(_) => ApiError::NotFound("Parcel not found".to_string()),
            SettlementError::AlreadySettled { .. } => ApiError::Conflict("Parcel is already paid".to_string()),
            SettlementError::Timeout(timeout) => timeout.into(),
            SettlementError::Database(db_err) => db_err.into(),
        }
    }
}

impl From<LifecycleError> for ApiError {
    fn from(err: LifecycleError) -> Self {
        match err {
            LifecycleError::RiderNotFound(_) => ApiError::NotFound("Rider not found".to_string()),
            LifecycleError::Illegal(illegal) => ApiError::Conflict(illegal.to_string()),
            LifecycleError::EmailMismatch { .. } => {
                ApiError::BadRequest("Email does not match the rider's email".to_string())
            }
            LifecycleError::Timeout(timeout) => timeout.into(),
            LifecycleError::Database(db_err) => db_err.into(),
        }
    }
}

/// A token the verifier turned down is forbidden; a verifier that could not
/// answer is our fault
impl From<IdentityError> for ApiError {
    fn from(err: IdentityError) -> Self {
        if !err.is_rejection() {
            return ApiError::InternalError(err.to_string());
        }

        let reason = match err {
            IdentityError::Expired => "Token expired",
            IdentityError::MissingEmail => "Token carries no email",
            _ => "Invalid token",
        };
        ApiError::Forbidden(reason.to_string())
    }
}

/// Convert authorization errors to API errors
impl From<AuthzError> for ApiError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::NotOwner => ApiError::Forbidden("Forbidden access".to_string()),
            AuthzError::InsufficientRole { .. } | AuthzError::UnknownUser(_) => {
                ApiError::Forbidden("Insufficient permissions".to_string())
            }
            AuthzError::Database(db_err) => db_err.into(),
        }
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::InvalidAmount(_) => {
                ApiError::invalid_field("amountInCents", "amountInCents must be a positive integer")
            }
            other => ApiError::BadGateway(other.to_string()),
        }
    }
}
