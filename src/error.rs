//! Canonical error codes and the JSON error envelope.
//!
//! `AppError` carries an `ErrorCode` and implements `IntoResponse`,
//! mapping each variant to a status code and a structured JSON body.

use axum::{http::StatusCode, response::IntoResponse, response::Response, Json};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidRequest,
    PaymentIdRequired,
    PaymentKeyNotFound,
    PaymentIdMismatch,
    InsufficientFunds,
    CardDeclined,
    AuthenticationFailed,
    NoHealthyServers,
    NoEligibleProviders,
    GatewayUnavailable,
    GatewayTimeout,
    ProviderError,
    RateLimited,
    ProviderDown,
    ConnectionReset,
    ConnectionTimeout,
    NetworkError,
    MalformedResponse,
    InternalError,
    CircuitOpen,
    ComplianceFailed,
    KycRequired,
    Conflict,
    InvalidStateChange,
}

impl ErrorCode {
    fn status(self) -> StatusCode {
        use ErrorCode::*;
        match self {
            InvalidRequest | PaymentIdRequired | InvalidStateChange => StatusCode::BAD_REQUEST,
            PaymentKeyNotFound => StatusCode::NOT_FOUND,
            PaymentIdMismatch | AuthenticationFailed => StatusCode::UNAUTHORIZED,
            InsufficientFunds | CardDeclined | ComplianceFailed | KycRequired => {
                StatusCode::FORBIDDEN
            }
            Conflict => StatusCode::CONFLICT,
            RateLimited => StatusCode::TOO_MANY_REQUESTS,
            NoHealthyServers | NoEligibleProviders | GatewayUnavailable | ProviderDown
            | CircuitOpen => StatusCode::SERVICE_UNAVAILABLE,
            GatewayTimeout | ConnectionTimeout => StatusCode::GATEWAY_TIMEOUT,
            ProviderError | ConnectionReset | NetworkError | MalformedResponse => {
                StatusCode::BAD_GATEWAY
            }
            InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether an outcome tagged with this code should be retried by the dispatcher.
    pub fn is_retryable(self) -> bool {
        use ErrorCode::*;
        matches!(
            self,
            RateLimited
                | ProviderError
                | GatewayTimeout
                | ProviderDown
                | ConnectionReset
                | ConnectionTimeout
                | NetworkError
        )
    }
}

#[derive(Debug)]
pub struct AppError {
    pub code: ErrorCode,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl AppError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    error_code: ErrorCode,
    message: String,
    status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.code.status();
        tracing::warn!(code = ?self.code, message = %self.message, "request failed");
        let body = ErrorBody {
            success: false,
            error_code: self.code,
            message: self.message,
            status: status.as_u16(),
            details: self.details,
        };
        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
