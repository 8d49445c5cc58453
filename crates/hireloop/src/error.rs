use crate::config::ConfigError;
use crate::telemetry::TelemetryError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Server(axum::Error),
    Service(ServiceError),
    Export(csv::Error),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Server(err) => write!(f, "server error: {}", err),
            AppError::Service(err) => write!(f, "service error: {}", err),
            AppError::Export(err) => write!(f, "export error: {}", err),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Server(err) => Some(err),
            AppError::Service(err) => Some(err),
            AppError::Export(err) => Some(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Service(err) => err.into_response(),
            other => {
                let body = Json(json!({ "error": other.to_string() }));
                (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
            }
        }
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<axum::Error> for AppError {
    fn from(value: axum::Error) -> Self {
        Self::Server(value)
    }
}

impl From<ServiceError> for AppError {
    fn from(value: ServiceError) -> Self {
        Self::Service(value)
    }
}

impl From<csv::Error> for AppError {
    fn from(value: csv::Error) -> Self {
        Self::Export(value)
    }
}

/// Persistence failures reported by the storage ports.
///
/// The variants mirror the error codes the hosted store reports, so callers can map
/// them to a small set of user facing messages.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("permission denied by row-level policy")]
    PermissionDenied,
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),
    #[error("authentication token expired")]
    TokenExpired,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

impl RepositoryError {
    /// Map a store error code (PostgREST / Postgres style) onto a repository error.
    pub fn from_code(code: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        match code {
            "23505" => RepositoryError::Conflict,
            "PGRST116" => RepositoryError::NotFound,
            "42501" => RepositoryError::PermissionDenied,
            "23502" | "23503" | "23514" => RepositoryError::ConstraintViolation(message),
            "PGRST301" | "PGRST303" => RepositoryError::TokenExpired,
            _ if message.to_ascii_lowercase().contains("jwt expired") => {
                RepositoryError::TokenExpired
            }
            _ => RepositoryError::Unavailable(message),
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            RepositoryError::Conflict => "This record already exists.",
            RepositoryError::NotFound => "The requested record could not be found.",
            RepositoryError::PermissionDenied => "You do not have access to this record.",
            RepositoryError::ConstraintViolation(_) => "Some required information is missing or invalid.",
            RepositoryError::TokenExpired => "Your session has expired. Please sign in again.",
            RepositoryError::Unavailable(_) => "The service is temporarily unavailable. Please try again.",
        }
    }

    pub fn requires_session_refresh(&self) -> bool {
        matches!(self, RepositoryError::TokenExpired)
    }
}

/// Error surfaced by the hiring, e-mail and billing services.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("authentication required")]
    Unauthorized,
    #[error("access denied: {0}")]
    Forbidden(String),
    #[error("plan limit reached: {0}")]
    PlanLimit(String),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("{service} failed: {message}")]
    External {
        service: &'static str,
        message: String,
    },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl ServiceError {
    pub fn validation(message: impl Into<String>) -> Self {
        ServiceError::Validation(message.into())
    }

    pub fn external(service: &'static str, message: impl ToString) -> Self {
        ServiceError::External {
            service,
            message: message.to_string(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::Unauthorized => "UNAUTHORIZED",
            ServiceError::Forbidden(_) => "FORBIDDEN",
            ServiceError::PlanLimit(_) => "PLAN_LIMIT",
            ServiceError::Validation(_) => "VALIDATION_ERROR",
            ServiceError::External { .. } => "EXTERNAL_SERVICE_ERROR",
            ServiceError::Repository(RepositoryError::TokenExpired) => "SESSION_EXPIRED",
            ServiceError::Repository(_) => "PERSISTENCE_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ServiceError::Unauthorized => StatusCode::UNAUTHORIZED,
            ServiceError::Forbidden(_) => StatusCode::FORBIDDEN,
            ServiceError::PlanLimit(_) => StatusCode::PAYMENT_REQUIRED,
            ServiceError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ServiceError::External { .. } => StatusCode::BAD_GATEWAY,
            ServiceError::Repository(err) => match err {
                RepositoryError::Conflict => StatusCode::CONFLICT,
                RepositoryError::NotFound => StatusCode::NOT_FOUND,
                RepositoryError::PermissionDenied => StatusCode::FORBIDDEN,
                RepositoryError::ConstraintViolation(_) => StatusCode::UNPROCESSABLE_ENTITY,
                RepositoryError::TokenExpired => StatusCode::UNAUTHORIZED,
                RepositoryError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            },
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ServiceError::Repository(err) => {
                if matches!(err, RepositoryError::Unavailable(_)) {
                    tracing::error!(error = %err, "persistence failure");
                }
                err.user_message().to_string()
            }
            ServiceError::External { .. } => {
                tracing::warn!(error = %self, "external dependency failure");
                self.to_string()
            }
            other => other.to_string(),
        };

        let body = Json(json!({
            "error": message,
            "code": self.code(),
        }));
        (status, body).into_response()
    }
}
