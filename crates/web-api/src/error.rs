use application::ApplicationError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                code,
                message: message.into(),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "FORBIDDEN", message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", message)
    }
}

impl From<ApplicationError> for ApiError {
    fn from(error: ApplicationError) -> Self {
        use ApplicationError as AppErr;

        match &error {
            AppErr::Authentication => {
                ApiError::new(StatusCode::UNAUTHORIZED, "AUTHENTICATION_FAILED", "authentication failed")
            }
            AppErr::Forbidden(_) => {
                ApiError::new(StatusCode::FORBIDDEN, "FORBIDDEN", error.client_message())
            }
            AppErr::Validation { .. } => {
                ApiError::new(StatusCode::BAD_REQUEST, "INVALID_EVENT", error.client_message())
            }
            AppErr::RecipientUnknown(_) => {
                ApiError::new(StatusCode::NOT_FOUND, "UNKNOWN_RECIPIENT", error.client_message())
            }
            AppErr::Persistence(_) => ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "PERSISTENCE_FAILED",
                error.client_message(),
            ),
            AppErr::Capacity => ApiError::new(
                StatusCode::SERVICE_UNAVAILABLE,
                "CAPACITY_EXHAUSTED",
                error.client_message(),
            ),
            // 内部错误不向客户端泄露细节
            AppErr::Internal(_) => ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                error.client_message(),
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}
