use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rekon_core::CoreError;
use rekon_import::{ExportError, FetchError, MappingError};
use rekon_storage::StorageError;
use serde_json::json;
use thiserror::Error;

/// Error returned by every handler; rendered as `{"error": ...}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    /// Template or payload failed structural validation.
    #[error("{message}")]
    Invalid { message: String, issues: Vec<String> },
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn not_found(kind: &str, id: impl std::fmt::Display) -> Self {
        ApiError::NotFound(format!("{kind} {id} not found"))
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Invalid { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {self}");
        }

        let body = match &self {
            ApiError::Invalid { message, issues } => json!({ "error": message, "issues": issues }),
            other => json!({ "error": other.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::Conflict(msg) => ApiError::Conflict(msg),
            StorageError::NotFound(kind, id) => ApiError::not_found(kind, id),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(e: CoreError) -> Self {
        ApiError::BadRequest(e.to_string())
    }
}

impl From<MappingError> for ApiError {
    fn from(e: MappingError) -> Self {
        match e {
            MappingError::Invalid(issues) => {
                ApiError::Invalid { message: "Template is invalid".to_string(), issues }
            }
            MappingError::Json(err) => ApiError::Invalid {
                message: "Template JSON is malformed".to_string(),
                issues: vec![err.to_string()],
            },
        }
    }
}

impl From<FetchError> for ApiError {
    fn from(e: FetchError) -> Self {
        match e {
            FetchError::Range(core) => core.into(),
        }
    }
}

impl From<ExportError> for ApiError {
    fn from(e: ExportError) -> Self {
        ApiError::Internal(e.to_string())
    }
}

impl From<std::io::Error> for ApiError {
    fn from(e: std::io::Error) -> Self {
        ApiError::Internal(format!("I/O error: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_errors_map_to_status() {
        let conflict: ApiError = StorageError::Conflict("UNIQUE constraint failed".into()).into();
        assert_eq!(conflict.status(), StatusCode::CONFLICT);

        let missing: ApiError = StorageError::NotFound("submission", 4).into();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
        assert_eq!(missing.to_string(), "submission 4 not found");

        let corrupt: ApiError = StorageError::Corrupt("bad json".into()).into();
        assert_eq!(corrupt.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn template_issues_are_unprocessable() {
        let err: ApiError = MappingError::Invalid(vec!["template needs at least one column".into()]).into();
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
