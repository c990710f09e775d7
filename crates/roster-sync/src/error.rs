use crate::config::ConfigError;
use crate::telemetry::TelemetryError;
use crate::workflows::roster::{IngestionError, ReviewError, SnapshotError};
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
    Ingestion(IngestionError),
    Review(ReviewError),
    Snapshot(SnapshotError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Server(err) => write!(f, "server error: {}", err),
            AppError::Ingestion(err) => write!(f, "roster upload failed: {}", err),
            AppError::Review(err) => write!(f, "review queue error: {}", err),
            AppError::Snapshot(err) => write!(f, "roster state error: {}", err),
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
            AppError::Ingestion(err) => Some(err),
            AppError::Review(err) => Some(err),
            AppError::Snapshot(err) => Some(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Ingestion(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Review(ReviewError::NotFound(_))
            | AppError::Review(ReviewError::ContractorNotFound(_)) => StatusCode::NOT_FOUND,
            AppError::Review(ReviewError::AlreadyResolved(_)) => StatusCode::CONFLICT,
            AppError::Review(ReviewError::Repository(_))
            | AppError::Config(_)
            | AppError::Telemetry(_)
            | AppError::Io(_)
            | AppError::Server(_)
            | AppError::Snapshot(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
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

impl From<IngestionError> for AppError {
    fn from(value: IngestionError) -> Self {
        Self::Ingestion(value)
    }
}

impl From<ReviewError> for AppError {
    fn from(value: ReviewError) -> Self {
        Self::Review(value)
    }
}

impl From<SnapshotError> for AppError {
    fn from(value: SnapshotError) -> Self {
        Self::Snapshot(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::roster::{RepositoryError, ReviewEntryId};

    #[test]
    fn review_errors_map_to_client_statuses() {
        let missing = AppError::from(ReviewError::NotFound(ReviewEntryId(3))).into_response();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        let resolved =
            AppError::from(ReviewError::AlreadyResolved(ReviewEntryId(3))).into_response();
        assert_eq!(resolved.status(), StatusCode::CONFLICT);

        let store = AppError::from(ReviewError::Repository(RepositoryError::Unavailable(
            "offline".to_string(),
        )))
        .into_response();
        assert_eq!(store.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn failed_uploads_are_unprocessable() {
        let err = AppError::from(IngestionError::Repository(RepositoryError::NotFound));
        assert!(err.to_string().starts_with("roster upload failed:"));
        assert_eq!(err.into_response().status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
