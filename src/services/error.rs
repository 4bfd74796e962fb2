use crate::dtos::ErrorResponse;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("cannot parse json")]
    MalformedBody,

    #[error("invalid {0} format")]
    InvalidIdentifier(&'static str),

    #[error("no batch was found")]
    BatchNotFound,

    #[error("the batch is expired")]
    BatchExpired,

    #[error("no code found")]
    NoCodeAvailable,

    #[error("rule conditions not met")]
    RuleNotMet,

    #[error("No CSV file provided")]
    MissingCsvFile,

    #[error("File must be a CSV")]
    NotACsvFile,

    #[error("CSV must contain 'code' and 'client_id' columns")]
    MissingCsvColumns,

    #[error("Batch name is required")]
    MissingBatchName,

    #[error("invalid rules JSON: {0}")]
    InvalidRules(#[from] serde_json::Error),

    #[error("Failed to upload codes: {0}")]
    Ingest(anyhow::Error),

    #[error("redemption deadline exceeded")]
    DeadlineExceeded,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            ServiceError::MalformedBody
            | ServiceError::InvalidIdentifier(_)
            | ServiceError::MissingCsvFile
            | ServiceError::NotACsvFile
            | ServiceError::MissingCsvColumns
            | ServiceError::MissingBatchName
            | ServiceError::InvalidRules(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            ServiceError::BatchNotFound | ServiceError::NoCodeAvailable => {
                (StatusCode::NOT_FOUND, self.to_string())
            }
            ServiceError::BatchExpired | ServiceError::RuleNotMet => {
                (StatusCode::FORBIDDEN, self.to_string())
            }
            ServiceError::Ingest(_) => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
            // Backend failures are opaque to callers; details go to the log.
            ServiceError::DeadlineExceeded | ServiceError::Database(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "database error".to_string(),
            ),
        };

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "Service error");
        }

        (
            status,
            Json(ErrorResponse {
                error: error_message,
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn business_outcomes_map_to_their_status_codes() {
        assert_eq!(
            ServiceError::InvalidIdentifier("batch_id")
                .into_response()
                .status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::BatchNotFound.into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServiceError::NoCodeAvailable.into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServiceError::BatchExpired.into_response().status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ServiceError::RuleNotMet.into_response().status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ServiceError::DeadlineExceeded.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn identifier_errors_name_the_field() {
        assert_eq!(
            ServiceError::InvalidIdentifier("batch_id").to_string(),
            "invalid batch_id format"
        );
        assert_eq!(
            ServiceError::InvalidIdentifier("customer_id").to_string(),
            "invalid customer_id format"
        );
    }
}
