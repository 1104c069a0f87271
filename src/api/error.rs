//! API error types with structured JSON responses.

use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::document::DocumentId;
use crate::lifecycle::LifecycleError;

/// Structured error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    /// Set when the failure concerns a persisted document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_id: Option<DocumentId>,
}

/// Caller-facing errors with HTTP status mapping
#[derive(Debug)]
pub enum ApiError {
    Lifecycle(LifecycleError),
    /// The multipart body could not be read; carries the status axum assigns
    /// (413 when the body limit was hit)
    Upload { status: StatusCode, message: String },
}

impl From<LifecycleError> for ApiError {
    fn from(err: LifecycleError) -> Self {
        ApiError::Lifecycle(err)
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        ApiError::Upload {
            status: err.status(),
            message: err.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = match self {
            ApiError::Lifecycle(err) => err,
            ApiError::Upload { status, message } => {
                let code = if status == StatusCode::PAYLOAD_TOO_LARGE {
                    "PAYLOAD_TOO_LARGE"
                } else {
                    "VALIDATION"
                };
                return error_response(status, code, format!("unreadable upload: {message}"), None);
            }
        };

        let (status, code, message, document_id) = match err {
            LifecycleError::Validation(detail) => {
                (StatusCode::BAD_REQUEST, "VALIDATION", detail, None)
            }
            LifecycleError::UnsupportedFormat(format) => (
                StatusCode::BAD_REQUEST,
                "UNSUPPORTED_FORMAT",
                format!("Unsupported format: {format}"),
                None,
            ),
            LifecycleError::NotFound(detail) => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                format!("Not found: {detail}"),
                None,
            ),
            LifecycleError::Summarization { id, reason } => (
                StatusCode::BAD_GATEWAY,
                "SUMMARIZATION_FAILED",
                reason,
                Some(id),
            ),
            LifecycleError::Conflict { id, reason } => {
                (StatusCode::CONFLICT, "CONFLICT", reason, Some(id))
            }
            LifecycleError::Storage(e) => {
                tracing::error!(error = %e, "API storage error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
            LifecycleError::Internal(detail) => {
                tracing::error!(detail, "API internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };
        error_response(status, code, message, document_id)
    }
}

fn error_response(
    status: StatusCode,
    code: &str,
    message: String,
    document_id: Option<DocumentId>,
) -> Response {
    let body = ErrorBody {
        error: ErrorDetail {
            code: code.to_string(),
            message,
            document_id,
        },
    };
    (status, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn render(err: LifecycleError) -> (StatusCode, serde_json::Value) {
        let response = ApiError::from(err).into_response();
        let status = response.status();
        let body = to_bytes(response.into_body(), 4096).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn validation_returns_400() {
        let (status, json) = render(LifecycleError::Validation("title is required".into())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"]["code"], "VALIDATION");
        assert_eq!(json["error"]["message"], "title is required");
    }

    #[tokio::test]
    async fn summarization_returns_502_with_document_id() {
        let (status, json) = render(LifecycleError::Summarization {
            id: DocumentId(12),
            reason: "timed out".into(),
        })
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(json["error"]["code"], "SUMMARIZATION_FAILED");
        assert_eq!(json["error"]["document_id"], 12);
    }

    #[tokio::test]
    async fn unsupported_format_returns_400() {
        let (status, json) = render(LifecycleError::UnsupportedFormat("pdf".into())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"]["code"], "UNSUPPORTED_FORMAT");
    }

    #[tokio::test]
    async fn not_found_returns_404() {
        let (status, _) = render(LifecycleError::NotFound("document 9".into())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn upload_errors_keep_their_status() {
        let response = ApiError::Upload {
            status: StatusCode::PAYLOAD_TOO_LARGE,
            message: "length limit exceeded".into(),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        let body = to_bytes(response.into_body(), 4096).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"]["code"], "PAYLOAD_TOO_LARGE");
    }

    #[tokio::test]
    async fn internal_hides_details() {
        let (status, json) = render(LifecycleError::Internal("zip writer broke".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["error"]["message"], "An internal error occurred");
    }
}
