use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClassifyError {
    #[error("Feature encoding failed: {0}")]
    Encoding(String),

    #[error("Image dimensions unsuitable: {0}")]
    Dimension(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("File too large: {0} bytes, max allowed: {1} bytes")]
    FileTooLarge(usize, usize),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Scoring endpoint error: {0}")]
    Endpoint(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Image decode error: {0}")]
    ImageDecode(#[from] image::ImageError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ClassifyError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ClassifyError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ClassifyError::Dimension(_) => StatusCode::BAD_REQUEST,
            ClassifyError::FileTooLarge(_, _) => StatusCode::PAYLOAD_TOO_LARGE,
            ClassifyError::UnsupportedFormat(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ClassifyError::Base64(_) => StatusCode::BAD_REQUEST,
            ClassifyError::Json(_) => StatusCode::BAD_REQUEST,
            ClassifyError::ImageDecode(_) => StatusCode::BAD_REQUEST,
            ClassifyError::Endpoint(_) => StatusCode::BAD_GATEWAY,
            ClassifyError::Http(_) => StatusCode::BAD_GATEWAY,
            ClassifyError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ClassifyError::Encoding(_) => "FEATURE_ENCODING_ERROR",
            ClassifyError::Dimension(_) => "DIMENSION_ERROR",
            ClassifyError::InvalidInput(_) => "INVALID_INPUT",
            ClassifyError::FileTooLarge(_, _) => "FILE_TOO_LARGE",
            ClassifyError::UnsupportedFormat(_) => "UNSUPPORTED_FORMAT",
            ClassifyError::Endpoint(_) => "ENDPOINT_ERROR",
            ClassifyError::Config(_) => "CONFIG_ERROR",
            ClassifyError::Io(_) => "IO_ERROR",
            ClassifyError::Json(_) => "JSON_ERROR",
            ClassifyError::Base64(_) => "BASE64_DECODE_ERROR",
            ClassifyError::ImageDecode(_) => "IMAGE_DECODE_ERROR",
            ClassifyError::Http(_) => "HTTP_CLIENT_ERROR",
            ClassifyError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ClassifyError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_response = serde_json::json!({
            "error": {
                "code": self.error_code(),
                "message": self.to_string(),
            }
        });

        tracing::error!("Request failed: {} ({})", self, status);

        (status, axum::Json(error_response)).into_response()
    }
}
