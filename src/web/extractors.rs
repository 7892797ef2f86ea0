use axum::{
    async_trait,
    extract::{FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;

/// 验证的JSON提取器
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: for<'de> Deserialize<'de> + Validate,
    S: Send + Sync,
{
    type Rejection = ValidationError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|err| ValidationError::JsonParse(err.to_string()))?;

        value.validate()
            .map_err(|e| ValidationError::Validation(e.to_string()))?;

        Ok(ValidatedJson(value))
    }
}

/// 验证trait
pub trait Validate {
    type Error: std::fmt::Display;

    fn validate(&self) -> Result<(), Self::Error>;
}

/// 验证错误类型
#[derive(Debug)]
pub enum ValidationError {
    JsonParse(String),
    Validation(String),
}

impl IntoResponse for ValidationError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            ValidationError::JsonParse(msg) => {
                (StatusCode::BAD_REQUEST, format!("JSON parse error: {}", msg))
            }
            ValidationError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, format!("Validation error: {}", msg))
            }
        };

        let body = serde_json::json!({
            "error": {
                "code": "VALIDATION_ERROR",
                "message": error_message
            }
        });

        (status, Json(body)).into_response()
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::JsonParse(msg) => write!(f, "JSON parse error: {}", msg),
            ValidationError::Validation(msg) => write!(f, "Validation error: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

/// 为分类请求实现验证
impl Validate for crate::web::handlers::ClassifyJsonRequest {
    type Error = String;

    fn validate(&self) -> Result<(), Self::Error> {
        // 验证image字段
        if self.image.trim().is_empty() {
            return Err("Image data cannot be empty".to_string());
        }

        // 验证请求体形态
        if let Some(ref shape) = self.payload_shape {
            if crate::config::PayloadShape::parse(shape).is_err() {
                return Err(format!(
                    "Invalid payload shape '{}'. Supported shapes: raw, features",
                    shape
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::web::handlers::ClassifyJsonRequest;

    #[test]
    fn rejects_empty_image() {
        let request = ClassifyJsonRequest {
            image: "   ".to_string(),
            payload_shape: None,
            strict: false,
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn rejects_unknown_payload_shape() {
        let request = ClassifyJsonRequest {
            image: "aGVsbG8=".to_string(),
            payload_shape: Some("xml".to_string()),
            strict: false,
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn accepts_valid_request() {
        let request = ClassifyJsonRequest {
            image: "aGVsbG8=".to_string(),
            payload_shape: Some("features".to_string()),
            strict: true,
        };
        assert!(request.validate().is_ok());
    }
}
