use axum::{
    extract::{FromRequest, FromRequestParts, Request},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::de::DeserializeOwned;

/// 验证的JSON提取器
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate + Send,
    S: Send + Sync,
{
    type Rejection = ValidationError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|err| ValidationError::JsonParse(err.body_text()))?;

        value
            .validate()
            .map_err(|err| ValidationError::Validation(err.to_string()))?;

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
        let body = serde_json::json!({
            "error": {
                "code": "VALIDATION_ERROR",
                "message": self.to_string()
            }
        });

        tracing::warn!("Request rejected: {}", self);

        (StatusCode::BAD_REQUEST, Json(body)).into_response()
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

pub const OUTPUT_FORMATS: [&str; 2] = ["json", "text"];

/// 校验 top_k 与输出格式，JSON 与 multipart 两种上传共用
pub fn validate_options(top_k: Option<usize>, output_format: Option<&str>) -> Result<(), String> {
    if top_k == Some(0) {
        return Err("top_k must be at least 1".to_string());
    }

    if let Some(format) = output_format {
        if !OUTPUT_FORMATS.contains(&format) {
            return Err(format!(
                "Invalid output format '{}'. Supported formats: {}",
                format,
                OUTPUT_FORMATS.join(", ")
            ));
        }
    }

    Ok(())
}

impl Validate for crate::web::handlers::ClassifyJsonRequest {
    type Error = String;

    fn validate(&self) -> Result<(), Self::Error> {
        if self.image.trim().is_empty() {
            return Err("Image data cannot be empty".to_string());
        }

        validate_options(self.options.top_k, self.options.output_format.as_deref())
    }
}

/// 请求ID提取器
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

impl<S> FromRequestParts<S> for RequestId
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let request_id = parts
            .headers
            .get("X-Request-ID")
            .and_then(|value| value.to_str().ok())
            .map(|s| s.to_string())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        Ok(RequestId(request_id))
    }
}
