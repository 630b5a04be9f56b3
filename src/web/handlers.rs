use crate::{
    classify::{ClassificationPipeline, ClassificationResult, ClassifyOptions, ClassifyStatus},
    image::ResultFormatter,
    utils::error::ClassifierError,
    web::{
        extractors::{validate_options, RequestId, ValidatedJson},
        AppState,
    },
    Result,
};
use axum::{
    body::Bytes,
    extract::{multipart::Field, Multipart, State},
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tokio::sync::mpsc;

/// JSON请求体（base64模式）
#[derive(Debug, Deserialize)]
pub struct ClassifyJsonRequest {
    /// Base64编码的图像数据，可带 data URL 前缀
    pub image: String,

    #[serde(flatten)]
    pub options: ClassifyOptions,
}

/// JSON响应格式
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
    pub timestamp: String,
    pub request_id: String,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T, request_id: String) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
            request_id,
        }
    }
}

/// 开发模式下把处理进度写入 debug 日志
fn progress_channel(dev_mode: bool, request_id: &str) -> Option<mpsc::UnboundedSender<ClassifyStatus>> {
    if !dev_mode {
        return None;
    }

    let (status_tx, mut status_rx) = mpsc::unbounded_channel::<ClassifyStatus>();
    let request_id = request_id.to_string();
    tokio::spawn(async move {
        while let Some(status) = status_rx.recv().await {
            tracing::debug!(
                "Classify progress [{}]: {:?} - {:.1}% - {}",
                request_id,
                status.stage,
                status.progress * 100.0,
                status.message
            );
        }
    });
    Some(status_tx)
}

fn render(result: ClassificationResult, options: &ClassifyOptions, request_id: String) -> Response {
    match options.output_format.as_deref() {
        Some("text") => ResultFormatter::format_text(&result.predictions).into_response(),
        _ => Json(ApiResponse::success(result, request_id)).into_response(),
    }
}

/// JSON base64上传处理器
pub async fn classify_json_handler(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
    ValidatedJson(request): ValidatedJson<ClassifyJsonRequest>,
) -> Result<Response> {
    let start_time = Instant::now();

    tracing::info!(
        "Processing JSON classify request: request_id={}, top_k={:?}, output_format={:?}",
        request_id,
        request.options.top_k,
        request.options.output_format
    );

    let status_tx = progress_channel(state.config.dev_mode, &request_id);
    let options = request.options;

    let result = ClassificationPipeline::process_base64(
        state.models.clone(),
        request.image,
        options.clone(),
        status_tx,
    )
    .await?;

    tracing::info!(
        "JSON classify completed: request_id={}, predictions={}, time={:.3}s",
        request_id,
        result.predictions.len(),
        start_time.elapsed().as_secs_f32()
    );

    Ok(render(result, &options, request_id))
}

async fn field_text(field: Field<'_>) -> Result<String> {
    let name = field.name().unwrap_or("unknown").to_string();
    field.text().await.map_err(|e| {
        ClassifierError::InvalidInput(format!("Failed to read field '{}': {}", name, e))
    })
}

/// Multipart文件上传处理器
pub async fn classify_upload_handler(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
    mut multipart: Multipart,
) -> Result<Response> {
    let start_time = Instant::now();

    tracing::info!("Processing multipart classify request: request_id={}", request_id);

    let mut image_data: Option<Bytes> = None;
    let mut options = ClassifyOptions::default();

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        ClassifierError::InvalidInput(format!("Failed to read multipart field: {}", e))
    })? {
        let field_name = field.name().unwrap_or("unknown").to_string();

        match field_name.as_str() {
            "file" => {
                // 声明类型仅记录，格式以内容嗅探为准
                if let Some(content_type) = field.content_type() {
                    tracing::debug!("Declared content type: {}", content_type);
                }

                let data = field.bytes().await.map_err(|e| {
                    ClassifierError::InvalidInput(format!("Failed to read file data: {}", e))
                })?;

                if data.is_empty() {
                    return Err(ClassifierError::InvalidInput("Empty file".to_string()));
                }

                tracing::debug!("Received file: {} bytes", data.len());
                image_data = Some(data);
            }
            "top_k" => {
                let value = field_text(field).await?;
                let top_k = value.trim().parse::<usize>().map_err(|_| {
                    ClassifierError::InvalidInput(format!("Invalid top_k '{}'", value.trim()))
                })?;
                options.top_k = Some(top_k);
            }
            "include_preview" => {
                let value = field_text(field).await?;
                options.include_preview = value.trim().parse().map_err(|_| {
                    ClassifierError::InvalidInput(format!(
                        "Invalid include_preview '{}', expected true or false",
                        value.trim()
                    ))
                })?;
            }
            "output_format" => {
                let value = field_text(field).await?;
                if !value.trim().is_empty() {
                    options.output_format = Some(value.trim().to_string());
                }
            }
            _ => {
                tracing::debug!("Ignoring unknown field: {}", field_name);
            }
        }
    }

    validate_options(options.top_k, options.output_format.as_deref())
        .map_err(ClassifierError::InvalidInput)?;

    let image_data = image_data
        .ok_or_else(|| ClassifierError::InvalidInput("No image file provided".to_string()))?;

    let status_tx = progress_channel(state.config.dev_mode, &request_id);

    let result = ClassificationPipeline::process_bytes(
        state.models.clone(),
        image_data,
        options.clone(),
        status_tx,
    )
    .await?;

    tracing::info!(
        "Upload classify completed: request_id={}, predictions={}, time={:.3}s",
        request_id,
        result.predictions.len(),
        start_time.elapsed().as_secs_f32()
    );

    Ok(render(result, &options, request_id))
}
