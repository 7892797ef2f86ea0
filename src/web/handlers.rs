use crate::{
    classify::{ClassifyOptions, ClassifyOutcome, ClassifyPipeline, ClassifyStatus},
    utils::error::ClassifyError,
    web::extractors::ValidatedJson,
    Config, Result,
};
use axum::{
    extract::{Multipart, State},
    response::Json,
};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tokio::sync::mpsc;

/// JSON请求体（base64模式）
#[derive(Debug, Deserialize)]
pub struct ClassifyJsonRequest {
    /// Base64编码的图像数据
    pub image: String,

    /// 覆盖配置的请求体形态（"raw" 或 "features"）
    #[serde(default)]
    pub payload_shape: Option<String>,

    /// 严格模式：解码失败按网关错误上报
    #[serde(default)]
    pub strict: bool,
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
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
            request_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    pub fn error(code: String, message: String) -> ApiResponse<()> {
        ApiResponse {
            success: false,
            data: None,
            error: Some(ApiError { code, message }),
            timestamp: chrono::Utc::now().to_rfc3339(),
            request_id: uuid::Uuid::new_v4().to_string(),
        }
    }
}

/// 开发模式下把流水线进度状态转发到日志
fn spawn_status_logger(
    config: &Config,
    request_id: String,
) -> Option<mpsc::UnboundedSender<ClassifyStatus>> {
    if !config.dev_mode {
        return None;
    }

    let (status_tx, mut status_rx) = mpsc::unbounded_channel::<ClassifyStatus>();

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

/// JSON base64上传处理器
pub async fn classify_json_handler(
    State(config): State<Config>,
    ValidatedJson(request): ValidatedJson<ClassifyJsonRequest>,
) -> Result<Json<ApiResponse<ClassifyOutcome>>> {
    let start_time = Instant::now();
    let request_id = uuid::Uuid::new_v4().to_string();

    tracing::info!(
        "Processing JSON classify request: request_id={}, payload_shape={:?}, strict={}",
        request_id, request.payload_shape, request.strict
    );

    // 创建分类选项
    let options = ClassifyOptions {
        payload_shape: request.payload_shape,
        strict: request.strict,
    };

    let status_tx = spawn_status_logger(&config, request_id.clone());

    // 执行分类处理
    let result = ClassifyPipeline::process_base64(&request.image, options, status_tx).await?;

    let processing_time = start_time.elapsed();

    tracing::info!(
        "JSON classify completed: request_id={}, label={}, time={:.3}s",
        request_id,
        result.result.label.as_str(),
        processing_time.as_secs_f32()
    );

    Ok(Json(ApiResponse::success(result)))
}

/// Multipart文件上传处理器
pub async fn classify_upload_handler(
    State(config): State<Config>,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<ClassifyOutcome>>> {
    let start_time = Instant::now();
    let request_id = uuid::Uuid::new_v4().to_string();

    tracing::info!("Processing multipart classify request: request_id={}", request_id);

    let mut image_data: Option<axum::body::Bytes> = None;
    let mut options = ClassifyOptions::default();

    // 解析multipart数据
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        ClassifyError::InvalidInput(format!("Failed to read multipart field: {}", e))
    })? {
        let field_name = field.name().unwrap_or("unknown").to_string();

        match field_name.as_str() {
            "file" => {
                // 验证内容类型
                if let Some(content_type) = field.content_type() {
                    if !content_type.starts_with("image/") {
                        return Err(ClassifyError::UnsupportedFormat(content_type.to_string()));
                    }
                }

                // 读取文件数据
                let data = field.bytes().await.map_err(|e| {
                    ClassifyError::InvalidInput(format!("Failed to read file data: {}", e))
                })?;

                if data.is_empty() {
                    return Err(ClassifyError::InvalidInput("Empty file".to_string()));
                }

                tracing::debug!("Received file: {} bytes", data.len());
                image_data = Some(data);
            }
            "payload_shape" => {
                let value = field.text().await.unwrap_or_default();
                if !value.is_empty() {
                    options.payload_shape = Some(value);
                }
            }
            "strict" => {
                let value = field.text().await.unwrap_or_default();
                options.strict = value.parse().unwrap_or(false);
            }
            _ => {
                tracing::debug!("Ignoring unknown field: {}", field_name);
            }
        }
    }

    // 验证必需的图像数据
    let image_data = image_data.ok_or_else(|| {
        ClassifyError::InvalidInput("No image file provided".to_string())
    })?;

    let status_tx = spawn_status_logger(&config, request_id.clone());

    // 执行分类处理
    let result = ClassifyPipeline::process_bytes(image_data, options, status_tx).await?;

    let processing_time = start_time.elapsed();

    tracing::info!(
        "Upload classify completed: request_id={}, label={}, time={:.3}s",
        request_id,
        result.result.label.as_str(),
        processing_time.as_secs_f32()
    );

    Ok(Json(ApiResponse::success(result)))
}
