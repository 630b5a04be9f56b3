pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod ui;

use crate::{models::ModelHandle, utils::error::ClassifierError, Config, Result};
use axum::{
    extract::{DefaultBodyLimit, State},
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, timeout::TimeoutLayer};

/// 路由共享状态
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub models: Arc<ModelHandle>,
}

impl AppState {
    pub fn new(config: Config, models: ModelHandle) -> Self {
        Self {
            config,
            models: Arc::new(models),
        }
    }
}

pub async fn serve(config: Config) -> Result<()> {
    config.validate()?;

    // 启动时加载模型，失败即退出
    let load_config = config.clone();
    let models = tokio::task::spawn_blocking(move || ModelHandle::load(&load_config))
        .await
        .map_err(|e| ClassifierError::Internal(format!("Model loading task failed: {}", e)))??;

    let state = AppState::new(config.clone(), models);
    let app = create_app(state);

    let addr: SocketAddr = config.bind_addr.parse().map_err(|e| {
        ClassifierError::Config(format!("Invalid bind address {}: {}", config.bind_addr, e))
    })?;

    tracing::info!("Server starting on http://{}", addr);
    tracing::info!("API endpoints:");
    tracing::info!("  POST /classify        - JSON base64 upload");
    tracing::info!("  POST /classify/upload - Multipart file upload");
    tracing::info!("  GET  /                - Web UI");
    tracing::info!("  GET  /health          - Health check");
    tracing::info!("  GET  /api/info        - Service information");

    let listener = TcpListener::bind(&addr).await.map_err(|e| {
        ClassifierError::Internal(format!("Failed to bind to address {}: {}", addr, e))
    })?;

    axum::serve(listener, app)
        .await
        .map_err(|e| ClassifierError::Internal(format!("Server failed to start: {}", e)))?;

    Ok(())
}

pub fn create_app(state: AppState) -> Router {
    let server_config = state.config.server_config.clone();

    Router::new()
        .route("/classify", post(handlers::classify_json_handler))
        .route("/classify/upload", post(handlers::classify_upload_handler))
        .route("/", get(ui::index_handler))
        .route("/health", get(health_handler))
        .route("/api/info", get(info_handler))
        // axum 默认 2MB 上限，交给 RequestBodyLimitLayer 统一限制
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(server_config.max_request_size))
        .layer(TimeoutLayer::new(Duration::from_secs(server_config.request_timeout)))
        .layer(axum::middleware::from_fn(middleware::security_headers))
        .layer(axum::middleware::from_fn(middleware::request_logging))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// 健康检查端点
async fn health_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "model": state.models.model_name(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// 服务信息端点
async fn info_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    let stats = state.models.get_stats();
    Json(json!({
        "service": "Image Classifier Service",
        "version": env!("CARGO_PKG_VERSION"),
        "description": env!("CARGO_PKG_DESCRIPTION"),
        "models": stats,
        "features": {
            "dual_upload_modes": true,
            "preview": true,
            "supported_formats": ["jpg", "jpeg", "png"],
            "result_delay_ms": state.config.classify_config.result_delay_ms
        }
    }))
}
