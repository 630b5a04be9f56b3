use serde::Deserialize;

/// 分类处理选项
#[derive(Debug, Clone, Deserialize)]
pub struct ClassifyOptions {
    /// 返回的预测数量，缺省使用配置值
    #[serde(default)]
    pub top_k: Option<usize>,

    /// 是否生成预览缩略图
    #[serde(default = "default_true")]
    pub include_preview: bool,

    /// 输出格式 ("json", "text")
    #[serde(default)]
    pub output_format: Option<String>,
}

fn default_true() -> bool {
    true
}

impl Default for ClassifyOptions {
    fn default() -> Self {
        Self {
            top_k: None,
            include_preview: true,
            output_format: Some("json".to_string()),
        }
    }
}

/// 处理阶段
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClassifyStage {
    Decoding,
    /// 预处理与推理
    Inference,
    Postprocessing,
    Completed,
}

/// 处理状态
#[derive(Debug, Clone)]
pub struct ClassifyStatus {
    pub stage: ClassifyStage,
    /// 进度 (0.0 - 1.0)
    pub progress: f32,
    pub message: String,
}

impl ClassifyStatus {
    pub fn new(stage: ClassifyStage, progress: f32, message: &str) -> Self {
        Self {
            stage,
            progress,
            message: message.to_string(),
        }
    }
}

// 重新导出主要类型
pub use crate::image::postprocessing::{ClassificationResult, ModelInfo, Prediction};
pub use crate::image::transforms::ImagePreview;
