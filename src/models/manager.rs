use crate::config::{ClassifyConfig, TensorLayout};
use crate::image::postprocessing::{ModelInfo, Prediction, ResultFormatter};
use crate::models::classifier::{ClassificationModel, OnnxClassifier};
use crate::models::fetch::ensure_file;
use crate::models::labels::ClassLabels;
use crate::utils::error::ClassifierError;
use crate::{Config, Result};
use ndarray::Array4;

/// 进程生命周期内的模型句柄
///
/// 启动时创建一次，之后只读，通过 `Arc` 传给每次预测调用。
pub struct ModelHandle {
    model: Box<dyn ClassificationModel>,
    labels: ClassLabels,
    classify_config: ClassifyConfig,
    intra_threads: usize,
    optimization_level: i32,
}

impl ModelHandle {
    /// 加载 ONNX 模型和标签表，并用一次空输入推理校验两者是否匹配
    pub fn load(config: &Config) -> Result<Self> {
        tracing::info!("Initializing model handle...");

        ensure_file(&config.model_path(), config.model_url.as_deref())?;
        ensure_file(&config.labels_path(), config.labels_url.as_deref())?;

        let model = OnnxClassifier::new(config)?;
        let labels = ClassLabels::load(&config.labels_path())?;

        let handle = Self::new(model, labels, config.classify_config.clone())
            .with_onnx_stats(config.onnx_config.intra_threads, config.onnx_config.optimization_level);
        handle.verify()?;

        tracing::info!("Model handle initialized successfully");
        Ok(handle)
    }

    pub fn new(
        model: impl ClassificationModel + 'static,
        labels: ClassLabels,
        classify_config: ClassifyConfig,
    ) -> Self {
        Self {
            model: Box::new(model),
            labels,
            classify_config,
            intra_threads: 0,
            optimization_level: 0,
        }
    }

    fn with_onnx_stats(mut self, intra_threads: usize, optimization_level: i32) -> Self {
        self.intra_threads = intra_threads;
        self.optimization_level = optimization_level;
        self
    }

    /// 预热推理，确认输出类别数与标签表一致
    pub fn verify(&self) -> Result<()> {
        let scores = self.model.infer(self.zero_input().view())?;
        if scores.len() != self.labels.len() {
            return Err(ClassifierError::ModelLoad(format!(
                "Model '{}' outputs {} classes but label table has {}",
                self.model.name(),
                scores.len(),
                self.labels.len()
            )));
        }
        tracing::debug!("Model warm-up passed: {} classes", scores.len());
        Ok(())
    }

    fn zero_input(&self) -> Array4<f32> {
        let size = self.classify_config.input_size as usize;
        match self.classify_config.layout {
            TensorLayout::Nhwc => Array4::zeros((1, size, size, 3)),
            TensorLayout::Nchw => Array4::zeros((1, 3, size, size)),
        }
    }

    /// 推理并解码为 top_k 个预测
    pub fn predict(&self, tensor: &Array4<f32>, top_k: usize) -> Result<Vec<Prediction>> {
        let scores = self.model.infer(tensor.view())?;
        ResultFormatter::decode_predictions(&scores, &self.labels, top_k)
    }

    pub fn classify_config(&self) -> &ClassifyConfig {
        &self.classify_config
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    /// 随结果返回的模型摘要，取自 `get_stats`
    pub fn model_info(&self) -> ModelInfo {
        let stats = self.get_stats();
        ModelInfo {
            model_name: stats.model_name,
            num_classes: stats.num_classes,
            input_size: stats.input_size,
        }
    }

    /// 获取模型统计信息
    pub fn get_stats(&self) -> ModelStats {
        ModelStats {
            model_name: self.model.name().to_string(),
            num_classes: self.labels.len(),
            input_size: self.classify_config.input_size,
            layout: self.classify_config.layout,
            top_k: self.classify_config.top_k,
            intra_threads: self.intra_threads,
            optimization_level: self.optimization_level,
        }
    }
}

/// 模型统计信息
#[derive(Debug, Clone, serde::Serialize)]
pub struct ModelStats {
    pub model_name: String,
    pub num_classes: usize,
    pub input_size: u32,
    pub layout: TensorLayout,
    pub top_k: usize,
    pub intra_threads: usize,
    pub optimization_level: i32,
}
