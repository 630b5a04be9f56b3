use crate::{
    classify::{ClassificationResult, ClassifyOptions, ClassifyStage, ClassifyStatus, Prediction},
    image::{ImageLoader, ImagePreprocessor, ImageTransforms},
    models::ModelHandle,
    utils::error::ClassifierError,
    Result,
};
use axum::body::Bytes;
use image::DynamicImage;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

type StatusSender = Option<mpsc::UnboundedSender<ClassifyStatus>>;

fn report(status_tx: &StatusSender, stage: ClassifyStage, progress: f32, message: &str) {
    if let Some(tx) = status_tx {
        let _ = tx.send(ClassifyStatus::new(stage, progress, message));
    }
}

/// 图像分类流水线：解码 -> 预处理 -> 推理 -> 格式化
pub struct ClassificationPipeline;

impl ClassificationPipeline {
    /// 处理base64图像
    pub async fn process_base64(
        models: Arc<ModelHandle>,
        base64_data: String,
        options: ClassifyOptions,
        status_tx: StatusSender,
    ) -> Result<ClassificationResult> {
        Self::run_blocking(models, options, status_tx, move || {
            ImageLoader::from_base64(&base64_data)
        })
        .await
    }

    /// 处理上传的字节
    pub async fn process_bytes(
        models: Arc<ModelHandle>,
        bytes: Bytes,
        options: ClassifyOptions,
        status_tx: StatusSender,
    ) -> Result<ClassificationResult> {
        Self::run_blocking(models, options, status_tx, move || ImageLoader::from_bytes(&bytes)).await
    }

    /// 解码和推理都是阻塞操作，放到 blocking 线程池执行
    async fn run_blocking<F>(
        models: Arc<ModelHandle>,
        options: ClassifyOptions,
        status_tx: StatusSender,
        decode: F,
    ) -> Result<ClassificationResult>
    where
        F: FnOnce() -> Result<DynamicImage> + Send + 'static,
    {
        let delay = Duration::from_millis(models.classify_config().result_delay_ms);
        let start_time = Instant::now();

        let result = tokio::task::spawn_blocking(move || {
            report(&status_tx, ClassifyStage::Decoding, 0.1, "Decoding image");
            let image = decode()?;
            Self::classify_image(&models, &image, &options, &status_tx, start_time)
        })
        .await
        .map_err(|e| ClassifierError::Internal(format!("Classification task failed: {}", e)))??;

        // 纯展示用途的延迟
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        Ok(result)
    }

    /// 预处理并预测，返回按置信度降序的 top_k 结果
    pub fn predict(models: &ModelHandle, image: &DynamicImage, top_k: usize) -> Result<Vec<Prediction>> {
        let tensor = ImagePreprocessor::to_tensor(image, models.classify_config())?;
        models.predict(&tensor, top_k)
    }

    /// 同步处理已解码的图像
    pub fn classify_image(
        models: &ModelHandle,
        image: &DynamicImage,
        options: &ClassifyOptions,
        status_tx: &StatusSender,
        start_time: Instant,
    ) -> Result<ClassificationResult> {
        let config = models.classify_config();
        let top_k = options.top_k.unwrap_or(config.top_k);

        let preview = if options.include_preview {
            Some(ImageTransforms::preview(image, config.preview_max_edge)?)
        } else {
            None
        };

        report(status_tx, ClassifyStage::Inference, 0.4, "Preprocessing image and running model");
        let inference_start = Instant::now();
        let predictions = Self::predict(models, image, top_k)?;
        let inference_time = inference_start.elapsed();

        report(status_tx, ClassifyStage::Postprocessing, 0.9, "Formatting results");
        let total_time = start_time.elapsed();

        report(
            status_tx,
            ClassifyStage::Completed,
            1.0,
            &format!("Classification completed: {} predictions", predictions.len()),
        );

        if let Some(top) = predictions.first() {
            tracing::info!(
                "Classification completed: top='{}' ({}), inference_time={:.3}s, total_time={:.3}s",
                top.label,
                top.confidence_text,
                inference_time.as_secs_f32(),
                total_time.as_secs_f32()
            );
        }

        Ok(ClassificationResult {
            processing_time: total_time.as_secs_f32(),
            predictions,
            preview,
            model_info: Some(models.model_info()),
        })
    }
}
