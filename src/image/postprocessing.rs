use crate::image::transforms::ImagePreview;
use crate::models::labels::ClassLabels;
use crate::utils::error::ClassifierError;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// 单个分类预测
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// 模型输出中的类别下标
    pub index: usize,
    /// 类别标识，例如 WordNet id "n02099712"
    pub class_id: String,
    /// 可读标签
    pub label: String,
    /// 置信度 (0.0 - 1.0)
    pub score: f64,
    /// 百分比文本，保留两位小数，例如 "87.42%"
    pub confidence_text: String,
}

/// 完整的分类结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationResult {
    /// 处理耗时（秒）
    pub processing_time: f32,
    /// 按置信度降序排列的预测
    pub predictions: Vec<Prediction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview: Option<ImagePreview>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_info: Option<ModelInfo>,
}

/// 模型信息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub model_name: String,
    pub num_classes: usize,
    pub input_size: u32,
}

/// 结果格式化器
pub struct ResultFormatter;

impl ResultFormatter {
    /// 把原始分数解码为 top_k 个预测，按置信度降序
    ///
    /// 若输出不是概率分布（存在 [0,1] 之外的值），先做 softmax。
    /// 分数相同时下标小的排在前面。
    pub fn decode_predictions(
        scores: &[f32],
        labels: &ClassLabels,
        top_k: usize,
    ) -> Result<Vec<Prediction>> {
        if scores.len() != labels.len() {
            return Err(ClassifierError::Inference(format!(
                "Model produced {} scores but label table has {} classes",
                scores.len(),
                labels.len()
            )));
        }

        if let Some(bad) = scores.iter().position(|s| !s.is_finite()) {
            return Err(ClassifierError::Inference(format!(
                "Non-finite score at class index {}",
                bad
            )));
        }

        let probabilities = if Self::is_probability_vector(scores) {
            scores.to_vec()
        } else {
            tracing::debug!("Raw scores outside [0,1], applying softmax");
            Self::softmax(scores)
        };

        let mut ranked: Vec<(usize, f32)> = probabilities.into_iter().enumerate().collect();
        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        ranked.truncate(top_k);

        ranked
            .into_iter()
            .map(|(index, score)| {
                let entry = labels.get(index).ok_or_else(|| {
                    ClassifierError::Labels(format!("No label for class index {}", index))
                })?;
                // 在展示边界统一转换为 f64
                let score = (score as f64).clamp(0.0, 1.0);
                Ok(Prediction {
                    index,
                    class_id: entry.class_id.clone(),
                    label: entry.label.clone(),
                    score,
                    confidence_text: Self::format_percentage(score),
                })
            })
            .collect()
    }

    pub fn is_probability_vector(scores: &[f32]) -> bool {
        scores.iter().all(|s| (0.0..=1.0).contains(s))
    }

    pub fn softmax(scores: &[f32]) -> Vec<f32> {
        let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let exps: Vec<f32> = scores.iter().map(|s| (s - max).exp()).collect();
        let sum: f32 = exps.iter().sum();
        exps.into_iter().map(|e| e / sum).collect()
    }

    pub fn format_percentage(score: f64) -> String {
        format!("{:.2}%", score * 100.0)
    }

    /// 纯文本输出，每行一个预测
    pub fn format_text(predictions: &[Prediction]) -> String {
        predictions
            .iter()
            .map(|p| format!("- {}: {} confidence", p.label, p.confidence_text))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
