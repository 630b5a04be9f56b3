use crate::utils::error::ClassifierError;
use crate::{Config, Result};
use ndarray::ArrayView4;
use ort::{
    inputs,
    session::{builder::GraphOptimizationLevel, Session},
    value::Tensor,
};
use parking_lot::Mutex;

/// 冻结的预训练分类模型：输入归一化张量，输出每个类别一个分数
pub trait ClassificationModel: Send + Sync {
    fn infer(&self, input: ArrayView4<'_, f32>) -> Result<Vec<f32>>;

    fn name(&self) -> &str;
}

pub struct OnnxClassifier {
    session: Mutex<Session>,
    input_name: String,  // 动态发现的输入名称
    output_name: String, // 动态发现的输出名称
    name: String,
}

impl OnnxClassifier {
    pub fn new(config: &Config) -> Result<Self> {
        let model_path = config.model_path();

        if !model_path.exists() {
            return Err(ClassifierError::ModelLoad(format!(
                "Classification model not found: {}",
                model_path.display()
            )));
        }

        tracing::info!("Loading classification model from: {}", model_path.display());

        let level = match config.onnx_config.optimization_level {
            0 => GraphOptimizationLevel::Disable,
            1 => GraphOptimizationLevel::Level1,
            2 => GraphOptimizationLevel::Level2,
            _ => GraphOptimizationLevel::Level3,
        };

        let session = Session::builder()?
            .with_optimization_level(level)?
            .with_intra_threads(config.onnx_config.intra_threads)?
            .commit_from_file(&model_path)?;

        let input_name = match session.inputs.first() {
            Some(input) => input.name.clone(),
            None => {
                return Err(ClassifierError::ModelLoad(
                    "Classification model has no inputs".to_string(),
                ))
            }
        };

        let output_name = match session.outputs.first() {
            Some(output) => output.name.clone(),
            None => {
                return Err(ClassifierError::ModelLoad(
                    "Classification model has no outputs".to_string(),
                ))
            }
        };

        tracing::info!(
            "Classification model input: '{}', output: '{}'",
            input_name,
            output_name
        );
        for (i, output) in session.outputs.iter().enumerate() {
            tracing::debug!("Classification output[{}]: '{}'", i, output.name);
        }

        let name = model_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("classifier")
            .to_string();

        Ok(Self {
            session: Mutex::new(session),
            input_name,
            output_name,
            name,
        })
    }
}

impl ClassificationModel for OnnxClassifier {
    fn infer(&self, input: ArrayView4<'_, f32>) -> Result<Vec<f32>> {
        let input_tensor = Tensor::from_array(input.to_owned())?;

        let mut session = self.session.lock();
        let outputs = session.run(inputs![self.input_name.as_str() => input_tensor])?;

        let scores = match outputs.get(&self.output_name) {
            Some(output) => output.try_extract_array::<f32>()?,
            None => {
                let available_outputs: Vec<String> =
                    outputs.keys().map(|s| s.to_string()).collect();
                return Err(ClassifierError::Inference(format!(
                    "Classification output '{}' not found. Available outputs: {:?}",
                    self.output_name, available_outputs
                )));
            }
        };

        // 期望 (1, num_classes)
        let shape = scores.shape().to_vec();
        if shape.len() != 2 || shape[0] != 1 {
            return Err(ClassifierError::Inference(format!(
                "Expected classification output of shape [1, N], got {:?}",
                shape
            )));
        }

        Ok(scores.iter().copied().collect())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
