pub mod classifier;
pub mod fetch;
pub mod labels;
pub mod manager;

pub use classifier::{ClassificationModel, OnnxClassifier};
pub use labels::{ClassLabels, LabelEntry};
pub use manager::{ModelHandle, ModelStats};
