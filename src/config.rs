use crate::utils::error::ClassifierError;
use crate::Result;
use serde::Serialize;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct Config {
    /// 服务器绑定地址
    pub bind_addr: String,

    /// 模型文件目录
    pub models_dir: PathBuf,

    /// ONNX 模型文件名（相对 models_dir）
    pub model_file: String,

    /// 类别标签文件名（相对 models_dir）
    pub labels_file: String,

    /// 模型缺失时的下载地址
    pub model_url: Option<String>,

    /// 标签文件缺失时的下载地址
    pub labels_url: Option<String>,

    /// 开发模式
    pub dev_mode: bool,

    /// ONNX Runtime配置
    pub onnx_config: OnnxConfig,

    /// 服务器配置
    pub server_config: ServerConfig,

    /// 分类配置
    pub classify_config: ClassifyConfig,
}

#[derive(Debug, Clone)]
pub struct OnnxConfig {
    /// CPU线程数
    pub intra_threads: usize,

    /// 优化级别
    pub optimization_level: i32,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// 请求超时时间（秒）
    pub request_timeout: u64,

    /// 最大请求体大小（字节）
    pub max_request_size: usize,
}

/// 模型输入张量的维度顺序
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TensorLayout {
    /// (1, H, W, 3)，Keras 导出的默认格式
    Nhwc,
    /// (1, 3, H, W)
    Nchw,
}

impl FromStr for TensorLayout {
    type Err = ClassifierError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "nhwc" => Ok(TensorLayout::Nhwc),
            "nchw" => Ok(TensorLayout::Nchw),
            other => Err(ClassifierError::Config(format!(
                "Unknown tensor layout '{}', expected nhwc or nchw",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClassifyConfig {
    /// 模型输入边长（正方形）
    pub input_size: u32,

    /// 返回的预测数量
    pub top_k: usize,

    /// 预览缩略图长边上限
    pub preview_max_edge: u32,

    /// 返回结果前的展示延迟（毫秒），0 表示不延迟
    pub result_delay_ms: u64,

    pub layout: TensorLayout,
}

impl Default for ClassifyConfig {
    fn default() -> Self {
        Self {
            input_size: 224,
            top_k: 3,
            preview_max_edge: 350,
            result_delay_ms: 0,
            layout: TensorLayout::Nhwc,
        }
    }
}

impl Config {
    pub fn new(bind_addr: String, models_dir: String, dev_mode: bool) -> Result<Self> {
        let cpu_cores = num_cpus::get();

        let onnx_config = OnnxConfig {
            intra_threads: (cpu_cores * 3 / 4).max(1), // 使用75%的CPU核心
            optimization_level: 3,
        };

        let server_config = ServerConfig {
            request_timeout: if dev_mode { 300 } else { 60 },
            max_request_size: 50 * 1024 * 1024, // 50MB
        };

        Ok(Self {
            bind_addr,
            models_dir: PathBuf::from(models_dir),
            model_file: "mobilenet_v2.onnx".to_string(),
            labels_file: "imagenet_class_index.json".to_string(),
            model_url: None,
            labels_url: None,
            dev_mode,
            onnx_config,
            server_config,
            classify_config: ClassifyConfig::default(),
        })
    }

    pub fn with_model_file(mut self, model_file: impl Into<String>) -> Self {
        self.model_file = model_file.into();
        self
    }

    pub fn with_labels_file(mut self, labels_file: impl Into<String>) -> Self {
        self.labels_file = labels_file.into();
        self
    }

    pub fn with_model_url(mut self, model_url: Option<String>) -> Self {
        self.model_url = model_url;
        self
    }

    pub fn with_labels_url(mut self, labels_url: Option<String>) -> Self {
        self.labels_url = labels_url;
        self
    }

    pub fn with_classify_config(mut self, classify_config: ClassifyConfig) -> Self {
        self.classify_config = classify_config;
        self
    }

    /// 校验配置取值
    pub fn validate(&self) -> Result<()> {
        let cc = &self.classify_config;
        if cc.top_k == 0 {
            return Err(ClassifierError::Config("top_k must be at least 1".to_string()));
        }
        if cc.input_size == 0 {
            return Err(ClassifierError::Config("input_size must be non-zero".to_string()));
        }
        if cc.preview_max_edge == 0 {
            return Err(ClassifierError::Config(
                "preview_max_edge must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// 获取分类模型路径
    pub fn model_path(&self) -> PathBuf {
        self.models_dir.join(&self.model_file)
    }

    /// 获取标签文件路径
    pub fn labels_path(&self) -> PathBuf {
        self.models_dir.join(&self.labels_file)
    }
}
