use anyhow::Result;
use clap::Parser;
use image_classifier::{
    config::{ClassifyConfig, Config, TensorLayout},
    web::serve,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "image-classifier")]
#[command(about = "ONNX-powered image classification service")]
struct Args {
    /// Server bind address
    #[arg(long, default_value = "0.0.0.0:5005")]
    bind: String,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Model directory path
    #[arg(long, default_value = "models")]
    models_dir: String,

    /// ONNX model file name inside the models directory
    #[arg(long, default_value = "mobilenet_v2.onnx")]
    model_file: String,

    /// Class label file (Keras class index JSON or one label per line)
    #[arg(long, default_value = "imagenet_class_index.json")]
    labels_file: String,

    /// Download the model from this URL if the file is missing
    #[arg(long)]
    model_url: Option<String>,

    /// Download the label file from this URL if it is missing
    #[arg(long)]
    labels_url: Option<String>,

    /// Number of predictions to return
    #[arg(long, default_value_t = 3)]
    top_k: usize,

    /// Cosmetic delay before results are returned, in milliseconds
    #[arg(long, default_value_t = 0)]
    result_delay_ms: u64,

    /// Model input layout: nhwc or nchw
    #[arg(long, default_value = "nhwc")]
    layout: TensorLayout,

    /// Enable development mode
    #[arg(long)]
    dev: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // 初始化日志系统
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .with_target(false)
        .init();

    tracing::info!("Starting image classifier service...");
    tracing::info!("Bind address: {}", args.bind);
    tracing::info!("Models directory: {}", args.models_dir);

    let config = Config::new(args.bind, args.models_dir, args.dev)?
        .with_model_file(args.model_file)
        .with_labels_file(args.labels_file)
        .with_model_url(args.model_url)
        .with_labels_url(args.labels_url)
        .with_classify_config(ClassifyConfig {
            top_k: args.top_k,
            result_delay_ms: args.result_delay_ms,
            layout: args.layout,
            ..ClassifyConfig::default()
        });

    serve(config).await?;

    Ok(())
}
