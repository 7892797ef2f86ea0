use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use waste_classify::{config::Config, web::serve};

#[derive(Parser)]
#[command(name = "waste-classify")]
#[command(about = "Waste image classification gateway backed by a remote scoring endpoint")]
struct Args {
    /// Server bind address
    #[arg(long, default_value = "0.0.0.0:5005")]
    bind: String,

    /// Remote scoring endpoint URL
    #[arg(long, default_value = "http://localhost:8000/score")]
    endpoint: String,

    /// Scoring endpoint subscription key
    #[arg(long, env = "SCORE_API_KEY")]
    api_key: Option<String>,

    /// Payload shape sent to the endpoint: "raw" or "features"
    #[arg(long, default_value = "raw")]
    payload_shape: String,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

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
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&args.log_level))
        )
        .with_target(false)
        .init();

    tracing::info!("Starting waste classification service...");
    tracing::info!("Bind address: {}", args.bind);
    tracing::info!("Scoring endpoint: {}", args.endpoint);
    tracing::info!("Payload shape: {}", args.payload_shape);

    // 创建配置
    let config = Config::new(
        args.bind,
        args.endpoint,
        args.api_key,
        &args.payload_shape,
        args.dev,
    )?;

    // 启动服务器
    serve(config).await?;

    Ok(())
}
