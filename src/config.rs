use crate::utils::error::ClassifyError;
use crate::Result;

#[derive(Debug, Clone)]
pub struct Config {
    /// 服务器绑定地址
    pub bind_addr: String,

    /// 开发模式
    pub dev_mode: bool,

    /// 远程打分端点配置
    pub scoring: ScoringConfig,

    /// 服务器配置
    pub server_config: ServerConfig,
}

#[derive(Debug, Clone)]
pub struct ScoringConfig {
    /// 打分端点URL
    pub endpoint_url: String,

    /// 订阅密钥（Azure容器实例部署需要）
    pub api_key: Option<String>,

    /// 单次请求超时时间（秒），无重试
    pub timeout_secs: u64,

    /// 端点接受的请求体形态
    pub payload_shape: PayloadShape,
}

/// 端点请求体形态
///
/// 同一个模型曾以两种契约部署过：直接接收图像字节流，或接收
/// 预先计算好的HOG特征向量。形态属于部署配置，不做硬编码假设。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadShape {
    /// 原始图像字节（application/octet-stream）
    OctetStream,
    /// JSON特征向量 {"data": [[f32, ...]]}
    FeatureJson,
}

impl PayloadShape {
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "raw" | "bytes" | "octet-stream" => Ok(PayloadShape::OctetStream),
            "features" | "hog" | "json" => Ok(PayloadShape::FeatureJson),
            other => Err(ClassifyError::Config(format!(
                "Invalid payload shape '{}', expected 'raw' or 'features'",
                other
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PayloadShape::OctetStream => "raw",
            PayloadShape::FeatureJson => "features",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// 请求超时时间（秒）
    pub request_timeout: u64,

    /// 最大请求体大小（字节）
    pub max_request_size: usize,

    /// 最大并发连接数
    pub max_connections: usize,
}

impl Config {
    pub fn new(
        bind_addr: String,
        endpoint_url: String,
        api_key: Option<String>,
        payload_shape: &str,
        dev_mode: bool,
    ) -> Result<Self> {
        // 启动时校验端点URL，避免首个请求才暴露配置错误
        reqwest::Url::parse(&endpoint_url).map_err(|e| {
            ClassifyError::Config(format!("Invalid endpoint URL {}: {}", endpoint_url, e))
        })?;

        let scoring = ScoringConfig {
            endpoint_url,
            api_key,
            timeout_secs: 30, // 单次尽力而为，不重试
            payload_shape: PayloadShape::parse(payload_shape)?,
        };

        let server_config = ServerConfig {
            request_timeout: if dev_mode { 300 } else { 60 }, // 开发模式更长超时
            max_request_size: 10 * 1024 * 1024, // 10MB
            max_connections: if dev_mode { 10 } else { 1000 },
        };

        Ok(Self {
            bind_addr,
            dev_mode,
            scoring,
            server_config,
        })
    }
}
