use serde::{Deserialize, Serialize};

/// 分类处理选项
#[derive(Debug, Clone, Deserialize)]
pub struct ClassifyOptions {
    /// 覆盖配置的请求体形态（"raw" 或 "features"）
    #[serde(default)]
    pub payload_shape: Option<String>,

    /// 严格模式：响应解码失败按网关错误上报，而不是返回Error标签
    #[serde(default)]
    pub strict: bool,
}

impl Default for ClassifyOptions {
    fn default() -> Self {
        Self {
            payload_shape: None,
            strict: false,
        }
    }
}

/// 完整的分类处理结果
#[derive(Debug, Clone, Serialize)]
pub struct ClassifyOutcome {
    /// 处理耗时（秒）
    pub processing_time: f32,

    /// 归一化的分类结果
    pub result: crate::scoring::ClassificationResult,

    /// 发送的特征向量长度（raw模式下为空）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feature_len: Option<usize>,

    /// 端点信息
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint_info: Option<EndpointInfo>,
}

/// 端点信息
#[derive(Debug, Clone, Serialize)]
pub struct EndpointInfo {
    /// 端点URL
    pub endpoint_url: String,
    /// 实际使用的请求体形态
    pub payload_shape: String,
}

/// 分类处理阶段
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClassifyStage {
    Saving,
    Encoding,
    Scoring,
    Completed,
    Error,
}

/// 分类处理状态
#[derive(Debug, Clone)]
pub struct ClassifyStatus {
    /// 当前处理阶段
    pub stage: ClassifyStage,
    /// 进度百分比 (0.0 - 1.0)
    pub progress: f32,
    /// 状态消息
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
pub use crate::scoring::decoder::{ClassificationResult, Label};
