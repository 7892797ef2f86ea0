use crate::scoring::ScoringClient;
use crate::utils::error::ClassifyError;
use crate::{Config, Result};
use once_cell::sync::OnceCell;
use std::sync::Arc;

/// 全局打分客户端管理器单例
///
/// 客户端初始化一次后只读共享，请求之间没有共享可变状态。
pub struct ScoringManager {
    client: Arc<ScoringClient>,
    config: Config,
}

static SCORING_MANAGER: OnceCell<Arc<ScoringManager>> = OnceCell::new();

impl ScoringManager {
    /// 初始化全局打分客户端
    pub fn init(config: Config) -> Result<()> {
        tracing::info!("Initializing scoring client...");

        let client = Arc::new(ScoringClient::new(config.scoring.clone())?);

        let manager = ScoringManager {
            client,
            config,
        };

        SCORING_MANAGER.set(Arc::new(manager))
            .map_err(|_| ClassifyError::Internal("Scoring client already initialized".to_string()))?;

        tracing::info!("Scoring client initialized successfully");
        Ok(())
    }

    /// 获取全局管理器实例
    pub fn instance() -> Result<Arc<ScoringManager>> {
        SCORING_MANAGER.get()
            .cloned()
            .ok_or_else(|| ClassifyError::Internal("Scoring client not initialized".to_string()))
    }

    /// 获取打分客户端引用
    pub fn client(&self) -> Arc<ScoringClient> {
        Arc::clone(&self.client)
    }

    /// 获取配置引用
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// 健康检查
    pub fn health_check(&self) -> Result<()> {
        // 客户端构造成功即视为健康；端点可达性在启动探测时单独上报
        tracing::debug!("Scoring client health check passed");
        Ok(())
    }

    /// 获取端点统计信息
    pub fn get_stats(&self) -> EndpointStats {
        EndpointStats {
            endpoint_url: self.client.endpoint_url().to_string(),
            payload_shape: self.client.payload_shape().as_str().to_string(),
            timeout_secs: self.client.timeout_secs(),
            api_key_configured: self.client.has_api_key(),
        }
    }
}

/// 端点统计信息
#[derive(Debug, Clone, serde::Serialize)]
pub struct EndpointStats {
    pub endpoint_url: String,
    pub payload_shape: String,
    pub timeout_secs: u64,
    pub api_key_configured: bool,
}

/// 便捷函数：获取打分客户端
pub fn get_client() -> Result<Arc<ScoringClient>> {
    let manager = ScoringManager::instance()?;
    Ok(manager.client())
}

/// 便捷函数：检查客户端健康状态
pub fn health_check() -> Result<()> {
    let manager = ScoringManager::instance()?;
    manager.health_check()
}

/// 便捷函数：获取端点统计信息
pub fn get_endpoint_stats() -> Result<EndpointStats> {
    let manager = ScoringManager::instance()?;
    Ok(manager.get_stats())
}
