use crate::config::{PayloadShape, ScoringConfig};
use crate::image::FeatureVector;
use crate::scoring::decoder::{ClassificationResult, ResponseDecoder};
use crate::utils::error::ClassifyError;
use crate::Result;
use std::time::Duration;

/// Azure容器实例部署使用的订阅密钥请求头
const SUBSCRIPTION_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";

/// 远程打分端点客户端
///
/// 单次尽力而为：请求超时由配置约束（默认30秒），无自动重试，
/// 失败以描述性错误可见地上报。
pub struct ScoringClient {
    client: reqwest::Client,
    config: ScoringConfig,
}

impl ScoringClient {
    pub fn new(config: ScoringConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(ClassifyError::Http)?;

        Ok(Self { client, config })
    }

    pub fn endpoint_url(&self) -> &str {
        &self.config.endpoint_url
    }

    pub fn payload_shape(&self) -> PayloadShape {
        self.config.payload_shape
    }

    pub fn timeout_secs(&self) -> u64 {
        self.config.timeout_secs
    }

    pub fn has_api_key(&self) -> bool {
        self.config.api_key.is_some()
    }

    /// 发送原始图像字节（application/octet-stream契约）
    pub async fn score_bytes(&self, image_bytes: Vec<u8>) -> Result<ClassificationResult> {
        tracing::info!(
            "Sending {} bytes of raw image data to {}",
            image_bytes.len(),
            self.config.endpoint_url
        );

        let mut request = self
            .client
            .post(&self.config.endpoint_url)
            .header("Content-Type", "application/octet-stream")
            .header("Accept", "application/json")
            .body(image_bytes);

        if let Some(ref key) = self.config.api_key {
            request = request.header(SUBSCRIPTION_KEY_HEADER, key);
        }

        self.dispatch(request).await
    }

    /// 发送预计算的HOG特征向量（JSON契约）
    pub async fn score_features(&self, features: &FeatureVector) -> Result<ClassificationResult> {
        tracing::info!(
            "Sending {}-element feature vector to {}",
            features.len(),
            self.config.endpoint_url
        );

        let body = build_feature_payload(features);

        let mut request = self
            .client
            .post(&self.config.endpoint_url)
            .header("Accept", "application/json")
            .json(&body);

        if let Some(ref key) = self.config.api_key {
            request = request.header(SUBSCRIPTION_KEY_HEADER, key);
        }

        self.dispatch(request).await
    }

    async fn dispatch(&self, request: reqwest::RequestBuilder) -> Result<ClassificationResult> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ClassifyError::Endpoint(format!(
                    "Scoring request timed out after {}s",
                    self.config.timeout_secs
                ))
            } else {
                ClassifyError::Http(e)
            }
        })?;

        let status = response.status();
        let body = response.bytes().await.map_err(ClassifyError::Http)?;

        if !status.is_success() {
            return Err(ClassifyError::Endpoint(format!(
                "Scoring endpoint returned {}: {}",
                status,
                String::from_utf8_lossy(&body)
            )));
        }

        // 响应体交给解码器，解码器从不失败
        Ok(ResponseDecoder::decode(&body))
    }

    /// 启动时探测端点可达性
    ///
    /// 任何HTTP响应（包括4xx/405）都说明端点可达；只有连接层面的
    /// 失败才值得警告。不通过也不阻止启动，这是演示服务的取舍。
    pub async fn validate_endpoint(&self) {
        match self.client.get(&self.config.endpoint_url).send().await {
            Ok(response) => {
                tracing::info!(
                    "Scoring endpoint reachable: {} ({})",
                    self.config.endpoint_url,
                    response.status()
                );
            }
            Err(e) => {
                tracing::warn!(
                    "Scoring endpoint probe failed for {}: {}",
                    self.config.endpoint_url,
                    e
                );
            }
        }
    }
}

/// 构造特征向量请求体 {"data": [[f32, ...]]}
fn build_feature_payload(features: &FeatureVector) -> serde_json::Value {
    serde_json::json!({ "data": [features.as_slice()] })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::FeatureEncoder;
    use std::io::Cursor;

    fn sample_features() -> FeatureVector {
        let img = image::RgbImage::from_fn(64, 64, |x, y| {
            image::Rgb([(x * 4) as u8, (y * 4) as u8, 0])
        });
        let mut buf = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut buf, image::ImageFormat::Png)
            .unwrap();
        FeatureEncoder::encode(&buf.into_inner()).unwrap()
    }

    #[test]
    fn feature_payload_wire_shape() {
        let features = sample_features();
        let payload = build_feature_payload(&features);

        let rows = payload["data"].as_array().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].as_array().unwrap().len(), features.len());
    }

    #[test]
    fn builds_client_from_config() {
        let config = crate::Config::new(
            "0.0.0.0:5005".to_string(),
            "http://localhost:8000/score".to_string(),
            Some("secret".to_string()),
            "features",
            false,
        )
        .unwrap();

        let client = ScoringClient::new(config.scoring).unwrap();
        assert_eq!(client.endpoint_url(), "http://localhost:8000/score");
        assert_eq!(client.timeout_secs(), 30);
        assert!(client.has_api_key());
    }
}
