use crate::{
    classify::{ClassifyOptions, ClassifyOutcome, ClassifyStage, ClassifyStatus, EndpointInfo},
    config::PayloadShape,
    image::{FeatureEncoder, ImageLoader},
    scoring::{get_client, Label},
    utils::error::ClassifyError,
    Result,
};
use std::io::Write;
use std::path::Path;
use std::time::Instant;
use tempfile::NamedTempFile;
use tokio::sync::mpsc;

/// 请求级的临时图像文件
///
/// RAII守卫：无论成功还是失败路径，守卫析构时文件都会被删除。
pub struct TempImage {
    file: NamedTempFile,
    len: usize,
}

impl TempImage {
    /// 把上传字节落盘为临时文件
    pub fn persist(bytes: &[u8]) -> Result<Self> {
        let mut file = NamedTempFile::new().map_err(ClassifyError::Io)?;
        file.write_all(bytes).map_err(ClassifyError::Io)?;
        file.flush().map_err(ClassifyError::Io)?;

        tracing::info!(
            "Image saved to {} ({} bytes)",
            file.path().display(),
            bytes.len()
        );

        Ok(Self {
            file,
            len: bytes.len(),
        })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// 读回落盘的图像字节
    pub fn read(&self) -> Result<Vec<u8>> {
        std::fs::read(self.path()).map_err(ClassifyError::Io)
    }
}

/// 分类处理流水线
pub struct ClassifyPipeline;

impl ClassifyPipeline {
    /// 处理base64图像
    pub async fn process_base64(
        base64_data: &str,
        options: ClassifyOptions,
        status_tx: Option<mpsc::UnboundedSender<ClassifyStatus>>,
    ) -> Result<ClassifyOutcome> {
        let start_time = Instant::now();

        // base64先解到字节，后续流程与multipart上传一致
        let image_bytes = ImageLoader::decode_base64(base64_data)?;

        Self::process_image_bytes(image_bytes, options, status_tx, start_time).await
    }

    /// 处理字节流图像
    pub async fn process_bytes(
        bytes: axum::body::Bytes,
        options: ClassifyOptions,
        status_tx: Option<mpsc::UnboundedSender<ClassifyStatus>>,
    ) -> Result<ClassifyOutcome> {
        let start_time = Instant::now();
        Self::process_image_bytes(bytes.to_vec(), options, status_tx, start_time).await
    }

    /// 核心分类流水线
    async fn process_image_bytes(
        image_bytes: Vec<u8>,
        options: ClassifyOptions,
        status_tx: Option<mpsc::UnboundedSender<ClassifyStatus>>,
        start_time: Instant,
    ) -> Result<ClassifyOutcome> {
        if image_bytes.is_empty() {
            return Err(ClassifyError::InvalidInput("Empty image data".to_string()));
        }

        // 落盘临时文件，守卫保证所有退出路径都会清理
        if let Some(ref tx) = status_tx {
            let _ = tx.send(ClassifyStatus::new(
                ClassifyStage::Saving,
                0.1,
                "Saving uploaded image",
            ));
        }

        let temp_image = TempImage::persist(&image_bytes)?;

        // 图像只解码一次：校验格式与尺寸，之后原始缓冲即可丢弃
        let image = ImageLoader::from_slice(&image_bytes)?;
        ImageLoader::validate_dimensions(&image, crate::image::encoder::CELL_SIZE as u32)?;
        drop(image_bytes);

        let client = get_client()?;

        // 请求体形态：单次请求可覆盖部署配置
        let payload_shape = match options.payload_shape.as_deref() {
            Some(value) => PayloadShape::parse(value)?,
            None => client.payload_shape(),
        };

        let (result, feature_len) = match payload_shape {
            PayloadShape::FeatureJson => {
                if let Some(ref tx) = status_tx {
                    let _ = tx.send(ClassifyStatus::new(
                        ClassifyStage::Encoding,
                        0.3,
                        "Computing HOG feature vector",
                    ));
                }

                let features = FeatureEncoder::encode_image(&image)?;
                let feature_len = features.len();

                if let Some(ref tx) = status_tx {
                    let _ = tx.send(ClassifyStatus::new(
                        ClassifyStage::Scoring,
                        0.6,
                        "Sending features to scoring endpoint",
                    ));
                }

                let result = client.score_features(&features).await?;
                (result, Some(feature_len))
            }
            PayloadShape::OctetStream => {
                if let Some(ref tx) = status_tx {
                    let _ = tx.send(ClassifyStatus::new(
                        ClassifyStage::Scoring,
                        0.5,
                        "Sending raw image to scoring endpoint",
                    ));
                }

                // 原始契约按落盘文件发送
                let result = client.score_bytes(temp_image.read()?).await?;
                (result, None)
            }
        };

        // 严格模式下解码失败升级为网关错误
        if options.strict && result.label == Label::Error {
            if let Some(ref tx) = status_tx {
                let _ = tx.send(ClassifyStatus::new(
                    ClassifyStage::Error,
                    1.0,
                    "Scoring response could not be decoded",
                ));
            }

            return Err(ClassifyError::Endpoint(
                result
                    .detail
                    .unwrap_or_else(|| "Scoring response could not be decoded".to_string()),
            ));
        }

        let total_time = start_time.elapsed();

        if let Some(ref tx) = status_tx {
            let _ = tx.send(ClassifyStatus::new(
                ClassifyStage::Completed,
                1.0,
                &format!("Classification completed: {}", result.label.as_str()),
            ));
        }

        tracing::info!(
            "Classification completed: label={}, raw_value={}, shape={}, total_time={:.3}s",
            result.label.as_str(),
            result.raw_value,
            payload_shape.as_str(),
            total_time.as_secs_f32()
        );

        Ok(ClassifyOutcome {
            processing_time: total_time.as_secs_f32(),
            result,
            feature_len,
            endpoint_info: Some(EndpointInfo {
                endpoint_url: client.endpoint_url().to_string(),
                payload_shape: payload_shape.as_str().to_string(),
            }),
        })
    }
}

// 异步trait实现，方便上层按接口组合
#[async_trait::async_trait]
pub trait AsyncClassifier {
    async fn classify(&self, bytes: axum::body::Bytes) -> Result<ClassifyOutcome>;
}

#[async_trait::async_trait]
impl AsyncClassifier for ClassifyPipeline {
    async fn classify(&self, bytes: axum::body::Bytes) -> Result<ClassifyOutcome> {
        let options = ClassifyOptions::default();
        Self::process_bytes(bytes, options, None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temp_image_deleted_on_drop() {
        let temp = TempImage::persist(b"fake image bytes").unwrap();
        let path = temp.path().to_path_buf();

        assert!(path.exists());
        assert_eq!(temp.len(), 16);
        assert_eq!(temp.read().unwrap(), b"fake image bytes");

        drop(temp);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn empty_upload_rejected_before_any_network_call() {
        let result = ClassifyPipeline::process_bytes(
            axum::body::Bytes::new(),
            ClassifyOptions::default(),
            None,
        )
        .await;

        assert!(matches!(result, Err(ClassifyError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn invalid_base64_rejected() {
        let result = ClassifyPipeline::process_base64(
            "!!! not base64 !!!",
            ClassifyOptions::default(),
            None,
        )
        .await;

        assert!(matches!(result, Err(ClassifyError::Base64(_))));
    }
}
