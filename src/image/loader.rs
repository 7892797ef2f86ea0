use crate::utils::error::ClassifyError;
use crate::Result;
use base64::Engine;
use image::{DynamicImage, GenericImageView, ImageFormat};
use ndarray::Array2;

/// 上传图像的最大字节数
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

pub struct ImageLoader;

impl ImageLoader {
    /// 解码base64字符串为图像字节
    pub fn decode_base64(base64_data: &str) -> Result<Vec<u8>> {
        // 检测并移除可能的数据URL前缀 (data:image/xxx;base64,)
        let base64_clean = if base64_data.starts_with("data:") {
            base64_data.split(',').nth(1).unwrap_or(base64_data)
        } else {
            base64_data
        };

        base64::engine::general_purpose::STANDARD
            .decode(base64_clean.trim())
            .map_err(ClassifyError::Base64)
    }

    /// 从base64字符串加载图像
    pub fn from_base64(base64_data: &str) -> Result<DynamicImage> {
        let image_bytes = Self::decode_base64(base64_data)?;
        Self::from_slice(&image_bytes)
    }

    /// 从内存字节解码图像
    pub fn from_slice(bytes: &[u8]) -> Result<DynamicImage> {
        // 检查文件大小
        if bytes.len() > MAX_IMAGE_BYTES {
            return Err(ClassifyError::FileTooLarge(bytes.len(), MAX_IMAGE_BYTES));
        }

        // 先检查格式是否受支持，再解码
        if let Some(format) = Self::detect_format(bytes) {
            if !Self::is_supported_format(format) {
                return Err(ClassifyError::UnsupportedFormat(
                    format!("{:?}", format)
                ));
            }
        }

        let image = image::load_from_memory(bytes)
            .map_err(ClassifyError::ImageDecode)?;

        Ok(image)
    }

    /// 检测图像格式
    pub fn detect_format(bytes: &[u8]) -> Option<ImageFormat> {
        image::guess_format(bytes).ok()
    }

    /// 验证图像格式是否支持
    pub fn is_supported_format(format: ImageFormat) -> bool {
        matches!(format,
            ImageFormat::Png |
            ImageFormat::Jpeg |
            ImageFormat::Bmp |
            ImageFormat::WebP
        )
    }

    /// 验证图像尺寸
    ///
    /// 小于一个HOG单元的图像无法铺满网格，直接拒绝而不是放大。
    pub fn validate_dimensions(image: &DynamicImage, min_size: u32) -> Result<()> {
        let (width, height) = image.dimensions();

        if width < min_size || height < min_size {
            return Err(ClassifyError::Dimension(
                format!("Image too small: {}x{}, minimum {}x{}", width, height, min_size, min_size)
            ));
        }

        if width > 8192 || height > 8192 {
            return Err(ClassifyError::Dimension(
                format!("Image too large: {}x{}, maximum 8192x8192", width, height)
            ));
        }

        Ok(())
    }

    /// 转换为归一化的单通道亮度矩阵
    ///
    /// 感知加权 0.299/0.587/0.114，像素强度归一化到[0,1]。
    pub fn to_luma_array(image: &DynamicImage) -> Array2<f32> {
        let rgb_image = image.to_rgb8();
        let (width, height) = rgb_image.dimensions();

        let mut luma = Array2::<f32>::zeros((height as usize, width as usize));

        for (x, y, pixel) in rgb_image.enumerate_pixels() {
            let [r, g, b] = pixel.0;
            let gray = r as f32 * 0.299 + g as f32 * 0.587 + b as f32 * 0.114;
            luma[[y as usize, x as usize]] = gray / 255.0;
        }

        luma
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        });
        let mut buf = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut buf, image::ImageFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    #[test]
    fn loads_png_from_bytes() {
        let bytes = png_bytes(32, 24);
        let img = ImageLoader::from_slice(&bytes).unwrap();
        assert_eq!(img.dimensions(), (32, 24));
    }

    #[test]
    fn loads_base64_with_data_url_prefix() {
        let encoded = base64::engine::general_purpose::STANDARD.encode(png_bytes(16, 16));
        let with_prefix = format!("data:image/png;base64,{}", encoded);

        assert!(ImageLoader::from_base64(&encoded).is_ok());
        assert!(ImageLoader::from_base64(&with_prefix).is_ok());
    }

    #[test]
    fn rejects_garbage_bytes() {
        let result = ImageLoader::from_slice(b"definitely not an image");
        assert!(matches!(result, Err(crate::ClassifyError::ImageDecode(_))));
    }

    #[test]
    fn rejects_oversized_upload() {
        let blob = vec![0u8; MAX_IMAGE_BYTES + 1];
        let result = ImageLoader::from_slice(&blob);
        assert!(matches!(result, Err(crate::ClassifyError::FileTooLarge(_, _))));
    }

    #[test]
    fn rejects_undersized_dimensions() {
        let bytes = png_bytes(8, 8);
        let img = ImageLoader::from_slice(&bytes).unwrap();
        let result = ImageLoader::validate_dimensions(&img, 16);
        assert!(matches!(result, Err(crate::ClassifyError::Dimension(_))));
    }

    #[test]
    fn luma_values_normalized() {
        let bytes = png_bytes(16, 16);
        let img = ImageLoader::from_slice(&bytes).unwrap();
        let luma = ImageLoader::to_luma_array(&img);

        assert_eq!(luma.dim(), (16, 16));
        assert!(luma.iter().all(|v| (0.0..=1.0).contains(v)));
    }
}
