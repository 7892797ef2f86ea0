use crate::image::ImageLoader;
use crate::utils::error::ClassifyError;
use crate::Result;
use image::imageops::FilterType;
use image::DynamicImage;
use ndarray::{Array2, Array3};
use serde::Serialize;

/// 特征提取的目标分辨率（训练时使用的尺寸）
pub const TARGET_SIZE: u32 = 256;

/// HOG单元边长（像素）
pub const CELL_SIZE: usize = 16;

/// 块边长（单元数），块间步长为1个单元（重叠）
pub const BLOCK_SIZE: usize = 2;

/// 无符号梯度方向直方图的bin数量，覆盖[0°, 180°)
pub const ORIENTATION_BINS: usize = 9;

/// 单向单元数：256 / 16 = 16
const CELLS_PER_SIDE: usize = TARGET_SIZE as usize / CELL_SIZE;

/// 远程模型训练时的特征向量长度，必须严格一致
pub const FEATURE_LEN: usize = (CELLS_PER_SIDE - BLOCK_SIZE + 1)
    * (CELLS_PER_SIDE - BLOCK_SIZE + 1)
    * BLOCK_SIZE
    * BLOCK_SIZE
    * ORIENTATION_BINS;

/// 固定长度的图像特征向量，创建后不可变
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureVector(Vec<f32>);

impl FeatureVector {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<f32> {
        self.0
    }
}

/// HOG特征编码器
///
/// 复现训练侧的预处理：双线性缩放到256x256、亮度归一化、
/// 梯度幅值开方变换、9-bin无符号方向直方图、2x2重叠块L2归一化。
/// 缩放插值策略与训练时不一致会悄悄劣化精度，不可改动。
pub struct FeatureEncoder;

impl FeatureEncoder {
    /// 从原始图像字节编码特征向量
    pub fn encode(bytes: &[u8]) -> Result<FeatureVector> {
        let image = ImageLoader::from_slice(bytes)?;
        Self::encode_image(&image)
    }

    /// 从已解码的图像编码特征向量
    pub fn encode_image(image: &DynamicImage) -> Result<FeatureVector> {
        ImageLoader::validate_dimensions(image, CELL_SIZE as u32)?;

        // 确定性双线性缩放到固定分辨率
        let resized = image.resize_exact(TARGET_SIZE, TARGET_SIZE, FilterType::Triangle);
        let luma = ImageLoader::to_luma_array(&resized);

        let (magnitudes, orientations) = Self::compute_gradients(&luma);
        let cell_histograms = Self::accumulate_cells(&magnitudes, &orientations);
        let features = Self::normalize_blocks(&cell_histograms);

        // 长度必须与远程模型训练时一致，宁可报错也不截断或填充
        if features.len() != FEATURE_LEN {
            return Err(ClassifyError::Dimension(format!(
                "Feature vector length mismatch: got {}, expected {}",
                features.len(),
                FEATURE_LEN
            )));
        }

        Ok(FeatureVector(features))
    }

    /// 计算梯度幅值与方向
    ///
    /// 中心差分，边界处退化为单侧差分；幅值做开方变换（与训练侧
    /// 预处理一致），方向映射到[0°, 180°)。
    fn compute_gradients(luma: &Array2<f32>) -> (Array2<f32>, Array2<f32>) {
        let (height, width) = luma.dim();
        let mut magnitudes = Array2::<f32>::zeros((height, width));
        let mut orientations = Array2::<f32>::zeros((height, width));

        for y in 0..height {
            for x in 0..width {
                let x_prev = x.saturating_sub(1);
                let x_next = (x + 1).min(width - 1);
                let y_prev = y.saturating_sub(1);
                let y_next = (y + 1).min(height - 1);

                let gx = luma[[y, x_next]] - luma[[y, x_prev]];
                let gy = luma[[y_next, x]] - luma[[y_prev, x]];

                let magnitude = (gx * gx + gy * gy).sqrt();
                magnitudes[[y, x]] = magnitude.sqrt();

                let mut angle = gy.atan2(gx).to_degrees();
                if angle < 0.0 {
                    angle += 180.0;
                }
                if angle >= 180.0 {
                    angle -= 180.0;
                }
                orientations[[y, x]] = angle;
            }
        }

        (magnitudes, orientations)
    }

    /// 按单元累积方向直方图，线性插值分配到相邻两个bin
    fn accumulate_cells(
        magnitudes: &Array2<f32>,
        orientations: &Array2<f32>,
    ) -> Array3<f32> {
        let bin_width = 180.0 / ORIENTATION_BINS as f32;
        let mut cells =
            Array3::<f32>::zeros((CELLS_PER_SIDE, CELLS_PER_SIDE, ORIENTATION_BINS));

        let (height, width) = magnitudes.dim();

        for y in 0..height {
            for x in 0..width {
                let cell_y = y / CELL_SIZE;
                let cell_x = x / CELL_SIZE;

                let magnitude = magnitudes[[y, x]];
                let angle = orientations[[y, x]];

                // 投票拆分到两个最近的方向bin
                let position = angle / bin_width - 0.5;
                let lower = position.floor();
                let frac = position - lower;

                let bin_lo = ((lower as i32).rem_euclid(ORIENTATION_BINS as i32)) as usize;
                let bin_hi = (bin_lo + 1) % ORIENTATION_BINS;

                cells[[cell_y, cell_x, bin_lo]] += magnitude * (1.0 - frac);
                cells[[cell_y, cell_x, bin_hi]] += magnitude * frac;
            }
        }

        cells
    }

    /// 重叠块L2归一化并按行主序拼接
    fn normalize_blocks(cells: &Array3<f32>) -> Vec<f32> {
        const EPSILON: f32 = 1e-6;
        let blocks_per_side = CELLS_PER_SIDE - BLOCK_SIZE + 1;
        let block_len = BLOCK_SIZE * BLOCK_SIZE * ORIENTATION_BINS;

        let mut features = Vec::with_capacity(blocks_per_side * blocks_per_side * block_len);
        let mut block = Vec::with_capacity(block_len);

        for block_y in 0..blocks_per_side {
            for block_x in 0..blocks_per_side {
                block.clear();

                for dy in 0..BLOCK_SIZE {
                    for dx in 0..BLOCK_SIZE {
                        for bin in 0..ORIENTATION_BINS {
                            block.push(cells[[block_y + dy, block_x + dx, bin]]);
                        }
                    }
                }

                let norm = block.iter().map(|v| v * v).sum::<f32>().sqrt() + EPSILON;
                features.extend(block.iter().map(|v| v / norm));
            }
        }

        features
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        // 带梯度的测试图案，避免全零特征
        let img = image::RgbImage::from_fn(width, height, |x, y| {
            let v = ((x * 7 + y * 13) % 256) as u8;
            image::Rgb([v, v / 2, 255 - v])
        });
        let mut buf = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut buf, image::ImageFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    #[test]
    fn feature_len_constant() {
        // 15x15个块，每块2x2单元x9个bin
        assert_eq!(FEATURE_LEN, 8100);
    }

    #[test]
    fn encodes_fixed_length_vector() {
        let features = FeatureEncoder::encode(&png_bytes(200, 120)).unwrap();
        assert_eq!(features.len(), FEATURE_LEN);
        assert!(features.as_slice().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn encoding_is_deterministic() {
        let bytes = png_bytes(100, 100);
        let first = FeatureEncoder::encode(&bytes).unwrap();
        let second = FeatureEncoder::encode(&bytes).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn block_norms_bounded() {
        // L2归一化后每个块的范数不超过1
        let features = FeatureEncoder::encode(&png_bytes(64, 64)).unwrap();
        let block_len = BLOCK_SIZE * BLOCK_SIZE * ORIENTATION_BINS;

        for block in features.as_slice().chunks(block_len) {
            let norm = block.iter().map(|v| v * v).sum::<f32>().sqrt();
            assert!(norm <= 1.0 + 1e-4);
        }
    }

    #[test]
    fn rejects_image_below_cell_size() {
        let result = FeatureEncoder::encode(&png_bytes(8, 8));
        assert!(matches!(result, Err(crate::ClassifyError::Dimension(_))));
    }

    #[test]
    fn rejects_malformed_bytes() {
        let result = FeatureEncoder::encode(b"not an image at all");
        assert!(matches!(result, Err(crate::ClassifyError::ImageDecode(_))));
    }
}
