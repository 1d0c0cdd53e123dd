// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 几何变换阶段: 像素与边界框同步变换

use rand::rngs::StdRng;

use super::{uniform, AffineParams, AnnotatedImage, AugmentError, Stage};
use crate::annotation::BoundingBox;
use crate::utils::affine_transform::{warp_affine_rgb, AffineMatrix};

/// 水平翻转
#[derive(Debug, Clone)]
pub struct HorizontalFlip {
    pub p: f32,
}

impl HorizontalFlip {
    /// 无条件翻转 (概率门由流水线判定)
    pub fn flip(sample: &mut AnnotatedImage) {
        image::imageops::flip_horizontal_in_place(&mut sample.image);
        for b in sample.boxes.iter_mut() {
            b.x_center = 1.0 - b.x_center;
        }
    }
}

impl Stage for HorizontalFlip {
    fn name(&self) -> &'static str {
        "horizontal_flip"
    }

    fn probability(&self) -> f32 {
        self.p
    }

    fn apply(&self, sample: &mut AnnotatedImage, _rng: &mut StdRng) -> Result<(), AugmentError> {
        Self::flip(sample);
        Ok(())
    }
}

/// 组合仿射变换: 平移 + 缩放 + 旋转 + 错切, 以图像中心为原点
#[derive(Debug, Clone)]
pub struct Affine {
    pub params: AffineParams,
    pub min_visibility: f32,
}

impl Affine {
    /// 采样一个仿射矩阵 (像素坐标)
    pub fn sample_matrix(&self, width: u32, height: u32, rng: &mut StdRng) -> AffineMatrix {
        let p = &self.params;
        let (w, h) = (width as f32, height as f32);

        let tx = uniform(rng, -p.translate_percent, p.translate_percent) * w;
        let ty = uniform(rng, -p.translate_percent, p.translate_percent) * h;
        let scale = uniform(rng, p.scale_min, p.scale_max);
        let angle = uniform(rng, -p.rotate_degrees, p.rotate_degrees);
        let shear_x = uniform(rng, -p.shear_degrees, p.shear_degrees);
        let shear_y = uniform(rng, -p.shear_degrees, p.shear_degrees);

        let linear = AffineMatrix::rotation(angle)
            .compose(&AffineMatrix::shear(shear_x, shear_y))
            .compose(&AffineMatrix::scale(scale, scale));
        AffineMatrix::translation(tx, ty).compose(&AffineMatrix::around_center(
            w / 2.0,
            h / 2.0,
            &linear,
        ))
    }

    /// 用给定矩阵变换样本
    pub fn apply_matrix(
        &self,
        sample: &mut AnnotatedImage,
        matrix: &AffineMatrix,
    ) -> Result<(), AugmentError> {
        let warped = warp_affine_rgb(&sample.image, matrix, self.params.border_value)
            .ok_or(AugmentError::SingularTransform)?;
        let (w, h) = warped.dimensions();
        sample.boxes = remap_boxes(&sample.boxes, w, h, matrix, self.min_visibility);
        sample.image = warped;
        Ok(())
    }
}

impl Stage for Affine {
    fn name(&self) -> &'static str {
        "affine"
    }

    fn probability(&self) -> f32 {
        self.params.p
    }

    fn apply(&self, sample: &mut AnnotatedImage, rng: &mut StdRng) -> Result<(), AugmentError> {
        let (w, h) = sample.image.dimensions();
        let matrix = self.sample_matrix(w, h, rng);
        self.apply_matrix(sample, &matrix)
    }
}

/// 按仿射矩阵重映射归一化框
///
/// 变换四个角点后取外接矩形, 截断到画面内;
/// 可见面积比例低于 `min_visibility` 或面积为0的框被丢弃, 类别随框保留。
pub fn remap_boxes(
    boxes: &[BoundingBox],
    width: u32,
    height: u32,
    matrix: &AffineMatrix,
    min_visibility: f32,
) -> Vec<BoundingBox> {
    let (w, h) = (width as f32, height as f32);
    let mut out = Vec::with_capacity(boxes.len());

    for b in boxes {
        let [x1, y1, x2, y2] = b.to_corners();
        let corners = [
            matrix.transform_point(x1 * w, y1 * h),
            matrix.transform_point(x2 * w, y1 * h),
            matrix.transform_point(x1 * w, y2 * h),
            matrix.transform_point(x2 * w, y2 * h),
        ];
        let min_x = corners.iter().map(|c| c.0).fold(f32::INFINITY, f32::min);
        let max_x = corners.iter().map(|c| c.0).fold(f32::NEG_INFINITY, f32::max);
        let min_y = corners.iter().map(|c| c.1).fold(f32::INFINITY, f32::min);
        let max_y = corners.iter().map(|c| c.1).fold(f32::NEG_INFINITY, f32::max);

        let full_area = (max_x - min_x) * (max_y - min_y);
        let cx1 = min_x.clamp(0.0, w);
        let cx2 = max_x.clamp(0.0, w);
        let cy1 = min_y.clamp(0.0, h);
        let cy2 = max_y.clamp(0.0, h);
        let clipped_area = (cx2 - cx1) * (cy2 - cy1);

        // NaN 也在这里被排除
        let visible = clipped_area > 0.0 && full_area > 0.0;
        if !visible {
            continue;
        }
        if clipped_area / full_area < min_visibility {
            continue;
        }

        let remapped = BoundingBox::from_corners(b.class_id, cx1 / w, cy1 / h, cx2 / w, cy2 / h);
        if remapped.is_valid() {
            out.push(remapped);
        }
    }

    out
}
