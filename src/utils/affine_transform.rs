// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 仿射变换工具模块
/// 实现类似于 cv2::warpAffine 的功能, 直接作用于 `image::RgbImage`
use image::{Rgb, RgbImage};

/// 仿射变换矩阵 (2x3)
/// | a11 a12 b1 |
/// | a21 a22 b2 |
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AffineMatrix {
    pub a11: f32,
    pub a12: f32,
    pub b1: f32,
    pub a21: f32,
    pub a22: f32,
    pub b2: f32,
}

impl AffineMatrix {
    /// 创建单位仿射矩阵
    pub fn identity() -> Self {
        Self::translation(0.0, 0.0)
    }

    /// 应用仿射变换到点 (x, y)
    pub fn transform_point(&self, x: f32, y: f32) -> (f32, f32) {
        (
            self.a11 * x + self.a12 * y + self.b1,
            self.a21 * x + self.a22 * y + self.b2,
        )
    }

    /// 计算逆矩阵 (用于反向映射)
    pub fn inverse(&self) -> Option<Self> {
        let det = self.a11 * self.a22 - self.a12 * self.a21;
        if !det.is_finite() || det.abs() < 1e-10 {
            return None; // 矩阵不可逆
        }

        let inv_det = 1.0 / det;
        Some(Self {
            a11: self.a22 * inv_det,
            a12: -self.a12 * inv_det,
            b1: (self.a12 * self.b2 - self.a22 * self.b1) * inv_det,
            a21: -self.a21 * inv_det,
            a22: self.a11 * inv_det,
            b2: (self.a21 * self.b1 - self.a11 * self.b2) * inv_det,
        })
    }

    /// 创建平移矩阵
    pub fn translation(dx: f32, dy: f32) -> Self {
        Self {
            a11: 1.0,
            a12: 0.0,
            b1: dx,
            a21: 0.0,
            a22: 1.0,
            b2: dy,
        }
    }

    /// 创建缩放矩阵
    pub fn scale(sx: f32, sy: f32) -> Self {
        Self {
            a11: sx,
            a12: 0.0,
            b1: 0.0,
            a21: 0.0,
            a22: sy,
            b2: 0.0,
        }
    }

    /// 创建旋转矩阵 (角度制, 图像坐标系下正角度为顺时针)
    pub fn rotation(angle_degrees: f32) -> Self {
        let (sin_a, cos_a) = angle_degrees.to_radians().sin_cos();
        Self {
            a11: cos_a,
            a12: -sin_a,
            b1: 0.0,
            a21: sin_a,
            a22: cos_a,
            b2: 0.0,
        }
    }

    /// 创建错切矩阵 (角度制)
    pub fn shear(shear_x_degrees: f32, shear_y_degrees: f32) -> Self {
        Self {
            a11: 1.0,
            a12: shear_x_degrees.to_radians().tan(),
            b1: 0.0,
            a21: shear_y_degrees.to_radians().tan(),
            a22: 1.0,
            b2: 0.0,
        }
    }

    /// 以 (center_x, center_y) 为中心应用线性变换 `linear`
    pub fn around_center(center_x: f32, center_y: f32, linear: &Self) -> Self {
        let t1 = Self::translation(-center_x, -center_y);
        let t2 = Self::translation(center_x, center_y);
        t2.compose(&linear.compose(&t1))
    }

    /// 矩阵组合 (self * other), 先应用 other 再应用 self
    pub fn compose(&self, other: &Self) -> Self {
        Self {
            a11: self.a11 * other.a11 + self.a12 * other.a21,
            a12: self.a11 * other.a12 + self.a12 * other.a22,
            b1: self.a11 * other.b1 + self.a12 * other.b2 + self.b1,
            a21: self.a21 * other.a11 + self.a22 * other.a21,
            a22: self.a21 * other.a12 + self.a22 * other.a22,
            b2: self.a21 * other.b1 + self.a22 * other.b2 + self.b2,
        }
    }
}

/// 仿射变换 (RGB图像, 双线性插值, 画面外填充常数 `border_value`)
///
/// 坐标以像素边缘为原点, 像素 i 的中心位于 i + 0.5, 与归一化框坐标乘以宽高后的约定一致。
/// 目标图像尺寸与源图像相同。矩阵不可逆时返回 `None`。
pub fn warp_affine_rgb(src: &RgbImage, matrix: &AffineMatrix, border_value: u8) -> Option<RgbImage> {
    let (width, height) = src.dimensions();
    // 使用逆变换进行反向映射
    let inv = matrix.inverse()?;
    let mut dst = RgbImage::new(width, height);

    for (dst_x, dst_y, pixel) in dst.enumerate_pixels_mut() {
        let (src_x, src_y) = inv.transform_point(dst_x as f32 + 0.5, dst_y as f32 + 0.5);
        *pixel = bilinear(src, src_x - 0.5, src_y - 0.5, border_value);
    }

    Some(dst)
}

/// 双线性插值, (x, y) 为像素索引坐标
fn bilinear(src: &RgbImage, x: f32, y: f32, border_value: u8) -> Rgb<u8> {
    let x0 = x.floor();
    let y0 = y.floor();
    let fx = x - x0;
    let fy = y - y0;
    let (x0, y0) = (x0 as i64, y0 as i64);

    let p00 = sample(src, x0, y0, border_value);
    let p10 = sample(src, x0 + 1, y0, border_value);
    let p01 = sample(src, x0, y0 + 1, border_value);
    let p11 = sample(src, x0 + 1, y0 + 1, border_value);

    let mut out = [0u8; 3];
    for (c, slot) in out.iter_mut().enumerate() {
        let v0 = p00[c] as f32 * (1.0 - fx) + p10[c] as f32 * fx;
        let v1 = p01[c] as f32 * (1.0 - fx) + p11[c] as f32 * fx;
        *slot = (v0 * (1.0 - fy) + v1 * fy).round().clamp(0.0, 255.0) as u8;
    }
    Rgb(out)
}

/// 取像素, 画面外返回常数
fn sample(src: &RgbImage, x: i64, y: i64, border_value: u8) -> Rgb<u8> {
    let (w, h) = (src.width() as i64, src.height() as i64);
    if x >= 0 && x < w && y >= 0 && y < h {
        *src.get_pixel(x as u32, y as u32)
    } else {
        Rgb([border_value; 3])
    }
}
