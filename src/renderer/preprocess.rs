// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 帧预处理: 旋转与平滑
use image::{imageops, RgbImage};
use serde::{Deserialize, Serialize};

use crate::detection::DetectionRecord;

/// 帧旋转方式
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameRotation {
    None,
    #[default]
    Clockwise90,
    Counterclockwise90,
    Rotate180,
}

impl FrameRotation {
    /// 解析命令行取值: `none` / `cw90` / `ccw90` / `180`
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "0" => Some(Self::None),
            "cw90" | "90" | "clockwise90" => Some(Self::Clockwise90),
            "ccw90" | "270" | "-90" | "counterclockwise90" => Some(Self::Counterclockwise90),
            "180" | "rotate180" => Some(Self::Rotate180),
            _ => None,
        }
    }

    /// 旋转后的帧尺寸
    pub fn output_size(&self, width: u32, height: u32) -> (u32, u32) {
        match self {
            Self::Clockwise90 | Self::Counterclockwise90 => (height, width),
            Self::None | Self::Rotate180 => (width, height),
        }
    }

    pub fn apply(&self, frame: RgbImage) -> RgbImage {
        match self {
            Self::None => frame,
            Self::Clockwise90 => imageops::rotate90(&frame),
            Self::Counterclockwise90 => imageops::rotate270(&frame),
            Self::Rotate180 => imageops::rotate180(&frame),
        }
    }

    /// 将检测框随帧一起旋转; `width`/`height` 为旋转前的帧尺寸
    pub fn apply_to_record(&self, det: &DetectionRecord, width: u32, height: u32) -> DetectionRecord {
        let (w, h) = (width as f32, height as f32);
        let (x1, y1, x2, y2) = match self {
            Self::None => (det.x1, det.y1, det.x2, det.y2),
            Self::Clockwise90 => (h - det.y2, det.x1, h - det.y1, det.x2),
            Self::Counterclockwise90 => (det.y1, w - det.x2, det.y2, w - det.x1),
            Self::Rotate180 => (w - det.x2, h - det.y2, w - det.x1, h - det.y1),
        };
        DetectionRecord::new(x1, y1, x2, y2, det.score, det.class_id)
    }
}

/// 高斯平滑, sigma 非正时原样返回
pub fn smooth(frame: RgbImage, sigma: Option<f32>) -> RgbImage {
    match sigma {
        Some(s) if s > 0.0 => imageproc::filter::gaussian_blur_f32(&frame, s),
        _ => frame,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_rotation_moves_pixels_and_boxes_together() {
        // 4x2 帧, 标记像素 (3, 0) 位于右上角
        let mut frame = RgbImage::new(4, 2);
        frame.put_pixel(3, 0, Rgb([255, 0, 0]));
        let det = DetectionRecord::new(3.0, 0.0, 4.0, 1.0, 0.8, 1);

        for rotation in [
            FrameRotation::None,
            FrameRotation::Clockwise90,
            FrameRotation::Counterclockwise90,
            FrameRotation::Rotate180,
        ] {
            let rotated = rotation.apply(frame.clone());
            assert_eq!(rotated.dimensions(), rotation.output_size(4, 2));
            let moved = rotation.apply_to_record(&det, 4, 2);
            assert!((moved.width() - 1.0).abs() < 1e-6);
            assert!((moved.height() - 1.0).abs() < 1e-6);
            // 框覆盖的唯一像素就是被标记的像素
            let (px, py) = (moved.x1 as u32, moved.y1 as u32);
            assert_eq!(rotated.get_pixel(px, py).0, [255, 0, 0], "{:?}", rotation);
            assert_eq!(moved.score, 0.8);
            assert_eq!(moved.class_id, 1);
        }
    }

    #[test]
    fn test_parse_rotation() {
        assert_eq!(FrameRotation::parse("cw90"), Some(FrameRotation::Clockwise90));
        assert_eq!(FrameRotation::parse("NONE"), Some(FrameRotation::None));
        assert_eq!(FrameRotation::parse("ccw90"), Some(FrameRotation::Counterclockwise90));
        assert_eq!(FrameRotation::parse("45"), None);
    }

    #[test]
    fn test_smooth_disabled() {
        let frame = RgbImage::from_pixel(3, 3, Rgb([9, 9, 9]));
        assert_eq!(smooth(frame.clone(), None), frame);
        assert_eq!(smooth(frame.clone(), Some(0.0)), frame);
    }
}
