// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 检测结果绘制
///
/// 每个检测: 类别颜色边框 + 浅色内框, 框上方的 "名称: 百分比" 标签, 框下方的置信度条。
use std::fs;
use std::path::{Path, PathBuf};

use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use tracing::{debug, warn};

use crate::detection::{ClassNames, DetectionRecord};

/// 类别调色板 (RGB)
pub const PALETTE: [[u8; 3]; 10] = [
    [255, 87, 51],  // 红橙
    [46, 204, 113], // 绿
    [52, 152, 219], // 蓝
    [155, 89, 182], // 紫
    [241, 196, 15], // 黄
    [230, 126, 34], // 橙
    [231, 76, 60],  // 红
    [26, 188, 156], // 青绿
    [142, 68, 173], // 深紫
    [39, 174, 96],  // 深绿
];

const BOX_THICKNESS: i32 = 3;
const INNER_LIGHTEN: u8 = 30;
const LABEL_OFFSET: i32 = 10;
const LABEL_PADDING: i32 = 8;
const BAR_TOP: i32 = 2;
const BAR_BOTTOM: i32 = 8;
const WHITE: Rgb<u8> = Rgb([255, 255, 255]);

/// 类别颜色
pub fn class_color(class_id: u32) -> Rgb<u8> {
    Rgb(PALETTE[class_id as usize % PALETTE.len()])
}

/// 提亮颜色 (各通道 +30, 饱和)
pub fn lighten(color: Rgb<u8>) -> Rgb<u8> {
    Rgb(color.0.map(|c| c.saturating_add(INNER_LIGHTEN)))
}

/// 标签文字, 置信度向下取整
pub fn label_text(names: &ClassNames, det: &DetectionRecord) -> String {
    format!("{}: {}%", names.name(det.class_id), det.confidence_percent())
}

/// 标签字体
pub struct LabelFont {
    font: FontVec,
    scale: PxScale,
}

impl LabelFont {
    pub fn load(path: &Path, size: f32) -> Option<Self> {
        let data = fs::read(path).ok()?;
        let font = FontVec::try_from_vec_and_index(data, 0).ok()?;
        debug!("🔤 加载字体: {}", path.display());
        Some(Self {
            font,
            scale: PxScale::from(size),
        })
    }

    /// 指定路径优先, 否则在常见系统字体位置中查找
    pub fn discover(preferred: Option<&Path>, size: f32) -> Option<Self> {
        if let Some(path) = preferred {
            match Self::load(path, size) {
                Some(font) => return Some(font),
                None => warn!("⚠️ 字体加载失败: {}", path.display()),
            }
        }
        let found = font_candidates().iter().find_map(|p| Self::load(p, size));
        if found.is_none() {
            warn!("⚠️ 未找到可用字体, 标签将不显示文字");
        }
        found
    }

    pub fn text_size(&self, text: &str) -> (u32, u32) {
        text_size(self.scale, &self.font, text)
    }
}

fn font_candidates() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("assets/font/msyh.ttc")];
    let names = [
        "DejaVuSans.ttf",
        "dejavu/DejaVuSans.ttf",
        "truetype/dejavu/DejaVuSans.ttf",
        "liberation/LiberationSans-Regular.ttf",
        "truetype/liberation/LiberationSans-Regular.ttf",
        "Arial.ttf",
        "arial.ttf",
        "msyh.ttc",
    ];
    let mut dirs_list: Vec<PathBuf> = Vec::new();
    if let Some(dir) = dirs::font_dir() {
        dirs_list.push(dir);
    }
    dirs_list.extend(
        [
            "/usr/share/fonts",
            "/usr/local/share/fonts",
            "/Library/Fonts",
            "/System/Library/Fonts/Supplemental",
            "C:\\Windows\\Fonts",
        ]
        .iter()
        .map(PathBuf::from),
    );
    for dir in &dirs_list {
        for name in names {
            paths.push(dir.join(name));
        }
    }
    paths
}

/// 由闭区间角点构造矩形 (与像素坐标一致, 含两端)
fn rect_inclusive(x1: i32, y1: i32, x2: i32, y2: i32) -> Rect {
    let (left, right) = (x1.min(x2), x1.max(x2));
    let (top, bottom) = (y1.min(y2), y1.max(y2));
    Rect::at(left, top).of_size((right - left + 1) as u32, (bottom - top + 1) as u32)
}

fn hollow(img: &mut RgbImage, x1: i32, y1: i32, x2: i32, y2: i32, color: Rgb<u8>) {
    draw_hollow_rect_mut(img, rect_inclusive(x1, y1, x2, y2), color);
}

fn filled(img: &mut RgbImage, x1: i32, y1: i32, x2: i32, y2: i32, color: Rgb<u8>) {
    draw_filled_rect_mut(img, rect_inclusive(x1, y1, x2, y2), color);
}

/// 整数角点, 限制在 `[-w, 2w] x [-h, 2h]` 内 (画面外部分由绘制函数裁剪)
fn clamped_corners(det: &DetectionRecord, width: u32, height: u32) -> (i32, i32, i32, i32) {
    let w = width.min(i32::MAX as u32 / 4) as i32;
    let h = height.min(i32::MAX as u32 / 4) as i32;
    let (x1, y1, x2, y2) = det.corners_i32();
    (
        x1.clamp(-w, 2 * w),
        y1.clamp(-h, 2 * h),
        x2.clamp(-w, 2 * w),
        y2.clamp(-h, 2 * h),
    )
}

/// 绘制单个检测
pub fn draw_detection(
    img: &mut RgbImage,
    det: &DetectionRecord,
    label: &str,
    font: Option<&LabelFont>,
) {
    let (x1, y1, x2, y2) = clamped_corners(det, img.width(), img.height());
    let color = class_color(det.class_id);

    // 3像素边框, 以角点为中心线
    let half = BOX_THICKNESS / 2;
    for t in -half..=half {
        hollow(img, x1 - t, y1 - t, x2 + t, y2 + t, color);
    }
    hollow(img, x1 + 1, y1 + 1, x2 - 1, y2 - 1, lighten(color));

    draw_label(img, label, x1, y1 - LABEL_OFFSET, color, font);

    // 置信度条
    let bar_width = ((x2 - x1) as f32 * det.score.clamp(0.0, 1.0)) as i32;
    filled(img, x1, y2 + BAR_TOP, x1 + bar_width, y2 + BAR_BOTTOM, color);
    hollow(img, x1, y2 + BAR_TOP, x2, y2 + BAR_BOTTOM, color);
}

/// 带背景的标签, (x, y) 为文字基线左端
fn draw_label(
    img: &mut RgbImage,
    text: &str,
    x: i32,
    y: i32,
    background: Rgb<u8>,
    font: Option<&LabelFont>,
) {
    let (tw, th) = match font {
        Some(f) => f.text_size(text),
        // 无字体时按字符数估计标签尺寸
        None => (text.chars().count() as u32 * 12, 18),
    };
    let (tw, th) = (tw as i32, th as i32);
    let left = x - LABEL_PADDING;
    let top = y - th - LABEL_PADDING;
    let right = x + tw + LABEL_PADDING;
    let bottom = y + LABEL_PADDING / 2;

    filled(img, left, top, right, bottom, background);
    hollow(img, left, top, right, bottom, WHITE);
    if let Some(f) = font {
        draw_text_mut(img, WHITE, x, y - th, f.scale, &f.font, text);
    }
}

/// 绘制一帧中的全部检测
pub fn draw_detections(
    img: &mut RgbImage,
    detections: &[DetectionRecord],
    names: &ClassNames,
    font: Option<&LabelFont>,
) {
    for det in detections {
        let label = label_text(names, det);
        draw_detection(img, det, &label, font);
    }
}

/// 两帧各取一半混合, 尺寸不一致时返回 None
pub fn blend(prev: &RgbImage, cur: &RgbImage) -> Option<RgbImage> {
    if prev.dimensions() != cur.dimensions() {
        return None;
    }
    let (w, h) = cur.dimensions();
    Some(RgbImage::from_fn(w, h, |x, y| {
        let a = prev.get_pixel(x, y).0;
        let b = cur.get_pixel(x, y).0;
        Rgb([0, 1, 2].map(|i| ((a[i] as u16 + b[i] as u16 + 1) / 2) as u8))
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(score: f32, class_id: u32) -> DetectionRecord {
        DetectionRecord::new(20.0, 30.0, 60.0, 70.0, score, class_id)
    }

    #[test]
    fn test_palette_cycles() {
        assert_eq!(class_color(0), Rgb([255, 87, 51]));
        assert_eq!(class_color(10), class_color(0));
        assert_eq!(class_color(13), Rgb([155, 89, 182]));
        assert_eq!(lighten(Rgb([240, 10, 0])), Rgb([255, 40, 30]));
    }

    #[test]
    fn test_label_text() {
        let names = ClassNames::from_list("pen,cup");
        assert_eq!(label_text(&names, &record(0.876, 1)), "cup: 87%");
        assert_eq!(label_text(&names, &record(0.5, 4)), "class4: 50%");
    }

    #[test]
    fn test_draw_box_and_bar() {
        let mut img = RgbImage::new(100, 100);
        let det = record(0.5, 2);
        draw_detection(&mut img, &det, "x: 50%", None);
        let color = class_color(2);

        // 边框与内框
        assert_eq!(*img.get_pixel(20, 50), color);
        assert_eq!(*img.get_pixel(19, 50), color);
        assert_eq!(*img.get_pixel(21, 50), lighten(color));
        // 框内部不变
        assert_eq!(*img.get_pixel(40, 50), Rgb([0, 0, 0]));
        // 置信度条: 填充到 x1 + 20, 之后只有上下边线
        assert_eq!(*img.get_pixel(30, 75), color);
        assert_eq!(*img.get_pixel(50, 75), Rgb([0, 0, 0]));
        assert_eq!(*img.get_pixel(50, 72), color);
        assert_eq!(*img.get_pixel(60, 75), color);
        // 标签背景在框上方, 白色边线
        assert_eq!(*img.get_pixel(30, 18), color);
        assert_eq!(*img.get_pixel(12, 18), WHITE);
    }

    #[test]
    fn test_box_partially_outside_frame() {
        let mut img = RgbImage::new(20, 20);
        let det = DetectionRecord::new(-5.0, -5.0, 30.0, 30.0, 1.0, 0);
        draw_detection(&mut img, &det, "a: 100%", None);
        assert_eq!(img.dimensions(), (20, 20));
    }

    #[test]
    fn test_far_out_of_range_box_is_clamped() {
        // 归一化坐标远超出画面, 像素角点饱和到 i32::MAX
        let bbox = crate::annotation::BoundingBox::new(0, 5.0e7, 0.5, 1.0e8, 0.2);
        let det = DetectionRecord::from_normalized(&bbox, 0.9, 40, 40);
        assert_eq!(det.corners_i32().2, i32::MAX);
        assert_eq!(clamped_corners(&det, 40, 40), (0, 16, 80, 24));

        let mut img = RgbImage::new(40, 40);
        draw_detection(&mut img, &det, "pen: 90%", None);
        assert_eq!(img.dimensions(), (40, 40));
        // 左边框仍在画面内
        assert_eq!(*img.get_pixel(0, 20), class_color(0));

        let far = DetectionRecord::new(-1.0e12, -1.0e12, 1.0e12, 1.0e12, 0.5, 3);
        draw_detection(&mut img, &far, "", None);
        let nan = DetectionRecord::new(f32::NAN, 5.0, f32::INFINITY, 10.0, f32::NAN, 1);
        draw_detection(&mut img, &nan, "", None);
    }

    #[test]
    fn test_blend() {
        let a = RgbImage::from_pixel(2, 2, Rgb([0, 100, 255]));
        let b = RgbImage::from_pixel(2, 2, Rgb([10, 50, 255]));
        assert_eq!(blend(&a, &b).unwrap().get_pixel(1, 1).0, [5, 75, 255]);
        assert!(blend(&a, &RgbImage::new(3, 2)).is_none());
    }
}
