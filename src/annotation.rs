// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! YOLO格式标注读写
//!
//! 每行一个目标: `class_id x_center y_center width height`,
//! 坐标均为相对图像宽高归一化到 [0,1] 的浮点数, 写出时保留6位小数。

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

/// 归一化容差 (6位小数写出带来的舍入)
pub const NORM_EPS: f32 = 1e-6;

/// 标注读写错误
#[derive(Debug, thiserror::Error)]
pub enum AnnotationError {
    #[error("读取标注文件失败 {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("标注格式错误 {path}:{line}: {message}")]
    MalformedRecord {
        path: PathBuf,
        line: usize,
        message: String,
    },
}

/// 归一化边界框 (YOLO格式)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub class_id: u32,
    pub x_center: f32,
    pub y_center: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub fn new(class_id: u32, x_center: f32, y_center: f32, width: f32, height: f32) -> Self {
        Self {
            class_id,
            x_center,
            y_center,
            width,
            height,
        }
    }

    /// 由归一化角点 (x1, y1, x2, y2) 构造
    pub fn from_corners(class_id: u32, x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self {
            class_id,
            x_center: (x1 + x2) / 2.0,
            y_center: (y1 + y2) / 2.0,
            width: x2 - x1,
            height: y2 - y1,
        }
    }

    /// 归一化角点 (x1, y1, x2, y2)
    pub fn to_corners(&self) -> [f32; 4] {
        let hw = self.width / 2.0;
        let hh = self.height / 2.0;
        [
            self.x_center - hw,
            self.y_center - hh,
            self.x_center + hw,
            self.y_center + hh,
        ]
    }

    /// 检查框是否完整位于画面内
    ///
    /// 中心点在 [0,1], 宽高在 (0,1], 四条边都不越界 (允许 `NORM_EPS` 的舍入误差)。
    /// 不满足的框应当丢弃, 而不是截断。
    pub fn is_valid(&self) -> bool {
        let values = [self.x_center, self.y_center, self.width, self.height];
        if values.iter().any(|v| !v.is_finite()) {
            return false;
        }
        if self.width <= 0.0 || self.height <= 0.0 {
            return false;
        }
        if self.width > 1.0 + NORM_EPS || self.height > 1.0 + NORM_EPS {
            return false;
        }
        let in_unit = |v: f32| (-NORM_EPS..=1.0 + NORM_EPS).contains(&v);
        self.to_corners().iter().all(|&v| in_unit(v))
            && in_unit(self.x_center)
            && in_unit(self.y_center)
    }

    /// 序列化为一行文本 (6位小数)
    pub fn format_line(&self) -> String {
        format!(
            "{} {:.6} {:.6} {:.6} {:.6}",
            self.class_id, self.x_center, self.y_center, self.width, self.height
        )
    }
}

/// 解析单行标注 `class x y w h`
///
/// 空行返回 `Ok(None)`。
pub fn parse_line(line: &str) -> Result<Option<BoundingBox>, String> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.is_empty() {
        return Ok(None);
    }
    if tokens.len() != 5 {
        return Err(format!("需要5个字段, 实际 {} 个", tokens.len()));
    }
    parse_fields(&tokens).map(Some)
}

/// 解析带置信度的预测行 `class x y w h conf`
pub fn parse_prediction_line(line: &str) -> Result<Option<(BoundingBox, f32)>, String> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.is_empty() {
        return Ok(None);
    }
    if tokens.len() != 6 {
        return Err(format!("需要6个字段, 实际 {} 个", tokens.len()));
    }
    let bbox = parse_fields(&tokens[..5])?;
    let conf = tokens[5]
        .parse::<f32>()
        .map_err(|e| format!("置信度 '{}' 无法解析: {}", tokens[5], e))?;
    Ok(Some((bbox, conf)))
}

fn parse_fields(tokens: &[&str]) -> Result<BoundingBox, String> {
    let class_id = tokens[0]
        .parse::<u32>()
        .map_err(|e| format!("类别 '{}' 无法解析: {}", tokens[0], e))?;
    let mut coords = [0.0f32; 4];
    for (slot, token) in coords.iter_mut().zip(&tokens[1..5]) {
        *slot = token
            .parse::<f32>()
            .map_err(|e| format!("坐标 '{}' 无法解析: {}", token, e))?;
    }
    Ok(BoundingBox::new(
        class_id, coords[0], coords[1], coords[2], coords[3],
    ))
}

/// 解析整个文件内容
pub fn parse_str(path: &Path, content: &str) -> Result<Vec<BoundingBox>, AnnotationError> {
    let mut boxes = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        match parse_line(line) {
            Ok(Some(bbox)) => boxes.push(bbox),
            Ok(None) => {}
            Err(message) => {
                return Err(AnnotationError::MalformedRecord {
                    path: path.to_path_buf(),
                    line: idx + 1,
                    message,
                })
            }
        }
    }
    Ok(boxes)
}

/// 读取YOLO标注文件
pub fn read(path: &Path) -> Result<Vec<BoundingBox>, AnnotationError> {
    let content = fs::read_to_string(path).map_err(|source| AnnotationError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_str(path, &content)
}

/// 写出YOLO标注文件 (保持顺序)
pub fn write(path: &Path, boxes: &[BoundingBox]) -> Result<(), AnnotationError> {
    let mut out = String::with_capacity(boxes.len() * 48);
    for bbox in boxes {
        // String 的 fmt::Write 不会失败
        let _ = writeln!(out, "{}", bbox.format_line());
    }
    fs::write(path, out).map_err(|source| AnnotationError::Io {
        path: path.to_path_buf(),
        source,
    })
}
