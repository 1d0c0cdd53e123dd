// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 检测结果数据结构定义
/// Data structures for detection results
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::annotation::BoundingBox;

// ========== 数据结构 ==========

/// 单个检测结果 (像素坐标角点)
#[derive(Clone, Debug, PartialEq)]
pub struct DetectionRecord {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub score: f32,
    pub class_id: u32,
}

impl DetectionRecord {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32, score: f32, class_id: u32) -> Self {
        Self {
            x1,
            y1,
            x2,
            y2,
            score,
            class_id,
        }
    }

    /// 由归一化框和置信度换算到像素坐标
    pub fn from_normalized(bbox: &BoundingBox, score: f32, width: u32, height: u32) -> Self {
        let [x1, y1, x2, y2] = bbox.to_corners();
        let (w, h) = (width as f32, height as f32);
        Self::new(x1 * w, y1 * h, x2 * w, y2 * h, score, bbox.class_id)
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    /// 整数像素角点 (截断, 与 `map(int, box)` 一致)
    pub fn corners_i32(&self) -> (i32, i32, i32, i32) {
        (
            self.x1 as i32,
            self.y1 as i32,
            self.x2 as i32,
            self.y2 as i32,
        )
    }

    /// 置信度百分比 (向下取整)
    pub fn confidence_percent(&self) -> u32 {
        (self.score.clamp(0.0, 1.0) * 100.0) as u32
    }
}

/// 类别名称表
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ClassNames {
    names: Vec<String>,
}

impl ClassNames {
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }

    /// 逗号分隔的名称列表
    pub fn from_list(list: &str) -> Self {
        Self::new(
            list.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        )
    }

    /// 从 JSON 数组或数据集 YAML 的 `names` 段加载
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("读取类别文件失败: {}", path.display()))?;
        if let Ok(names) = serde_json::from_str::<Vec<String>>(&text) {
            return Ok(Self::new(names));
        }
        Ok(Self::new(parse_yaml_names(&text)?))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// 类别名称, 未知类别回退为 `class<id>`
    pub fn name(&self, class_id: u32) -> String {
        self.names
            .get(class_id as usize)
            .cloned()
            .unwrap_or_else(|| format!("class{}", class_id))
    }
}

/// 数据集 YAML, 只关心 `names`
#[derive(Debug, Deserialize)]
struct DataYaml {
    names: DataYamlNames,
}

/// `names` 可以是列表, 也可以是 `索引: 名称` 映射
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DataYamlNames {
    Sequence(Vec<String>),
    Mapping(BTreeMap<usize, String>),
}

/// 解析数据集 YAML 中的 `names`; 映射中缺失的索引回退为 `class<id>`
fn parse_yaml_names(text: &str) -> Result<Vec<String>> {
    let data: DataYaml = serde_yaml::from_str(text).context("解析数据集 YAML 失败")?;
    Ok(match data.names {
        DataYamlNames::Sequence(names) => names,
        DataYamlNames::Mapping(mapping) => {
            let count = mapping.keys().next_back().map_or(0, |max| max + 1);
            (0..count)
                .map(|idx| {
                    mapping
                        .get(&idx)
                        .filter(|name| !name.trim().is_empty())
                        .cloned()
                        .unwrap_or_else(|| format!("class{}", idx))
                })
                .collect()
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_normalized() {
        let bbox = BoundingBox::new(2, 0.5, 0.5, 0.5, 0.25);
        let det = DetectionRecord::from_normalized(&bbox, 0.9, 200, 100);
        assert_eq!(det, DetectionRecord::new(50.0, 37.5, 150.0, 62.5, 0.9, 2));
        assert_eq!(det.corners_i32(), (50, 37, 150, 62));
        assert_eq!(det.confidence_percent(), 90);
    }

    #[test]
    fn test_class_name_fallback() {
        let names = ClassNames::from_list("pen, cup ,");
        assert_eq!(names.len(), 2);
        assert_eq!(names.name(1), "cup");
        assert_eq!(names.name(7), "class7");
    }

    #[test]
    fn test_yaml_names_mapping() {
        let yaml = "path: ../dataset\nnames:\n  0: pen\n  1: 'cup'\n  2: \"box\"\ntrain: images/train\n";
        assert_eq!(parse_yaml_names(yaml).unwrap(), vec!["pen", "cup", "box"]);
    }

    #[test]
    fn test_yaml_names_inline_and_list() {
        assert_eq!(parse_yaml_names("nc: 2\nnames: ['a', 'b']\n").unwrap(), vec!["a", "b"]);
        assert_eq!(parse_yaml_names("names:\n  - a\n  - b\n").unwrap(), vec!["a", "b"]);
        assert_eq!(
            parse_yaml_names("path: ds\nnames: {0: pen, 1: cup}\n").unwrap(),
            vec!["pen", "cup"]
        );
    }

    #[test]
    fn test_yaml_names_comments() {
        let yaml = "names:\n  0: pen # writing\n  1: cup\n";
        assert_eq!(parse_yaml_names(yaml).unwrap(), vec!["pen", "cup"]);

        let yaml = "names:\n\n  # classes\n  0: pen\n  1: cup\nval: images/val\n";
        assert_eq!(parse_yaml_names(yaml).unwrap(), vec!["pen", "cup"]);
    }

    #[test]
    fn test_yaml_names_sparse_mapping() {
        let yaml = "names:\n  2: box\n  0: pen\n";
        assert_eq!(parse_yaml_names(yaml).unwrap(), vec!["pen", "class1", "box"]);
    }

    #[test]
    fn test_yaml_without_names_is_error() {
        assert!(parse_yaml_names("path: ds\ntrain: images\n").is_err());
    }

    #[test]
    fn test_load_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.yaml");
        fs::write(&path, "names:\n  0: pen\n  1: cup\n").unwrap();
        let names = ClassNames::load(&path).unwrap();
        assert_eq!(names.name(1), "cup");
    }
}
