// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 检测结果来源
///
/// 模型推理由外部检测库完成, 这里只负责调用和读取其逐帧输出。
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{anyhow, Context, Result};
use image::RgbImage;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::types::DetectionRecord;
use crate::annotation::parse_prediction_line;
use crate::external::run_checked;

/// 逐帧检测接口
pub trait DetectionSource {
    /// 返回第 `frame_index` 帧 (从0开始) 的检测结果, 坐标为该帧像素坐标
    fn detect(&mut self, frame_index: u64, frame: &RgbImage) -> Result<Vec<DetectionRecord>>;
}

/// 外部预测器输出目录: `<stem>_<n>.txt`, n 从1开始, 每行 `class x y w h conf`
pub struct PredictionDir {
    dir: PathBuf,
    files: HashMap<u64, PathBuf>,
}

impl PredictionDir {
    /// 扫描目录, 按帧号建立索引; `stem` 为 None 时接受任意前缀
    pub fn open(dir: &Path, stem: Option<&str>) -> Result<Self> {
        let pattern = Regex::new(r"^(?P<stem>.+)_(?P<frame>\d+)\.txt$")?;
        let mut files = HashMap::new();

        for entry in fs::read_dir(dir)
            .with_context(|| format!("读取预测目录失败: {}", dir.display()))?
        {
            let path = entry?.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Some(caps) = pattern.captures(name) else {
                continue;
            };
            if stem.is_some_and(|s| s != &caps["stem"]) {
                continue;
            }
            if let Ok(frame) = caps["frame"].parse::<u64>() {
                files.insert(frame, path.clone());
            }
        }

        info!("📦 预测结果: {} 帧有检测 ({})", files.len(), dir.display());
        Ok(Self {
            dir: dir.to_path_buf(),
            files,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl DetectionSource for PredictionDir {
    fn detect(&mut self, frame_index: u64, frame: &RgbImage) -> Result<Vec<DetectionRecord>> {
        // 没有对应文件表示该帧无检测
        let Some(path) = self.files.get(&(frame_index + 1)) else {
            return Ok(Vec::new());
        };
        let content = fs::read_to_string(path)
            .with_context(|| format!("读取预测文件失败: {}", path.display()))?;
        let (w, h) = frame.dimensions();

        let mut records = Vec::new();
        for (idx, line) in content.lines().enumerate() {
            let parsed = parse_prediction_line(line)
                .map_err(|e| anyhow!("{}:{}: {}", path.display(), idx + 1, e))?;
            if let Some((bbox, conf)) = parsed {
                records.push(DetectionRecord::from_normalized(&bbox, conf, w, h));
            }
        }
        Ok(records)
    }
}

/// 外部预测器配置 (Ultralytics 命令行)
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictorConfig {
    pub yolo: String,
    pub model: PathBuf,
    pub project: PathBuf,
    pub name: String,
    pub conf: Option<f32>,
    pub device: Option<String>,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            yolo: "yolo".to_string(),
            model: PathBuf::from(
                "runs/detect/YOLOv11_upd_dataset_annotations_no_preprocessing_augment/weights/best.pt",
            ),
            project: PathBuf::from("runs/predict"),
            name: "overlay".to_string(),
            conf: None,
            device: None,
        }
    }
}

/// 调用外部预测器, 生成逐帧预测文件
pub struct UltralyticsPredictor {
    config: PredictorConfig,
}

impl UltralyticsPredictor {
    pub fn new(config: PredictorConfig) -> Self {
        Self { config }
    }

    /// 预测输出的标注目录
    pub fn labels_dir(&self) -> PathBuf {
        self.config.project.join(&self.config.name).join("labels")
    }

    pub fn build_command(&self, video: &Path) -> Command {
        let c = &self.config;
        let mut cmd = Command::new(&c.yolo);
        cmd.args(["detect", "predict"])
            .arg(format!("model={}", c.model.display()))
            .arg(format!("source={}", video.display()))
            .args(["save_txt=True", "save_conf=True", "save=False", "exist_ok=True"])
            .arg(format!("project={}", c.project.display()))
            .arg(format!("name={}", c.name));
        if let Some(conf) = c.conf {
            cmd.arg(format!("conf={}", conf));
        }
        if let Some(device) = &c.device {
            cmd.arg(format!("device={}", device));
        }
        cmd
    }

    /// 对视频运行预测, 返回可直接读取的预测目录
    pub fn predict(&self, video: &Path) -> Result<PredictionDir> {
        info!("🔍 外部预测: {}", video.display());
        run_checked(&mut self.build_command(video))
            .with_context(|| format!("预测失败: {}", video.display()))?;
        let stem = video.file_stem().and_then(|s| s.to_str());
        PredictionDir::open(&self.labels_dir(), stem)
    }
}
