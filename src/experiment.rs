// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 批量训练实验
///
/// 每个实验是一组扁平的超参数; 依次加载检查点并调用外部训练命令,
/// 只转发训练命令识别的参数。任何一次训练失败都会中止整个批次。
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result};
use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use crate::external::{describe, run_checked};

/// 转发给训练命令的参数
pub const TRAIN_KEYS: [&str; 6] = ["data", "epochs", "batch", "imgsz", "device", "lr0"];

/// 单个实验配置
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExperimentConfig {
    pub name: String,
    /// 起始检查点
    pub model: String,
    #[serde(flatten)]
    pub params: BTreeMap<String, Value>,
}

impl ExperimentConfig {
    /// 运行标识, 训练输出写入同名子目录
    pub fn run_id(&self) -> String {
        format!("YOLOv11_{}", self.name)
    }

    /// 训练参数: 按 `TRAIN_KEYS` 顺序筛选, 末尾追加 `name=<run_id>`
    pub fn train_args(&self) -> Vec<(String, String)> {
        let mut args: Vec<(String, String)> = TRAIN_KEYS
            .iter()
            .filter_map(|k| {
                self.params
                    .get(*k)
                    .map(|v| (k.to_string(), format_value(v)))
            })
            .collect();
        args.push(("name".to_string(), self.run_id()));
        args
    }
}

/// 命令行参数值 (字符串不加引号, 布尔值为 True/False)
fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        other => other.to_string(),
    }
}

/// 默认实验列表
pub fn default_experiments() -> Vec<ExperimentConfig> {
    let params = json!({
        "data": "project/dataset/data.yaml",

        "epochs": 75,
        "imgsz": 640,
        "batch": 12,
        "device": "mps",

        "cos_lr": true,
        "lr0": 0.008,
        "lrf": 0.0001,

        "warmup_epochs": 5.0,
        "warmup_momentum": 0.8,
        "momentum": 0.95,
        "weight_decay": 0.0008,

        "auto_augment": "randaugment",
        "erasing": 0.3,
        "mixup": 0.15,
        "copy_paste": 0.1,
        "degrees": 8.0,
        "translate": 0.12,
        "scale": 0.6,
        "shear": 3.0,
        "perspective": 0.0001,

        "hsv_h": 0.018,
        "hsv_s": 0.75,
        "hsv_v": 0.45,

        "close_mosaic": 15,
        "amp": true,

        "conf": 0.22,
        "iou": 0.65,

        "box": 8.0,
        "cls": 0.6,
        "dfl": 1.8,
    });
    let params = match params {
        Value::Object(map) => map.into_iter().collect(),
        _ => BTreeMap::new(),
    };
    vec![ExperimentConfig {
        name: "cosine_advanced".to_string(),
        model: "runs/detect/YOLOv11_baseline/weights/best.pt".to_string(),
        params,
    }]
}

/// 从 JSON 数组加载实验列表
pub fn load_experiments(path: &Path) -> Result<Vec<ExperimentConfig>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("读取实验列表失败: {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("实验列表格式错误: {}", path.display()))
}

/// 训练接口
pub trait Trainer {
    fn train(&mut self, checkpoint: &str, args: &[(String, String)]) -> Result<()>;
}

/// 调用 Ultralytics 命令行训练
pub struct UltralyticsTrainer {
    pub yolo: String,
    /// 只打印命令, 不执行
    pub dry_run: bool,
}

impl Default for UltralyticsTrainer {
    fn default() -> Self {
        Self {
            yolo: "yolo".to_string(),
            dry_run: false,
        }
    }
}

impl UltralyticsTrainer {
    pub fn build_command(&self, checkpoint: &str, args: &[(String, String)]) -> Command {
        let mut cmd = Command::new(&self.yolo);
        cmd.args(["detect", "train"])
            .arg(format!("model={}", checkpoint));
        for (k, v) in args {
            cmd.arg(format!("{}={}", k, v));
        }
        cmd
    }
}

impl Trainer for UltralyticsTrainer {
    fn train(&mut self, checkpoint: &str, args: &[(String, String)]) -> Result<()> {
        let mut cmd = self.build_command(checkpoint, args);
        if self.dry_run {
            info!("📝 {}", describe(&cmd));
            return Ok(());
        }
        run_checked(&mut cmd)?;
        Ok(())
    }
}

/// 单次运行记录 (写入日志文件)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: String,
    pub model: String,
    pub started_at: String,
    pub finished_at: String,
    pub args: BTreeMap<String, String>,
}

/// 实验批量执行器
pub struct ExperimentRunner<T: Trainer> {
    trainer: T,
    journal: Option<PathBuf>,
}

impl<T: Trainer> ExperimentRunner<T> {
    pub fn new(trainer: T) -> Self {
        Self {
            trainer,
            journal: None,
        }
    }

    /// 每次成功训练后追加一行 JSON 记录
    pub fn with_journal(mut self, path: PathBuf) -> Self {
        self.journal = Some(path);
        self
    }

    pub fn trainer(&self) -> &T {
        &self.trainer
    }

    /// 依次执行全部实验, 任何失败立即返回错误
    pub fn run(&mut self, experiments: &[ExperimentConfig]) -> Result<Vec<RunRecord>> {
        let mut records = Vec::with_capacity(experiments.len());
        for exp in experiments {
            let run_id = exp.run_id();
            info!("🚀 开始实验 {}", run_id);

            let args = exp.train_args();
            let started_at = Local::now().to_rfc3339();
            self.trainer
                .train(&exp.model, &args)
                .with_context(|| format!("实验 {} 训练失败", run_id))?;
            let record = RunRecord {
                run_id,
                model: exp.model.clone(),
                started_at,
                finished_at: Local::now().to_rfc3339(),
                args: args.into_iter().collect(),
            };
            info!("✅ 实验完成 {}", record.run_id);

            if let Some(path) = &self.journal {
                append_journal(path, &record)?;
            }
            records.push(record);
        }
        Ok(records)
    }
}

fn append_journal(path: &Path, record: &RunRecord) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("打开实验日志失败: {}", path.display()))?;
    writeln!(file, "{}", serde_json::to_string(record)?)?;
    Ok(())
}
