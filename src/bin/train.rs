/// 批量训练 (Experiment Sweep)
///
/// 依次执行实验列表中的每组超参数, 调用外部 `yolo detect train`。
/// 任意一次训练失败即中止。
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use yolo_toolkit::experiment::{load_experiments, UltralyticsTrainer};
use yolo_toolkit::{init_tracing, ExperimentRunner, ToolkitConfig};

/// 批量训练参数
#[derive(Parser, Debug)]
#[command(author, version, about = "YOLO 批量训练", long_about = None)]
struct Args {
    /// 实验列表 (JSON 数组), 默认使用内置实验
    #[arg(short, long)]
    experiments: Option<PathBuf>,

    /// 运行记录 (JSON Lines)
    #[arg(short, long)]
    journal: Option<PathBuf>,

    /// 外部训练命令
    #[arg(long, default_value = "yolo")]
    yolo: String,

    /// 只打印训练命令
    #[arg(long)]
    dry_run: bool,

    /// JSON 配置文件
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let experiments = match (&args.experiments, &args.config) {
        (Some(path), _) => load_experiments(path)?,
        (None, Some(path)) => ToolkitConfig::load(path).experiments,
        (None, None) => ToolkitConfig::default().experiments,
    };
    info!("📋 实验数: {}", experiments.len());

    let trainer = UltralyticsTrainer {
        yolo: args.yolo,
        dry_run: args.dry_run,
    };
    let mut runner = ExperimentRunner::new(trainer);
    if let Some(journal) = args.journal {
        runner = runner.with_journal(journal);
    }

    let records = runner.run(&experiments)?;
    info!("🎉 全部完成: {} 个实验", records.len());
    Ok(())
}
