/// 数据集扩增 (Dataset Augmentation)
///
/// 读取 `<root>/train/images` + `<root>/train/labels`,
/// 输出到 `<root>/images_aug/train` + `<root>/labels_aug/train`。
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use yolo_toolkit::{init_tracing, DatasetLayout, Expander, ToolkitConfig};

/// 数据集扩增参数
#[derive(Parser, Debug)]
#[command(author, version, about = "YOLO 数据集扩增", long_about = None)]
struct Args {
    /// 数据集根目录
    #[arg(short, long)]
    root: Option<PathBuf>,

    /// 每张图片生成的增强数量
    #[arg(short, long)]
    multiplier: Option<u32>,

    /// 随机种子 (固定后结果可复现)
    #[arg(short, long)]
    seed: Option<u64>,

    /// JSON 配置文件
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => ToolkitConfig::load(path),
        None => ToolkitConfig::default(),
    };
    if let Some(root) = &args.root {
        config.expand.layout = DatasetLayout::from_root(root);
    }
    if let Some(m) = args.multiplier {
        config.expand.multiplier = m;
    }
    if args.seed.is_some() {
        config.augment.seed = args.seed;
    }

    info!("🚀 数据集扩增启动");
    info!("📂 输入: {}", config.expand.layout.images_dir.display());
    info!("🔁 每张增强: {}", config.expand.multiplier);

    let mut expander = Expander::new(config.expand.clone(), &config.augment);
    let report = expander.run()?;
    info!(
        "📊 原图 {} | 复制 {} | 增强 {} | 无标注 {} | 不可读 {} | 空结果 {} | 失败 {}",
        report.sources,
        report.copied,
        report.augmented,
        report.unmatched,
        report.unreadable,
        report.skipped_empty,
        report.failed
    );
    Ok(())
}
