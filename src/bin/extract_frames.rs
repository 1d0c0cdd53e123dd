/// 视频抽帧 (Frame Extraction)
///
/// 按固定帧率把目录中的视频抽成 `<stem>_%04d.jpg` 图片序列, 依赖外部 ffmpeg/ffprobe。
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use yolo_toolkit::{init_tracing, FrameExtractor, ToolkitConfig};

/// 抽帧参数
#[derive(Parser, Debug)]
#[command(author, version, about = "视频抽帧", long_about = None)]
struct Args {
    /// 视频目录
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// 输出图片目录
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// 每秒抽取帧数
    #[arg(short, long)]
    fps: Option<u32>,

    /// 视频扩展名 (可重复, 不区分大小写)
    #[arg(short, long)]
    ext: Vec<String>,

    /// JSON 配置文件
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => ToolkitConfig::load(path).extract,
        None => Default::default(),
    };
    if let Some(input) = args.input {
        config.input_dir = input;
    }
    if let Some(output) = args.output {
        config.output_dir = output;
    }
    if let Some(fps) = args.fps {
        config.fps = fps;
    }
    if !args.ext.is_empty() {
        config.extensions = args.ext;
    }

    let extractor = FrameExtractor::new(config);
    let videos = extractor.run()?;
    info!(
        "🎉 抽帧完成: {} 个视频 → {}",
        videos.len(),
        extractor.config().output_dir.display()
    );
    Ok(())
}
