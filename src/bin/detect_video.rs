/// 检测结果叠加渲染 (Detection Overlay)
///
/// 流程:
/// 1. 外部预测器对视频逐帧推理, 输出带置信度的标注文件 (或直接使用已有目录)
/// 2. 解码视频 → 旋转/平滑 → 绘制检测框、标签、置信度条
/// 3. 编码输出视频 (可选插帧)
///
/// 运行中在终端输入 `q` 回车即可提前结束。
use std::io::BufRead;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use clap::Parser;
use tracing::{info, warn};
use yolo_toolkit::detection::{PredictionDir, UltralyticsPredictor};
use yolo_toolkit::input::{request_stop, reset_stop};
use yolo_toolkit::renderer::FrameRotation;
use yolo_toolkit::{init_tracing, ClassNames, OverlayRenderer, ToolkitConfig};

const DEFAULT_DATA_YAML: &str = "project/dataset/data.yaml";

/// 叠加渲染参数
#[derive(Parser, Debug)]
#[command(author, version, about = "YOLO 检测结果视频叠加", long_about = None)]
struct Args {
    /// 输入视频
    #[arg(short, long, default_value = "data/videos/4.MOV")]
    video: PathBuf,

    /// 已有的逐帧预测目录 (`<stem>_<n>.txt`)
    #[arg(short, long)]
    predictions: Option<PathBuf>,

    /// 模型检查点, 未指定预测目录时用它运行外部预测器
    #[arg(short, long)]
    model: Option<PathBuf>,

    /// 输出视频
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// 类别名称: 数据集 YAML / JSON 数组文件, 或逗号分隔列表
    #[arg(short, long)]
    names: Option<String>,

    /// 输出帧率
    #[arg(long)]
    fps: Option<f64>,

    /// 帧旋转: none / cw90 / ccw90 / 180
    #[arg(long)]
    rotate: Option<String>,

    /// 高斯平滑 sigma, 0 表示关闭
    #[arg(long)]
    smooth_sigma: Option<f32>,

    /// 关闭插帧
    #[arg(long)]
    no_interpolate: bool,

    /// 标签字体文件
    #[arg(long)]
    font: Option<PathBuf>,

    /// 最多处理的帧数
    #[arg(long)]
    max_frames: Option<u64>,

    /// JSON 配置文件
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn load_names(arg: Option<&str>) -> Result<ClassNames> {
    match arg {
        Some(s) if Path::new(s).is_file() => ClassNames::load(Path::new(s)),
        Some(s) => Ok(ClassNames::from_list(s)),
        None if Path::new(DEFAULT_DATA_YAML).is_file() => {
            ClassNames::load(Path::new(DEFAULT_DATA_YAML))
        }
        None => Ok(ClassNames::default()),
    }
}

/// 终端输入 `q` 时请求停止
fn spawn_quit_listener() {
    std::thread::spawn(|| {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(l) if l.trim().eq_ignore_ascii_case("q") => {
                    info!("⏹️ 收到退出指令");
                    request_stop();
                    break;
                }
                Ok(_) => {}
                Err(_) => break,
            }
        }
    });
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let toolkit = match &args.config {
        Some(path) => ToolkitConfig::load(path),
        None => ToolkitConfig::default(),
    };
    let mut overlay = toolkit.overlay;
    let mut predictor = toolkit.predictor;

    if let Some(output) = args.output {
        overlay.output = output;
    }
    if let Some(fps) = args.fps {
        overlay.fps = fps;
    }
    if let Some(rotate) = &args.rotate {
        overlay.rotation =
            FrameRotation::parse(rotate).ok_or_else(|| anyhow!("无效的旋转方式: {}", rotate))?;
    }
    if let Some(sigma) = args.smooth_sigma {
        overlay.smooth_sigma = (sigma > 0.0).then_some(sigma);
    }
    if args.no_interpolate {
        overlay.interpolate = false;
    }
    if args.font.is_some() {
        overlay.font_path = args.font;
    }
    if args.max_frames.is_some() {
        overlay.max_frames = args.max_frames;
    }
    if let Some(model) = args.model {
        predictor.model = model;
    }

    let names = load_names(args.names.as_deref())?;
    if names.is_empty() {
        warn!("⚠️ 未提供类别名称, 使用 class<id>");
    } else {
        info!("🏷️ 类别数: {}", names.len());
    }

    // 获取逐帧检测结果
    let stem = args.video.file_stem().and_then(|s| s.to_str());
    let source = match &args.predictions {
        Some(dir) => PredictionDir::open(dir, stem)?,
        None => UltralyticsPredictor::new(predictor).predict(&args.video)?,
    };
    if source.is_empty() {
        warn!("⚠️ 预测目录中没有该视频的检测结果: {}", source.dir().display());
    }

    info!("🚀 开始渲染, 终端输入 q 回车可提前结束");
    reset_stop();
    spawn_quit_listener();

    let mut renderer = OverlayRenderer::new(overlay, source, names);
    let report = renderer.run(&args.video)?;
    info!(
        "🎉 完成: 读取 {} 帧, 写出 {} 帧 → {}",
        report.frames_read,
        report.frames_written,
        renderer.config().output.display()
    );
    Ok(())
}
