// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
pub mod annotation; // YOLO 标注读写
pub mod augment; // 数据增强流水线
pub mod config; // 工具集配置
pub mod dataset; // 数据集扩增
pub mod detection; // 检测结果来源
pub mod experiment; // 批量训练实验
pub mod external; // 外部进程调用
pub mod input; // 视频输入系统
pub mod renderer; // 检测叠加渲染
pub mod utils; // 工具函数

pub use crate::annotation::{AnnotationError, BoundingBox};
pub use crate::augment::{AnnotatedImage, AugmentConfig, AugmentOutcome, Pipeline};
pub use crate::config::ToolkitConfig;
pub use crate::dataset::{DatasetLayout, ExpandConfig, ExpandReport, Expander};
pub use crate::detection::{ClassNames, DetectionRecord, DetectionSource};
pub use crate::experiment::{ExperimentConfig, ExperimentRunner, Trainer};
pub use crate::external::ExternalError;
pub use crate::input::{ExtractConfig, FrameExtractor, VideoReader};
pub use crate::renderer::{OverlayConfig, OverlayRenderer, OverlayReport};

/// 初始化日志输出, 默认级别 info, 可用 `RUST_LOG` 覆盖
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
