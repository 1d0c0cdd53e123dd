// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 检测系统 (Detection System)
///
/// 推理本身由外部检测库完成
/// - types:  检测结果与类别名称
/// - source: 逐帧检测来源 (外部预测器输出目录)
pub mod source;
pub mod types;

pub use source::{DetectionSource, PredictionDir, PredictorConfig, UltralyticsPredictor};
pub use types::{ClassNames, DetectionRecord};
