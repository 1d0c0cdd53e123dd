// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 工具集配置 (JSON)
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::augment::AugmentConfig;
use crate::dataset::ExpandConfig;
use crate::detection::PredictorConfig;
use crate::experiment::{default_experiments, ExperimentConfig};
use crate::input::ExtractConfig;
use crate::renderer::OverlayConfig;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolkitConfig {
    pub augment: AugmentConfig,
    pub expand: ExpandConfig,
    pub extract: ExtractConfig,
    pub overlay: OverlayConfig,
    pub predictor: PredictorConfig,
    pub experiments: Vec<ExperimentConfig>,
}

impl Default for ToolkitConfig {
    fn default() -> Self {
        Self {
            augment: AugmentConfig::default(),
            expand: ExpandConfig::default(),
            extract: ExtractConfig::default(),
            overlay: OverlayConfig::default(),
            predictor: PredictorConfig::default(),
            experiments: default_experiments(),
        }
    }
}

impl ToolkitConfig {
    /// 从JSON文件加载配置
    ///
    /// 解析失败时使用默认值; 文件不存在时写出一份默认配置。
    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(json) => match serde_json::from_str(&json) {
                Ok(config) => {
                    info!("✅ 配置已从 {} 加载", path.display());
                    config
                }
                Err(e) => {
                    warn!("⚠️  配置文件解析失败: {}, 使用默认值", e);
                    Self::default()
                }
            },
            Err(_) => {
                info!("📝 配置文件不存在,创建默认配置...");
                let config = Self::default();
                config.save(path);
                config
            }
        }
    }

    /// 保存配置到JSON文件
    pub fn save(&self, path: &Path) {
        match serde_json::to_string_pretty(self) {
            Ok(json) => {
                if let Err(e) = fs::write(path, json) {
                    error!("❌ 保存配置失败: {}", e);
                } else {
                    info!("💾 配置已保存到 {}", path.display());
                }
            }
            Err(e) => error!("❌ 序列化配置失败: {}", e),
        }
    }

    /// 打印当前配置
    pub fn print_summary(&self) {
        info!("🎛️  当前配置:");
        info!(
            "  数据集: {} (x{})",
            self.expand.layout.images_dir.display(),
            self.expand.multiplier
        );
        info!("  增强随机种子: {:?}", self.augment.seed);
        info!(
            "  抽帧: {} → {} @ {} fps",
            self.extract.input_dir.display(),
            self.extract.output_dir.display(),
            self.extract.fps
        );
        info!(
            "  叠加输出: {} @ {} fps",
            self.overlay.output.display(),
            self.overlay.fps
        );
        info!("  实验数: {}", self.experiments.len());
    }
}
