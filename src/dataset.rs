// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 数据集扩增
///
/// 遍历 `train/images` 中的每张图片, 找到同名标注后:
/// 1. 原图与标注原样复制到输出目录
/// 2. 执行 `multiplier` 次增强, 每个有效结果写出 `<stem>_aug<i>.<ext>` / `<stem>_aug<i>.txt`
///
/// 缺少标注、图片无法读取或标注格式错误时只告警并跳过该图片。
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::annotation;
use crate::augment::{AnnotatedImage, AugmentConfig, AugmentOutcome, Pipeline};
use crate::utils::fs::list_files_with_extensions;

/// 数据集目录结构
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetLayout {
    pub images_dir: PathBuf,
    pub labels_dir: PathBuf,
    pub aug_images_dir: PathBuf,
    pub aug_labels_dir: PathBuf,
}

impl DatasetLayout {
    /// 由数据集根目录推导输入输出目录
    pub fn from_root(root: &Path) -> Self {
        Self {
            images_dir: root.join("train").join("images"),
            labels_dir: root.join("train").join("labels"),
            aug_images_dir: root.join("images_aug").join("train"),
            aug_labels_dir: root.join("labels_aug").join("train"),
        }
    }
}

impl Default for DatasetLayout {
    fn default() -> Self {
        Self::from_root(Path::new("project/dataset"))
    }
}

/// 扩增配置
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpandConfig {
    pub layout: DatasetLayout,
    /// 每张原图生成的增强次数
    pub multiplier: u32,
    pub image_extensions: Vec<String>,
}

impl Default for ExpandConfig {
    fn default() -> Self {
        Self {
            layout: DatasetLayout::default(),
            multiplier: 3,
            image_extensions: ["jpg", "jpeg", "png", "bmp", "webp"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// 扩增统计
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExpandReport {
    /// 找到的图片数
    pub sources: usize,
    /// 缺少同名标注
    pub unmatched: usize,
    /// 图片无法解码或标注格式错误
    pub unreadable: usize,
    /// 原样复制的图片数
    pub copied: usize,
    /// 写出的增强样本数
    pub augmented: usize,
    /// 增强后没有剩余框而丢弃的次数
    pub skipped_empty: usize,
    /// 增强失败的次数
    pub failed: usize,
}

/// 数据集扩增器
pub struct Expander {
    config: ExpandConfig,
    pipeline: Pipeline,
}

impl Expander {
    pub fn new(config: ExpandConfig, augment: &AugmentConfig) -> Self {
        Self::with_pipeline(config, Pipeline::new(augment))
    }

    pub fn with_pipeline(config: ExpandConfig, pipeline: Pipeline) -> Self {
        Self { config, pipeline }
    }

    pub fn config(&self) -> &ExpandConfig {
        &self.config
    }

    pub fn run(&mut self) -> Result<ExpandReport> {
        let layout = self.config.layout.clone();
        for dir in [&layout.aug_images_dir, &layout.aug_labels_dir] {
            fs::create_dir_all(dir)
                .with_context(|| format!("创建输出目录失败: {}", dir.display()))?;
        }

        let images = list_files_with_extensions(&layout.images_dir, &self.config.image_extensions)
            .with_context(|| format!("读取图片目录失败: {}", layout.images_dir.display()))?;
        let label_count = list_files_with_extensions(&layout.labels_dir, &["txt"])
            .map(|v| v.len())
            .unwrap_or(0);
        info!("📷 Images found: {}", images.len());
        info!("🏷️ Labels found: {}", label_count);

        let mut report = ExpandReport {
            sources: images.len(),
            ..Default::default()
        };
        for image_path in &images {
            self.expand_one(image_path, &layout, &mut report)?;
        }

        info!("✅ 扩增完成: {:?}", report);
        info!("   图片: {}", layout.aug_images_dir.display());
        info!("   标注: {}", layout.aug_labels_dir.display());
        Ok(report)
    }

    fn expand_one(
        &mut self,
        image_path: &Path,
        layout: &DatasetLayout,
        report: &mut ExpandReport,
    ) -> Result<()> {
        let (Some(stem), Some(file_name), Some(ext)) = (
            image_path.file_stem().and_then(|s| s.to_str()),
            image_path.file_name(),
            image_path.extension().and_then(|s| s.to_str()),
        ) else {
            warn!("⚠️ 无效文件名, 跳过: {}", image_path.display());
            report.unreadable += 1;
            return Ok(());
        };

        let label_path = layout.labels_dir.join(format!("{}.txt", stem));
        if !label_path.is_file() {
            warn!("⚠️ 标注不存在, 跳过: {}", image_path.display());
            report.unmatched += 1;
            return Ok(());
        }

        let source = match load_sample(image_path, &label_path) {
            Ok(sample) => sample,
            Err(e) => {
                warn!("⚠️ 读取失败, 跳过 {}: {:#}", image_path.display(), e);
                report.unreadable += 1;
                return Ok(());
            }
        };

        // 原样复制
        let label_name = format!("{}.txt", stem);
        copy(image_path, &layout.aug_images_dir.join(file_name))?;
        copy(&label_path, &layout.aug_labels_dir.join(&label_name))?;
        report.copied += 1;

        for i in 0..self.config.multiplier {
            match self.pipeline.augment(&source) {
                AugmentOutcome::Augmented(sample) => {
                    let image_out = layout.aug_images_dir.join(format!("{}_aug{}.{}", stem, i, ext));
                    let label_out = layout.aug_labels_dir.join(format!("{}_aug{}.txt", stem, i));
                    sample
                        .image
                        .save(&image_out)
                        .with_context(|| format!("写入图片失败: {}", image_out.display()))?;
                    annotation::write(&label_out, &sample.boxes)?;
                    report.augmented += 1;
                }
                AugmentOutcome::SkippedEmpty => {
                    warn!("⚠️ 增强后没有剩余框, 跳过: {} 第{}次", image_path.display(), i);
                    report.skipped_empty += 1;
                }
                AugmentOutcome::Failed(reason) => {
                    warn!("⚠️ 增强失败 {} 第{}次: {}", image_path.display(), i, reason);
                    report.failed += 1;
                }
            }
        }
        Ok(())
    }
}

fn load_sample(image_path: &Path, label_path: &Path) -> Result<AnnotatedImage> {
    let image = image::open(image_path)
        .with_context(|| format!("无法解码图片: {}", image_path.display()))?
        .to_rgb8();
    let boxes = annotation::read(label_path)?;
    Ok(AnnotatedImage::new(image, boxes))
}

fn copy(from: &Path, to: &Path) -> Result<()> {
    fs::copy(from, to)
        .with_context(|| format!("复制失败: {} -> {}", from.display(), to.display()))?;
    Ok(())
}
