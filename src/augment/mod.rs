// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 数据增强流水线
///
/// # 架构说明
///
/// 固定顺序的五个阶段, 每个阶段独立按概率触发:
/// ```text
/// 水平翻转(0.5) → 仿射变换(0.7) → 亮度/对比度(0.5) → HSV抖动(0.5) → 高斯噪声(0.3)
/// ```
/// - 几何阶段 (翻转/仿射) 同步变换边界框, 离开画面的框被截断或丢弃
/// - 光度阶段只修改像素
///
/// 单次增强的结果用 [`AugmentOutcome`] 表示, 失败不会中断整个批次,
/// 由调用方统计跳过/失败次数。
pub mod geometric;
pub mod photometric;

use image::RgbImage;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::annotation::BoundingBox;

pub use geometric::{remap_boxes, Affine, HorizontalFlip};
pub use photometric::{BrightnessContrast, GaussNoise, HueSaturationValue};

/// 带标注的图像: 一张图 + 有序的边界框列表
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotatedImage {
    pub image: RgbImage,
    pub boxes: Vec<BoundingBox>,
}

impl AnnotatedImage {
    pub fn new(image: RgbImage, boxes: Vec<BoundingBox>) -> Self {
        Self { image, boxes }
    }
}

/// 增强阶段错误
#[derive(Debug, thiserror::Error)]
pub enum AugmentError {
    #[error("图像为空 ({width}x{height})")]
    EmptyImage { width: u32, height: u32 },
    #[error("仿射矩阵不可逆")]
    SingularTransform,
}

/// 单次增强结果
#[derive(Debug, Clone, PartialEq)]
pub enum AugmentOutcome {
    /// 成功, 且至少保留一个框
    Augmented(AnnotatedImage),
    /// 成功, 但所有框都被移出画面, 结果丢弃
    SkippedEmpty,
    /// 某个阶段失败
    Failed(String),
}

/// 增强阶段接口
pub trait Stage {
    /// 阶段名称 (用于日志)
    fn name(&self) -> &'static str;

    /// 触发概率 [0,1]
    fn probability(&self) -> f32;

    /// 在样本上原地应用变换
    fn apply(&self, sample: &mut AnnotatedImage, rng: &mut StdRng) -> Result<(), AugmentError>;
}

/// 仿射参数 (对应原始脚本的 Affine 配置)
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AffineParams {
    pub p: f32,
    pub translate_percent: f32, // 平移比例 ±
    pub scale_min: f32,
    pub scale_max: f32,
    pub rotate_degrees: f32, // 旋转角度 ±
    pub shear_degrees: f32,  // 错切角度 ±
    pub border_value: u8,    // 边界填充值
}

impl Default for AffineParams {
    fn default() -> Self {
        Self {
            p: 0.7,
            translate_percent: 0.1,
            scale_min: 0.9,
            scale_max: 1.1,
            rotate_degrees: 15.0,
            shear_degrees: 10.0,
            border_value: 0,
        }
    }
}

/// 亮度/对比度参数
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct BrightnessContrastParams {
    pub p: f32,
    pub brightness_limit: f32,
    pub contrast_limit: f32,
}

impl Default for BrightnessContrastParams {
    fn default() -> Self {
        Self {
            p: 0.5,
            brightness_limit: 0.2,
            contrast_limit: 0.2,
        }
    }
}

/// HSV抖动参数 (色调单位为半度, 与OpenCV一致)
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct HsvParams {
    pub p: f32,
    pub hue_shift_limit: f32,
    pub sat_shift_limit: f32,
    pub val_shift_limit: f32,
}

impl Default for HsvParams {
    fn default() -> Self {
        Self {
            p: 0.5,
            hue_shift_limit: 15.0,
            sat_shift_limit: 25.0,
            val_shift_limit: 15.0,
        }
    }
}

/// 高斯噪声参数 (方差范围, 像素值尺度 0-255)
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseParams {
    pub p: f32,
    pub var_min: f32,
    pub var_max: f32,
}

impl Default for NoiseParams {
    fn default() -> Self {
        Self {
            p: 0.3,
            var_min: 10.0,
            var_max: 50.0,
        }
    }
}

/// 增强流水线配置
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AugmentConfig {
    pub hflip_p: f32,
    pub affine: AffineParams,
    pub brightness_contrast: BrightnessContrastParams,
    pub hsv: HsvParams,
    pub noise: NoiseParams,
    /// 几何变换后框的最小可见比例, 低于该值丢弃
    pub min_visibility: f32,
    /// 随机种子, None 表示每次运行不同
    pub seed: Option<u64>,
}

impl Default for AugmentConfig {
    fn default() -> Self {
        Self {
            hflip_p: 0.5,
            affine: AffineParams::default(),
            brightness_contrast: BrightnessContrastParams::default(),
            hsv: HsvParams::default(),
            noise: NoiseParams::default(),
            min_visibility: 0.0,
            seed: None,
        }
    }
}

/// 增强流水线
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
    rng: StdRng,
}

impl Pipeline {
    /// 按配置构建固定顺序的五阶段流水线
    pub fn new(config: &AugmentConfig) -> Self {
        let stages: Vec<Box<dyn Stage>> = vec![
            Box::new(HorizontalFlip { p: config.hflip_p }),
            Box::new(Affine {
                params: config.affine.clone(),
                min_visibility: config.min_visibility,
            }),
            Box::new(BrightnessContrast {
                params: config.brightness_contrast.clone(),
            }),
            Box::new(HueSaturationValue {
                params: config.hsv.clone(),
            }),
            Box::new(GaussNoise {
                params: config.noise.clone(),
            }),
        ];
        Self::with_stages(stages, config.seed)
    }

    /// 自定义阶段列表 (测试或特殊用途)
    pub fn with_stages(stages: Vec<Box<dyn Stage>>, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { stages, rng }
    }

    /// 阶段名称列表 (按执行顺序)
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// 对一个样本执行一次增强, 输入保持不变
    pub fn augment(&mut self, input: &AnnotatedImage) -> AugmentOutcome {
        let (width, height) = input.image.dimensions();
        if width == 0 || height == 0 {
            return AugmentOutcome::Failed(AugmentError::EmptyImage { width, height }.to_string());
        }

        let mut sample = input.clone();
        for stage in &self.stages {
            // 每个阶段的概率门独立判定
            let roll: f32 = self.rng.gen();
            if roll >= stage.probability() {
                continue;
            }
            if let Err(e) = stage.apply(&mut sample, &mut self.rng) {
                return AugmentOutcome::Failed(format!("{}: {}", stage.name(), e));
            }
        }

        sample.boxes.retain(BoundingBox::is_valid);
        if sample.boxes.is_empty() {
            AugmentOutcome::SkippedEmpty
        } else {
            AugmentOutcome::Augmented(sample)
        }
    }
}

/// 在 [lo, hi] 内均匀采样, 区间退化时返回 lo
pub(crate) fn uniform(rng: &mut StdRng, lo: f32, hi: f32) -> f32 {
    if hi > lo {
        rng.gen_range(lo..=hi)
    } else {
        lo
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn sample() -> AnnotatedImage {
        let mut image = RgbImage::from_pixel(64, 48, Rgb([90, 120, 150]));
        for x in 20..40 {
            for y in 10..30 {
                image.put_pixel(x, y, Rgb([200, 30, 30]));
            }
        }
        AnnotatedImage::new(
            image,
            vec![
                BoundingBox::new(0, 0.47, 0.42, 0.31, 0.42),
                BoundingBox::new(2, 0.2, 0.7, 0.1, 0.1),
            ],
        )
    }

    struct Failing;

    impl Stage for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }
        fn probability(&self) -> f32 {
            1.0
        }
        fn apply(&self, _: &mut AnnotatedImage, _: &mut StdRng) -> Result<(), AugmentError> {
            Err(AugmentError::SingularTransform)
        }
    }

    struct DropAll;

    impl Stage for DropAll {
        fn name(&self) -> &'static str {
            "drop_all"
        }
        fn probability(&self) -> f32 {
            1.0
        }
        fn apply(&self, s: &mut AnnotatedImage, _: &mut StdRng) -> Result<(), AugmentError> {
            s.boxes.clear();
            Ok(())
        }
    }

    #[test]
    fn test_fixed_stage_order() {
        let pipeline = Pipeline::new(&AugmentConfig::default());
        assert_eq!(
            pipeline.stage_names(),
            vec![
                "horizontal_flip",
                "affine",
                "brightness_contrast",
                "hue_saturation_value",
                "gauss_noise"
            ]
        );
    }

    #[test]
    fn test_same_seed_same_output() {
        let config = AugmentConfig {
            seed: Some(42),
            ..Default::default()
        };
        let input = sample();
        let mut a = Pipeline::new(&config);
        let mut b = Pipeline::new(&config);
        for _ in 0..5 {
            assert_eq!(a.augment(&input), b.augment(&input));
        }
    }

    #[test]
    fn test_input_not_mutated() {
        let input = sample();
        let copy = input.clone();
        let mut pipeline = Pipeline::new(&AugmentConfig {
            seed: Some(7),
            ..Default::default()
        });
        for _ in 0..5 {
            let _ = pipeline.augment(&input);
        }
        assert_eq!(input, copy);
    }

    #[test]
    fn test_retained_boxes_inside_frame() {
        let mut pipeline = Pipeline::new(&AugmentConfig {
            seed: Some(3),
            ..Default::default()
        });
        let input = sample();
        for _ in 0..30 {
            if let AugmentOutcome::Augmented(out) = pipeline.augment(&input) {
                assert_eq!(out.image.dimensions(), input.image.dimensions());
                for b in &out.boxes {
                    assert!((0.0..=1.0).contains(&b.x_center));
                    assert!((0.0..=1.0).contains(&b.y_center));
                    assert!(b.width > 0.0 && b.width <= 1.0);
                    assert!(b.height > 0.0 && b.height <= 1.0);
                }
            }
        }
    }

    #[test]
    fn test_stage_failure_is_reported() {
        let mut pipeline = Pipeline::with_stages(vec![Box::new(Failing)], Some(1));
        match pipeline.augment(&sample()) {
            AugmentOutcome::Failed(reason) => assert!(reason.starts_with("failing")),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_empty_boxes_skipped() {
        let mut pipeline = Pipeline::with_stages(vec![Box::new(DropAll)], Some(1));
        assert_eq!(pipeline.augment(&sample()), AugmentOutcome::SkippedEmpty);
    }

    #[test]
    fn test_empty_image_fails() {
        let mut pipeline = Pipeline::new(&AugmentConfig::default());
        let input = AnnotatedImage::new(RgbImage::new(0, 0), vec![]);
        assert!(matches!(pipeline.augment(&input), AugmentOutcome::Failed(_)));
    }

    #[test]
    fn test_zero_probability_is_identity() {
        let config = AugmentConfig {
            hflip_p: 0.0,
            affine: AffineParams {
                p: 0.0,
                ..Default::default()
            },
            brightness_contrast: BrightnessContrastParams {
                p: 0.0,
                ..Default::default()
            },
            hsv: HsvParams {
                p: 0.0,
                ..Default::default()
            },
            noise: NoiseParams {
                p: 0.0,
                ..Default::default()
            },
            seed: Some(9),
            ..Default::default()
        };
        let input = sample();
        let mut pipeline = Pipeline::new(&config);
        assert_eq!(pipeline.augment(&input), AugmentOutcome::Augmented(input));
    }
}
