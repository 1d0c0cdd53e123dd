// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 光度变换阶段: 只修改像素, 不影响边界框

use rand::rngs::StdRng;
use rand::Rng;

use super::{
    uniform, AnnotatedImage, AugmentError, BrightnessContrastParams, HsvParams, NoiseParams, Stage,
};

/// 随机亮度/对比度: `out = in * (1 + contrast) + brightness * 255`
#[derive(Debug, Clone)]
pub struct BrightnessContrast {
    pub params: BrightnessContrastParams,
}

impl BrightnessContrast {
    pub fn adjust(sample: &mut AnnotatedImage, alpha: f32, beta: f32) {
        for pixel in sample.image.pixels_mut() {
            for c in pixel.0.iter_mut() {
                *c = (*c as f32 * alpha + beta).round().clamp(0.0, 255.0) as u8;
            }
        }
    }
}

impl Stage for BrightnessContrast {
    fn name(&self) -> &'static str {
        "brightness_contrast"
    }

    fn probability(&self) -> f32 {
        self.params.p
    }

    fn apply(&self, sample: &mut AnnotatedImage, rng: &mut StdRng) -> Result<(), AugmentError> {
        let p = &self.params;
        let alpha = 1.0 + uniform(rng, -p.contrast_limit, p.contrast_limit);
        let beta = uniform(rng, -p.brightness_limit, p.brightness_limit) * 255.0;
        Self::adjust(sample, alpha, beta);
        Ok(())
    }
}

/// 随机色调/饱和度/明度偏移
#[derive(Debug, Clone)]
pub struct HueSaturationValue {
    pub params: HsvParams,
}

impl HueSaturationValue {
    /// 色调偏移单位为半度 (OpenCV 8位HSV约定, 一圈=180)
    pub fn shift(sample: &mut AnnotatedImage, hue: f32, sat: f32, val: f32) {
        for pixel in sample.image.pixels_mut() {
            let [r, g, b] = pixel.0;
            let (h, s, v) = rgb_to_hsv(r, g, b);
            let h = (h + hue * 2.0).rem_euclid(360.0);
            let s = (s + sat).clamp(0.0, 255.0);
            let v = (v + val).clamp(0.0, 255.0);
            pixel.0 = hsv_to_rgb(h, s, v);
        }
    }
}

impl Stage for HueSaturationValue {
    fn name(&self) -> &'static str {
        "hue_saturation_value"
    }

    fn probability(&self) -> f32 {
        self.params.p
    }

    fn apply(&self, sample: &mut AnnotatedImage, rng: &mut StdRng) -> Result<(), AugmentError> {
        let p = &self.params;
        let hue = uniform(rng, -p.hue_shift_limit, p.hue_shift_limit);
        let sat = uniform(rng, -p.sat_shift_limit, p.sat_shift_limit);
        let val = uniform(rng, -p.val_shift_limit, p.val_shift_limit);
        Self::shift(sample, hue, sat, val);
        Ok(())
    }
}

/// 加性高斯噪声, 方差在 [var_min, var_max] 内采样
#[derive(Debug, Clone)]
pub struct GaussNoise {
    pub params: NoiseParams,
}

impl Stage for GaussNoise {
    fn name(&self) -> &'static str {
        "gauss_noise"
    }

    fn probability(&self) -> f32 {
        self.params.p
    }

    fn apply(&self, sample: &mut AnnotatedImage, rng: &mut StdRng) -> Result<(), AugmentError> {
        let var = uniform(rng, self.params.var_min, self.params.var_max);
        let sigma = var.max(0.0).sqrt();
        for pixel in sample.image.pixels_mut() {
            for c in pixel.0.iter_mut() {
                let noisy = *c as f32 + standard_normal(rng) * sigma;
                *c = noisy.round().clamp(0.0, 255.0) as u8;
            }
        }
        Ok(())
    }
}

/// Box-Muller 标准正态采样
fn standard_normal(rng: &mut StdRng) -> f32 {
    let u1: f32 = rng.gen::<f32>().max(f32::MIN_POSITIVE);
    let u2: f32 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (std::f32::consts::TAU * u2).cos()
}

/// RGB → HSV, h ∈ [0,360), s/v ∈ [0,255]
pub fn rgb_to_hsv(r: u8, g: u8, b: u8) -> (f32, f32, f32) {
    let (r, g, b) = (r as f32, g as f32, b as f32);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let h = if delta == 0.0 {
        0.0
    } else if max == r {
        60.0 * ((g - b) / delta).rem_euclid(6.0)
    } else if max == g {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };
    let s = if max == 0.0 { 0.0 } else { delta / max * 255.0 };
    (h, s, max)
}

/// HSV → RGB
pub fn hsv_to_rgb(h: f32, s: f32, v: f32) -> [u8; 3] {
    let s = s / 255.0;
    let c = v * s;
    let hp = h.rem_euclid(360.0) / 60.0;
    let x = c * (1.0 - (hp.rem_euclid(2.0) - 1.0).abs());
    let (r, g, b) = match hp as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let m = v - c;
    let to_u8 = |f: f32| (f + m).round().clamp(0.0, 255.0) as u8;
    [to_u8(r), to_u8(g), to_u8(b)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::BoundingBox;
    use image::{Rgb, RgbImage};
    use rand::SeedableRng;

    fn solid(rgb: [u8; 3]) -> AnnotatedImage {
        AnnotatedImage::new(
            RgbImage::from_pixel(8, 8, Rgb(rgb)),
            vec![BoundingBox::new(0, 0.5, 0.5, 0.5, 0.5)],
        )
    }

    #[test]
    fn test_hsv_round_trip() {
        for rgb in [[255, 0, 0], [12, 200, 99], [0, 0, 0], [255, 255, 255], [40, 40, 90]] {
            let (h, s, v) = rgb_to_hsv(rgb[0], rgb[1], rgb[2]);
            let back = hsv_to_rgb(h, s, v);
            for c in 0..3 {
                assert!((back[c] as i32 - rgb[c] as i32).abs() <= 1, "{rgb:?} -> {back:?}");
            }
        }
    }

    #[test]
    fn test_hue_shift_red_towards_yellow() {
        let mut sample = solid([255, 0, 0]);
        // +30 半度 = +60 度, 红色变为黄色
        HueSaturationValue::shift(&mut sample, 30.0, 0.0, 0.0);
        assert_eq!(*sample.image.get_pixel(0, 0), Rgb([255, 255, 0]));
    }

    #[test]
    fn test_brightness_contrast_clamps() {
        let mut sample = solid([100, 200, 250]);
        BrightnessContrast::adjust(&mut sample, 1.2, 10.0);
        assert_eq!(*sample.image.get_pixel(3, 3), Rgb([130, 250, 255]));
    }

    #[test]
    fn test_photometric_stages_keep_boxes() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut sample = solid([120, 120, 120]);
        let boxes = sample.boxes.clone();
        let stages: Vec<Box<dyn Stage>> = vec![
            Box::new(BrightnessContrast {
                params: BrightnessContrastParams::default(),
            }),
            Box::new(HueSaturationValue {
                params: HsvParams::default(),
            }),
            Box::new(GaussNoise {
                params: NoiseParams::default(),
            }),
        ];
        for stage in &stages {
            stage.apply(&mut sample, &mut rng).unwrap();
        }
        assert_eq!(sample.boxes, boxes);
        assert_eq!(sample.image.dimensions(), (8, 8));
    }

    #[test]
    fn test_noise_changes_pixels() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut sample = solid([128, 128, 128]);
        let stage = GaussNoise {
            params: NoiseParams {
                p: 1.0,
                var_min: 50.0,
                var_max: 50.0,
            },
        };
        stage.apply(&mut sample, &mut rng).unwrap();
        let changed = sample
            .image
            .pixels()
            .filter(|p| p.0 != [128, 128, 128])
            .count();
        assert!(changed > 0);
    }
}
