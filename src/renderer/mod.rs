// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 检测叠加渲染 (Detection Overlay Renderer)
///
/// 逐帧读取视频 → 旋转/平滑 → 获取检测 → 绘制 → 写入输出视频,
/// 可选在偶数帧后插入与上一帧的混合帧以提高输出帧率。
pub mod draw;
pub mod encoder;
pub mod preprocess;

pub use draw::{blend, class_color, draw_detections, label_text, LabelFont, PALETTE};
pub use encoder::{padded_size, EncoderSettings, FrameSink, VideoWriter};
pub use preprocess::{smooth, FrameRotation};

use std::path::{Path, PathBuf};

use anyhow::Result;
use image::RgbImage;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::detection::{ClassNames, DetectionSource};
use crate::input::{should_stop, VideoReader};

/// 叠加渲染配置
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    pub output: PathBuf,
    pub fps: f64,
    pub codec: String,
    pub rotation: FrameRotation,
    pub smooth_sigma: Option<f32>,
    pub interpolate: bool,
    pub font_path: Option<PathBuf>,
    pub font_size: f32,
    pub max_frames: Option<u64>,
    pub ffprobe: String,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            output: PathBuf::from("output_vertical_hq.mp4"),
            fps: 60.0,
            codec: "libx264".to_string(),
            rotation: FrameRotation::Clockwise90,
            smooth_sigma: Some(1.0),
            interpolate: true,
            font_path: None,
            font_size: 24.0,
            max_frames: None,
            ffprobe: "ffprobe".to_string(),
        }
    }
}

impl OverlayConfig {
    pub fn encoder_settings(&self) -> EncoderSettings {
        EncoderSettings {
            codec: self.codec.clone(),
            fps: self.fps,
        }
    }
}

/// 渲染统计
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OverlayReport {
    pub frames_read: u64,
    pub frames_written: u64,
}

/// 叠加渲染器
pub struct OverlayRenderer<S: DetectionSource> {
    config: OverlayConfig,
    source: S,
    names: ClassNames,
    font: Option<LabelFont>,
}

impl<S: DetectionSource> OverlayRenderer<S> {
    pub fn new(config: OverlayConfig, source: S, names: ClassNames) -> Self {
        let font = LabelFont::discover(config.font_path.as_deref(), config.font_size);
        Self::with_font(config, source, names, font)
    }

    pub fn with_font(
        config: OverlayConfig,
        source: S,
        names: ClassNames,
        font: Option<LabelFont>,
    ) -> Self {
        Self {
            config,
            source,
            names,
            font,
        }
    }

    pub fn config(&self) -> &OverlayConfig {
        &self.config
    }

    /// 处理单个视频文件
    pub fn run(&mut self, video: &Path) -> Result<OverlayReport> {
        let mut reader = VideoReader::open(&self.config.ffprobe, video)?;
        let settings = self.config.encoder_settings();
        let output = self.config.output.clone();

        let frames = std::iter::from_fn(|| reader.next_frame().transpose());
        let (report, writer) = self.render(frames, |w, h| {
            VideoWriter::create(&settings, &output, w, h)
        })?;
        if let Some(writer) = writer {
            let encoded = writer.finish()?;
            debug!("编码完成: {} 帧 → {}", encoded, output.display());
        }

        info!(
            "✅ 处理了 {} 帧: {} (输出 {} 帧)",
            report.frames_read,
            video.display(),
            report.frames_written
        );
        Ok(report)
    }

    /// 渲染帧序列; 输出在第一帧确定尺寸后才打开
    pub fn render<I, W, F>(&mut self, frames: I, open_sink: F) -> Result<(OverlayReport, Option<W>)>
    where
        I: Iterator<Item = Result<RgbImage>>,
        W: FrameSink,
        F: FnOnce(u32, u32) -> Result<W>,
    {
        let mut open_sink = Some(open_sink);
        let mut sink: Option<W> = None;
        let mut report = OverlayReport::default();
        let mut previous: Option<RgbImage> = None;

        for frame in frames {
            if should_stop() {
                info!("⏹️ 收到退出请求, 停止处理");
                break;
            }
            if self
                .config
                .max_frames
                .is_some_and(|max| report.frames_read >= max)
            {
                debug!("达到帧数上限: {}", report.frames_read);
                break;
            }

            let frame = frame?;
            let index = report.frames_read;
            report.frames_read += 1;

            let annotated = self.annotate(index, frame)?;

            if sink.is_none() {
                if let Some(open) = open_sink.take() {
                    let (w, h) = annotated.dimensions();
                    sink = Some(open(w, h)?);
                }
            }
            let Some(out) = sink.as_mut() else {
                break;
            };

            out.write_frame(&annotated)?;
            report.frames_written += 1;

            // 偶数帧后插入混合帧
            if self.config.interpolate && report.frames_read % 2 == 0 {
                if let Some(mixed) = previous.as_ref().and_then(|prev| blend(prev, &annotated)) {
                    out.write_frame(&mixed)?;
                    report.frames_written += 1;
                }
            }
            previous = Some(annotated);
        }

        Ok((report, sink))
    }

    /// 单帧处理: 检测 → 旋转 → 平滑 → 绘制
    fn annotate(&mut self, index: u64, frame: RgbImage) -> Result<RgbImage> {
        let (w, h) = frame.dimensions();
        let rotation = self.config.rotation;
        let detections: Vec<_> = self
            .source
            .detect(index, &frame)?
            .iter()
            .map(|det| rotation.apply_to_record(det, w, h))
            .collect();

        let mut frame = smooth(rotation.apply(frame), self.config.smooth_sigma);
        draw_detections(&mut frame, &detections, &self.names, self.font.as_ref());
        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::DetectionRecord;
    use image::Rgb;

    /// 每帧返回同一个检测框, 并记录调用次数
    struct FixedSource {
        calls: u64,
    }

    impl DetectionSource for FixedSource {
        fn detect(&mut self, _frame_index: u64, _frame: &RgbImage) -> Result<Vec<DetectionRecord>> {
            self.calls += 1;
            Ok(vec![DetectionRecord::new(2.0, 2.0, 10.0, 10.0, 0.9, 0)])
        }
    }

    fn renderer(config: OverlayConfig) -> OverlayRenderer<FixedSource> {
        OverlayRenderer::with_font(config, FixedSource { calls: 0 }, ClassNames::default(), None)
    }

    fn frames(n: usize, w: u32, h: u32) -> impl Iterator<Item = Result<RgbImage>> {
        (0..n).map(move |i| Ok(RgbImage::from_pixel(w, h, Rgb([i as u8 * 40, 0, 0]))))
    }

    fn plain_config() -> OverlayConfig {
        OverlayConfig {
            rotation: FrameRotation::None,
            smooth_sigma: None,
            ..Default::default()
        }
    }

    #[test]
    fn test_interpolation_every_other_frame() {
        let mut r = renderer(plain_config());
        let (report, sink) = r
            .render(frames(5, 40, 30), |_, _| Ok(Vec::<RgbImage>::new()))
            .unwrap();
        // 5帧读入, 第2和第4帧后各插入一帧
        assert_eq!(report, OverlayReport { frames_read: 5, frames_written: 7 });
        let sink = sink.unwrap();
        assert_eq!(sink.len(), 7);
        // 插入帧是前后两帧的平均
        assert_eq!(sink[2].get_pixel(39, 29).0, [20, 0, 0]);
        assert_eq!(r.source.calls, 5);
    }

    #[test]
    fn test_no_interpolation_and_max_frames() {
        let mut r = renderer(OverlayConfig {
            interpolate: false,
            max_frames: Some(3),
            ..plain_config()
        });
        let (report, sink) = r
            .render(frames(10, 40, 30), |_, _| Ok(Vec::<RgbImage>::new()))
            .unwrap();
        assert_eq!(report, OverlayReport { frames_read: 3, frames_written: 3 });
        assert_eq!(sink.unwrap().len(), 3);
    }

    #[test]
    fn test_sink_opened_with_rotated_size() {
        let mut r = renderer(OverlayConfig {
            rotation: FrameRotation::Clockwise90,
            smooth_sigma: None,
            ..Default::default()
        });
        let mut opened = None;
        let (_, sink) = r
            .render(frames(2, 40, 30), |w, h| {
                opened = Some((w, h));
                Ok(Vec::<RgbImage>::new())
            })
            .unwrap();
        assert_eq!(opened, Some((30, 40)));
        assert!(sink.unwrap().iter().all(|f| f.dimensions() == (30, 40)));
    }

    #[test]
    fn test_empty_stream_opens_nothing() {
        let mut r = renderer(plain_config());
        let (report, sink) = r
            .render(frames(0, 4, 4), |_, _| Ok(Vec::<RgbImage>::new()))
            .unwrap();
        assert_eq!(report, OverlayReport::default());
        assert!(sink.is_none());
    }
}
