// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 视频文件顺序解码器
/// Sequential video file decoder (ez-ffmpeg frame pipeline → RGB24 frames)
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use crossbeam_channel::{Receiver, Sender};
use ez_ffmpeg::core::context::null_output::create_null_output;
use ez_ffmpeg::core::scheduler::ffmpeg_scheduler::{FfmpegScheduler, Running};
use ez_ffmpeg::filter::frame_filter::FrameFilter;
use ez_ffmpeg::filter::frame_filter_context::FrameFilterContext;
use ez_ffmpeg::filter::frame_pipeline_builder::FramePipelineBuilder;
use ez_ffmpeg::{AVMediaType, FfmpegContext, Frame, Input};
use image::RgbImage;
use tracing::{debug, info};

use super::probe::{probe_video, VideoInfo};

/// 解码线程与读取方之间的缓冲帧数
const FRAME_QUEUE: usize = 8;

/// 按行拷贝 RGB24 平面, 去掉每行末尾的对齐填充
pub fn rgb_from_plane(plane: &[u8], stride: usize, width: u32, height: u32) -> Option<RgbImage> {
    if width == 0 || height == 0 {
        return None;
    }
    let row = width as usize * 3;
    let needed = stride.checked_mul(height as usize - 1)?.checked_add(row)?;
    if stride < row || plane.len() < needed {
        return None;
    }
    let mut data = Vec::with_capacity(row * height as usize);
    for y in 0..height as usize {
        let start = y * stride;
        data.extend_from_slice(&plane[start..start + row]);
    }
    RgbImage::from_raw(width, height, data)
}

/// 解码过滤器: RGB24 帧 → RgbImage → 通道
struct RgbCollector {
    tx: Sender<RgbImage>,
}

impl FrameFilter for RgbCollector {
    fn media_type(&self) -> AVMediaType {
        AVMediaType::AVMEDIA_TYPE_VIDEO
    }

    fn init(&mut self, _ctx: &FrameFilterContext) -> Result<(), String> {
        debug!("解码线程启动");
        Ok(())
    }

    fn filter_frame(
        &mut self,
        frame: Frame,
        _ctx: &FrameFilterContext,
    ) -> Result<Option<Frame>, String> {
        let image = unsafe {
            if frame.as_ptr().is_null() || frame.is_empty() {
                return Ok(Some(frame));
            }
            let w = (*frame.as_ptr()).width;
            let h = (*frame.as_ptr()).height;
            let stride = (*frame.as_ptr()).linesize[0];
            let data = (*frame.as_ptr()).data[0];
            if w <= 0 || h <= 0 || stride <= 0 || data.is_null() {
                return Err(format!("无效帧: {}x{} stride={}", w, h, stride));
            }
            let (w, h, stride) = (w as u32, h as u32, stride as usize);
            let len = stride * (h as usize - 1) + w as usize * 3;
            let plane = std::slice::from_raw_parts(data, len);
            rgb_from_plane(plane, stride, w, h)
                .ok_or_else(|| format!("RGB24 帧数据不完整: {}x{}", w, h))?
        };

        // 读取方已关闭 (提前结束): 中止解码
        self.tx
            .send(image)
            .map_err(|_| "读取方已关闭".to_string())?;
        Ok(Some(frame))
    }

    fn uninit(&mut self, _ctx: &FrameFilterContext) {
        debug!("解码线程退出");
    }
}

/// 视频解码器: 后台解码线程经有界通道逐帧交付 RGB 图像
pub struct VideoReader {
    frames: Receiver<RgbImage>,
    scheduler: Option<FfmpegScheduler<Running>>,
    info: VideoInfo,
    frames_read: u64,
}

impl VideoReader {
    /// 打开视频文件并启动解码
    pub fn open(ffprobe: &str, path: &Path) -> Result<Self> {
        let info = probe_video(ffprobe, path)
            .with_context(|| format!("探测视频失败: {}", path.display()))?;

        let (tx, rx) = crossbeam_channel::bounded(FRAME_QUEUE);
        let pipe: FramePipelineBuilder = AVMediaType::AVMEDIA_TYPE_VIDEO.into();
        let pipe = pipe.filter("collect", Box::new(RgbCollector { tx }));
        let out = create_null_output().add_frame_pipeline(pipe);

        let url = path.to_string_lossy().into_owned();
        let ctx = FfmpegContext::builder()
            .input(Input::new(url.as_str()))
            .filter_descs(["format=rgb24"].into())
            .output(out)
            .build()
            .map_err(|e| anyhow!("构建解码器失败 {}: {}", path.display(), e))?;
        let scheduler = ctx
            .start()
            .map_err(|e| anyhow!("启动解码器失败 {}: {}", path.display(), e))?;

        info!(
            "🎬 视频解码器启动: {} ({}x{}, fps={:?})",
            path.display(),
            info.width,
            info.height,
            info.fps
        );

        Ok(Self {
            frames: rx,
            scheduler: Some(scheduler),
            info,
            frames_read: 0,
        })
    }

    pub fn info(&self) -> &VideoInfo {
        &self.info
    }

    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }

    /// 读取下一帧; 流结束时检查解码结果
    pub fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        match self.frames.recv() {
            Ok(frame) => {
                self.frames_read += 1;
                Ok(Some(frame))
            }
            Err(_) => {
                if let Some(scheduler) = self.scheduler.take() {
                    scheduler
                        .wait()
                        .map_err(|e| anyhow!("解码失败 (已读 {} 帧): {}", self.frames_read, e))?;
                    debug!("解码结束: {} 帧", self.frames_read);
                }
                Ok(None)
            }
        }
    }
}

impl Drop for VideoReader {
    fn drop(&mut self) {
        if let Some(scheduler) = self.scheduler.take() {
            // 提前结束 (退出信号/帧数上限): 先断开通道唤醒解码线程, 再中止
            drop(std::mem::replace(&mut self.frames, crossbeam_channel::never()));
            scheduler.abort();
        }
    }
}
