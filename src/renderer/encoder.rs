// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 视频编码输出: RGB24 帧经读回调送入 ez-ffmpeg 编码
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use crossbeam_channel::{Receiver, Sender};
use ez_ffmpeg::core::scheduler::ffmpeg_scheduler::{FfmpegScheduler, Running};
use ez_ffmpeg::{FfmpegContext, Input, Output};
use image::RgbImage;
use tracing::{info, warn};

/// FFmpeg 的 AVERROR_EOF (FFERRTAG('E','O','F',' '))
const AVERROR_EOF: i32 = -0x2046_4F45;

/// 编码线程与写入方之间的缓冲帧数
const FRAME_QUEUE: usize = 8;

/// 奇数尺寸补齐到偶数后转 yuv420p (libx264 要求宽高为偶数)
pub const EVEN_YUV420P: &str = "pad=ceil(iw/2)*2:ceil(ih/2)*2,format=yuv420p";

/// 帧输出接口
pub trait FrameSink {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<()>;
}

impl FrameSink for Vec<RgbImage> {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<()> {
        self.push(frame.clone());
        Ok(())
    }
}

/// 编码参数
#[derive(Clone, Debug)]
pub struct EncoderSettings {
    pub codec: String,
    pub fps: f64,
}

/// 编码输出尺寸: 宽高向上补齐为偶数
pub fn padded_size(width: u32, height: u32) -> (u32, u32) {
    (width + width % 2, height + height % 2)
}

/// rawvideo 读回调: 把通道里的整帧字节按需切给解复用器
pub struct RawFeed {
    rx: Receiver<Vec<u8>>,
    chunk: Vec<u8>,
    pos: usize,
}

impl RawFeed {
    pub fn new(rx: Receiver<Vec<u8>>) -> Self {
        Self {
            rx,
            chunk: Vec::new(),
            pos: 0,
        }
    }

    /// 填充 buf, 返回字节数; 写入方关闭且数据读完时返回 AVERROR_EOF
    pub fn read(&mut self, buf: &mut [u8]) -> i32 {
        while self.pos >= self.chunk.len() {
            match self.rx.recv() {
                Ok(chunk) => {
                    self.chunk = chunk;
                    self.pos = 0;
                }
                Err(_) => return AVERROR_EOF,
            }
        }
        let n = (self.chunk.len() - self.pos)
            .min(buf.len())
            .min(i32::MAX as usize);
        buf[..n].copy_from_slice(&self.chunk[self.pos..self.pos + n]);
        self.pos += n;
        n as i32
    }
}

/// 视频编码器: 帧经有界通道交给后台编码线程
pub struct VideoWriter {
    frames: Option<Sender<Vec<u8>>>,
    scheduler: Option<FfmpegScheduler<Running>>,
    path: PathBuf,
    width: u32,
    height: u32,
    frames_written: u64,
}

impl VideoWriter {
    /// 以固定尺寸创建输出视频; 奇数宽高在编码前补齐
    pub fn create(settings: &EncoderSettings, path: &Path, width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            bail!("输出尺寸无效: {}x{}", width, height);
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("创建输出目录失败: {}", parent.display()))?;
        }

        let (tx, rx) = crossbeam_channel::bounded(FRAME_QUEUE);
        let mut feed = RawFeed::new(rx);
        let input = Input::new_by_read_callback(move |buf: &mut [u8]| feed.read(buf))
            .set_format("rawvideo")
            .set_input_opts(
                [
                    ("pixel_format".to_string(), "rgb24".to_string()),
                    ("video_size".to_string(), format!("{}x{}", width, height)),
                    ("framerate".to_string(), settings.fps.to_string()),
                ]
                .into(),
            );
        let url = path.to_string_lossy().into_owned();
        let output = Output::from(url.as_str()).set_video_codec(settings.codec.as_str());

        let ctx = FfmpegContext::builder()
            .input(input)
            .filter_descs([EVEN_YUV420P].into())
            .output(output)
            .build()
            .map_err(|e| anyhow!("构建编码器失败 {}: {}", path.display(), e))?;
        let scheduler = ctx
            .start()
            .map_err(|e| anyhow!("启动编码器失败 {}: {}", path.display(), e))?;

        let (out_w, out_h) = padded_size(width, height);
        if (out_w, out_h) != (width, height) {
            warn!("⚠️ 奇数尺寸 {}x{} 补齐为 {}x{}", width, height, out_w, out_h);
        }
        info!(
            "💾 输出视频: {} ({}x{} @ {} fps, {})",
            path.display(),
            out_w,
            out_h,
            settings.fps,
            settings.codec
        );
        Ok(Self {
            frames: Some(tx),
            scheduler: Some(scheduler),
            path: path.to_path_buf(),
            width,
            height,
            frames_written: 0,
        })
    }

    /// 关闭输入并等待编码完成, 返回写入的帧数
    pub fn finish(mut self) -> Result<u64> {
        drop(self.frames.take());
        if let Some(scheduler) = self.scheduler.take() {
            scheduler
                .wait()
                .map_err(|e| anyhow!("编码失败 {}: {}", self.path.display(), e))?;
        }
        Ok(self.frames_written)
    }
}

impl FrameSink for VideoWriter {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<()> {
        if frame.dimensions() != (self.width, self.height) {
            bail!(
                "帧尺寸 {:?} 与输出尺寸 {}x{} 不一致",
                frame.dimensions(),
                self.width,
                self.height
            );
        }
        let tx = self.frames.as_ref().ok_or_else(|| anyhow!("编码器已关闭"))?;
        tx.send(frame.as_raw().clone())
            .map_err(|_| anyhow!("编码线程已退出: {}", self.path.display()))?;
        self.frames_written += 1;
        Ok(())
    }
}

impl Drop for VideoWriter {
    fn drop(&mut self) {
        // 出错提前退出: 关闭输入让编码器收尾
        drop(self.frames.take());
        if let Some(scheduler) = self.scheduler.take() {
            if let Err(e) = scheduler.wait() {
                warn!("⚠️ 编码器收尾失败: {}", e);
            }
        }
    }
}
