// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 视频抽帧
///
/// 对目录中每个匹配扩展名的视频调用一次 ffmpeg, 按固定帧率输出
/// `<stem>_%04d.<ext>` 编号图片。ffmpeg 非零退出视为致命错误。
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::probe::probe_video;
use crate::external::run_checked;
use crate::utils::fs::{file_stem, list_files_with_extensions};

/// 抽帧配置
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub fps: u32,
    pub extensions: Vec<String>, // 视频扩展名 (不区分大小写)
    pub image_ext: String,
    pub ffmpeg: String,
    pub ffprobe: String,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("data/videos"),
            output_dir: PathBuf::from("data/raw_frames"),
            fps: 1,
            extensions: vec!["MOV".to_string()],
            image_ext: "jpg".to_string(),
            ffmpeg: "ffmpeg".to_string(),
            ffprobe: "ffprobe".to_string(),
        }
    }
}

/// 按时长和采样率计算应输出的帧数
///
/// 采样时刻为 0, 1/fps, 2/fps, ... 且严格小于时长。
pub fn expected_frame_count(duration_secs: f64, fps: u32) -> u64 {
    let n = duration_secs * fps as f64;
    if !n.is_finite() || n <= 0.0 {
        return 0;
    }
    (n - 1e-6).ceil().max(0.0) as u64
}

/// 抽帧器
pub struct FrameExtractor {
    config: ExtractConfig,
}

impl FrameExtractor {
    pub fn new(config: ExtractConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExtractConfig {
        &self.config
    }

    /// 处理输入目录中的全部视频, 返回已处理的视频列表
    pub fn run(&self) -> Result<Vec<PathBuf>> {
        let videos = list_files_with_extensions(&self.config.input_dir, &self.config.extensions)
            .with_context(|| format!("读取视频目录失败: {}", self.config.input_dir.display()))?;
        info!(
            "📹 找到 {} 个视频: {}",
            videos.len(),
            self.config.input_dir.display()
        );

        for video in &videos {
            self.extract_video(video)?;
        }
        Ok(videos)
    }

    /// 对单个视频抽帧
    pub fn extract_video(&self, video: &Path) -> Result<()> {
        fs::create_dir_all(&self.config.output_dir).with_context(|| {
            format!("创建输出目录失败: {}", self.config.output_dir.display())
        })?;

        // 时长已知时限定输出帧数, 避免解码器在末尾多取一帧
        let frame_cap = match probe_video(&self.config.ffprobe, video) {
            Ok(info) => info
                .duration
                .map(|d| expected_frame_count(d, self.config.fps)),
            Err(e) => {
                warn!("⚠️ 无法获取视频时长 {}: {}", video.display(), e);
                None
            }
        };

        let mut cmd = self.build_command(video, frame_cap)?;
        run_checked(&mut cmd).with_context(|| format!("抽帧失败: {}", video.display()))?;

        let name = video.file_name().unwrap_or_default().to_string_lossy();
        info!("✅ Extracted from {}", name);
        Ok(())
    }

    /// 构造 ffmpeg 命令
    pub fn build_command(&self, video: &Path, frame_cap: Option<u64>) -> Result<Command> {
        let stem = file_stem(video)
            .with_context(|| format!("无效的视频文件名: {}", video.display()))?;
        let pattern = self
            .config
            .output_dir
            .join(format!("{}_%04d.{}", stem, self.config.image_ext));

        let mut cmd = Command::new(&self.config.ffmpeg);
        cmd.args(["-hide_banner", "-loglevel", "error", "-y", "-i"])
            .arg(video)
            .arg("-vf")
            .arg(format!("fps={}", self.config.fps));
        if let Some(n) = frame_cap {
            cmd.arg("-frames:v").arg(n.to_string());
        }
        cmd.arg(pattern);
        Ok(cmd)
    }
}
