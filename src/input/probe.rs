// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// ffprobe 视频信息探测
use std::path::Path;
use std::process::Command;

use crate::external::{capture_stdout, ExternalError};

/// 视频流基本信息
#[derive(Debug, Clone, PartialEq)]
pub struct VideoInfo {
    pub width: u32,
    pub height: u32,
    pub fps: Option<f64>,
    pub duration: Option<f64>, // 秒
}

/// 探测视频第一个视频流的尺寸、帧率和时长
pub fn probe_video(ffprobe: &str, path: &Path) -> Result<VideoInfo, ExternalError> {
    let mut cmd = Command::new(ffprobe);
    cmd.args([
        "-v",
        "error",
        "-select_streams",
        "v:0",
        "-show_entries",
        "stream=width,height,r_frame_rate:format=duration",
        "-of",
        "default=noprint_wrappers=1",
    ])
    .arg(path);
    let text = capture_stdout(&mut cmd)?;
    parse_probe_output(&text).map_err(|message| ExternalError::BadOutput {
        program: ffprobe.to_string(),
        message,
    })
}

/// 解析 `key=value` 形式的 ffprobe 输出
pub fn parse_probe_output(text: &str) -> Result<VideoInfo, String> {
    let mut width = None;
    let mut height = None;
    let mut fps = None;
    let mut duration = None;

    for line in text.lines() {
        let Some((key, value)) = line.trim().split_once('=') else {
            continue;
        };
        match key {
            "width" => width = value.parse::<u32>().ok(),
            "height" => height = value.parse::<u32>().ok(),
            "r_frame_rate" => fps = parse_rate(value),
            "duration" => duration = value.parse::<f64>().ok().filter(|d| *d > 0.0),
            _ => {}
        }
    }

    match (width, height) {
        (Some(width), Some(height)) if width > 0 && height > 0 => Ok(VideoInfo {
            width,
            height,
            fps,
            duration,
        }),
        _ => Err(format!("未找到有效的视频尺寸: {:?}", text.trim())),
    }
}

/// 解析 `30000/1001` 或 `25` 形式的帧率
fn parse_rate(value: &str) -> Option<f64> {
    let rate = match value.split_once('/') {
        Some((num, den)) => {
            let den: f64 = den.parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num.parse::<f64>().ok()? / den
        }
        None => value.parse().ok()?,
    };
    (rate > 0.0).then_some(rate)
}
