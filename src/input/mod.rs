// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 视频输入系统 (Video Input System)
///
/// - probe:   ffprobe 视频信息探测
/// - decoder: 视频文件顺序解码 (ez-ffmpeg, RGB帧)
/// - extract: 按固定帧率抽帧到图片序列
pub mod decoder;
pub mod extract;
pub mod probe;

pub use decoder::{rgb_from_plane, VideoReader};
pub use extract::{expected_frame_count, ExtractConfig, FrameExtractor};
pub use probe::{probe_video, VideoInfo};

use std::sync::atomic::{AtomicBool, Ordering};

/// 全局退出标志 (交互式退出)
static STOP_REQUESTED: AtomicBool = AtomicBool::new(false);

/// 请求停止当前视频处理循环
pub fn request_stop() {
    STOP_REQUESTED.store(true, Ordering::SeqCst);
}

/// 是否已请求停止
pub fn should_stop() -> bool {
    STOP_REQUESTED.load(Ordering::SeqCst)
}

/// 清除退出标志 (开始新的处理前调用)
pub fn reset_stop() {
    STOP_REQUESTED.store(false, Ordering::SeqCst);
}
