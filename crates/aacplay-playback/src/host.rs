//! 宿主回调.

use log::info;
use serde::Serialize;

/// 轨道开始播放时发布给宿主的流信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamInfo {
    /// 显示标题
    pub title: String,
    /// 总时长 (毫秒), 裸流未知
    pub duration_ms: Option<u64>,
    /// 平均码率 (bit/s), 裸流未知
    pub bitrate: Option<u32>,
    /// 采样率
    pub sample_rate: u32,
    /// 声道数
    pub channels: u32,
}

/// 播放宿主
pub trait PlaybackHost: Send + Sync {
    /// 发布当前轨道信息
    fn set_info(&self, info: &StreamInfo);
}

/// 只把流信息写入日志的宿主
#[derive(Debug, Default, Clone, Copy)]
pub struct LogHost;

impl PlaybackHost for LogHost {
    fn set_info(&self, info: &StreamInfo) {
        info!(
            "正在播放: {} ({} Hz, {} 声道, 时长 {}, 码率 {})",
            info.title,
            info.sample_rate,
            info.channels,
            info.duration_ms
                .map_or_else(|| "未知".to_string(), |ms| format!("{ms} ms")),
            info.bitrate
                .map_or_else(|| "未知".to_string(), |b| format!("{} kbps", b / 1000)),
        );
    }
}
