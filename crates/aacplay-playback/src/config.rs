//! 解码引擎配置.

use aacplay_codec::MIN_STREAM_CHUNK;
use aacplay_core::{AacError, AacResult};
use aacplay_format::SniffConfig;
use aacplay_format::sniff::{DEFAULT_PROBE_FRAMES, DEFAULT_PROBE_WINDOW};
use serde::{Deserialize, Serialize};

/// 时长与定位公式的取值策略
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimingPolicy {
    /// 以 `frame_size - 1` 作为每帧采样数 (与既有播放列表时长保持一致)
    #[default]
    Legacy,
    /// 以 `frame_size` 作为每帧采样数
    Exact,
}

/// 引擎配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// 在途缓冲区上限 (字节): 裸流预读缓冲区大小, 同时是容器单个压缩单元的上限
    pub max_in_flight_bytes: usize,
    /// 裸流探测窗口 (字节)
    pub probe_window_bytes: u64,
    /// 判定为裸流所需的有效帧数
    pub probe_min_frames: u32,
    /// 定位请求的等待轮询间隔 (毫秒)
    pub seek_poll_interval_ms: u64,
    /// 等待输出排空的轮询间隔 (毫秒)
    pub drain_poll_interval_ms: u64,
    /// 裸流中连续 "无消耗且无输出" 的次数上限, 超过后按流末尾处理
    pub max_stalled_units: u32,
    /// 时长/定位公式策略
    pub timing: TimingPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_in_flight_bytes: MIN_STREAM_CHUNK * 64,
            probe_window_bytes: DEFAULT_PROBE_WINDOW,
            probe_min_frames: DEFAULT_PROBE_FRAMES,
            seek_poll_interval_ms: 10,
            drain_poll_interval_ms: 10,
            max_stalled_units: 32,
            timing: TimingPolicy::Legacy,
        }
    }
}

impl EngineConfig {
    /// 嗅探参数
    pub fn sniff_config(&self) -> SniffConfig {
        SniffConfig {
            probe_window_bytes: self.probe_window_bytes,
            probe_min_frames: self.probe_min_frames,
        }
    }

    /// 检查配置是否可用
    pub fn validate(&self) -> AacResult<()> {
        if self.max_in_flight_bytes < MIN_STREAM_CHUNK {
            return Err(AacError::InvalidArgument(format!(
                "max_in_flight_bytes 不能小于 {MIN_STREAM_CHUNK}"
            )));
        }
        if self.probe_min_frames == 0 {
            return Err(AacError::InvalidArgument(
                "probe_min_frames 必须大于 0".into(),
            ));
        }
        Ok(())
    }
}
