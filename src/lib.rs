//! # aacplay
//!
//! 纯 Rust 实现的 AAC 播放核心.
//!
//! aacplay 负责把一个 AAC 字节源变成送往输出设备的 PCM 块:
//! - **嗅探**: 区分 ADTS 裸流与 MP4 容器
//! - **解码**: 容器按采样表逐采样解码, 裸流按 ADTS 帧滑动解码
//! - **定位**: 毫秒时间换算为采样索引
//! - **控制**: 后台解码线程的启动、停止与阻塞定位
//!
//! # 快速开始
//!
//! ```rust,no_run
//! use aacplay::playback::{EngineConfig, NullSink, Player, sink};
//!
//! let mut player = Player::new(
//!     sink::shared(NullSink::new()),
//!     aacplay::default_factory(),
//!     EngineConfig::default(),
//! );
//! let info = player.play_path("song.m4a").unwrap();
//! println!("{} ({:?} ms)", info.title, info.duration_ms);
//! player.wait();
//! ```
//!
//! # Crate 结构
//!
//! | Crate | 功能 |
//! |-------|------|
//! | `aacplay-core` | 统一错误、采样格式与比特流读取 |
//! | `aacplay-codec` | 解码器适配接口与 symphonia 后端 |
//! | `aacplay-format` | 字节源、ADTS 帧扫描、嗅探与 MP4 解封装 |
//! | `aacplay-playback` | 解码引擎、播放控制与元数据探测 |

/// 核心类型与工具
pub use aacplay_core as core;

/// 解码器适配层
pub use aacplay_codec as codec;

/// 字节源、码流与容器格式
pub use aacplay_format as format;

/// 解码引擎与播放控制
pub use aacplay_playback as playback;

/// 获取 aacplay 版本号
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// 创建内置的 AAC 解码器工厂
#[cfg(feature = "symphonia-backend")]
pub fn default_factory() -> std::sync::Arc<dyn aacplay_codec::CodecFactory> {
    std::sync::Arc::new(aacplay_codec::SymphoniaAacFactory)
}
