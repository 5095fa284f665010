//! # aacplay-playback
//!
//! aacplay 播放核心. 把格式嗅探、帧源与解码器适配器串成一条完整的播放管线:
//!
//! ```text
//! sniff ─▶ FrameSource (容器 / 裸流) ─▶ CodecAdapter ─▶ PlaybackSink
//!                    ▲                                      │
//!                    └──── PlaybackControl (停止/定位) ◀────┘
//! ```
//!
//! [`Player`] 在后台线程运行 [`DecodeEngine`], 控制端通过共享的
//! [`PlaybackControl`] 发出停止与定位请求. [`probe`] 提供不涉及输出的元数据探测.

pub mod config;
pub mod control;
pub mod engine;
pub mod host;
pub mod player;
pub mod probe;
pub mod sink;
pub mod source;
pub mod timing;

#[cfg(test)]
mod testutil;

// 重导出常用类型
pub use config::{EngineConfig, TimingPolicy};
pub use control::PlaybackControl;
pub use engine::{DecodeEngine, EndReason, EngineReport, EngineState};
pub use host::{LogHost, PlaybackHost, StreamInfo};
pub use player::Player;
pub use probe::{TrackMetadata, probe_path};
pub use sink::{NullSink, PcmWriterSink, PlaybackSink, SharedSink};
pub use source::{ContainerSource, FrameSource, RawAdtsSource, SourceInfo, Unit};
