//! # aacplay-format
//!
//! aacplay 码流与容器层: 字节源抽象、ADTS 帧扫描、格式嗅探以及 MP4 解封装.
//!
//! 解码引擎只通过 [`ContainerDemuxer`] 与容器交互, 因此可以替换为其他实现.

pub mod adts;
pub mod demuxer;
pub mod io;
pub mod mp4;
pub mod sniff;

// 重导出常用类型
pub use adts::AdtsFrameHeader;
pub use demuxer::{ContainerDemuxer, SampleRange, Tags, TrackId};
pub use io::{IoBackend, IoContext, MemoryBackend};
pub use mp4::Mp4Demuxer;
pub use sniff::{SniffConfig, StreamClassification, sniff, sniff_path};
