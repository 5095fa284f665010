//! # aacplay-codec
//!
//! 解码器适配层. 底层 AAC 解码引擎被视为黑盒, 通过 [`CodecAdapter`] 能力接口
//! 接入: 送入一段字节, 取回 PCM 块、已消耗字节数与错误码.
//!
//! ## 使用示例
//!
//! ```rust
//! use aacplay_codec::asc::AudioSpecificConfig;
//!
//! // AAC-LC, 44100 Hz, 立体声
//! let asc = AudioSpecificConfig::parse(&[0x12, 0x10]).unwrap();
//! assert_eq!(asc.sample_rate, 44100);
//! assert_eq!(asc.frame_size(), 1024);
//! ```

pub mod adapter;
pub mod asc;
pub mod pcm;
#[cfg(feature = "symphonia-backend")]
pub mod symphonia;

// 重导出常用类型
pub use adapter::{
    AdapterOptions, CodecAdapter, CodecFactory, DecodeFault, DecodeOutput, RawInit, StreamConfig,
};
pub use asc::AudioSpecificConfig;
pub use pcm::PcmBlock;
#[cfg(feature = "symphonia-backend")]
pub use symphonia::{SymphoniaAacAdapter, SymphoniaAacFactory};

/// AAC 解码器单声道最小流式块大小 (字节)
///
/// 一个 AAC 帧在单声道下的理论最大长度, 缓冲区大小以此为单位计算.
pub const MIN_STREAM_CHUNK: usize = 768;
