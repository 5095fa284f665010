//! 帧源: 解码引擎的两种输入变体.
//!
//! - [`ContainerSource`]: 由容器采样表驱动, 按采样索引逐个取压缩单元
//! - [`RawAdtsSource`]: 在滑动缓冲区上逐帧解码 ADTS 裸流
//!
//! 两者共享同一个 PCM 输出与定位约定, 引擎只面对 [`FrameSource`].

pub mod container;
pub mod raw;

use std::sync::Arc;

use aacplay_codec::{CodecFactory, PcmBlock};
use aacplay_core::AacResult;
use aacplay_format::sniff::unrecognized_error;
use aacplay_format::{IoContext, Mp4Demuxer, StreamClassification};

use crate::config::EngineConfig;

pub use container::ContainerSource;
pub use raw::RawAdtsSource;

/// 帧源初始化后得到的流参数
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceInfo {
    /// 采样率
    pub sample_rate: u32,
    /// 声道数
    pub channels: u32,
    /// 总时长 (毫秒)
    pub duration_ms: Option<u64>,
    /// 平均码率 (bit/s)
    pub bitrate: Option<u32>,
    /// 标签中的标题
    pub title: Option<String>,
}

/// 单次 `next_unit` 的结果
#[derive(Debug)]
pub enum Unit {
    /// 解码出一块 PCM
    Pcm(PcmBlock),
    /// 本次没有音频输出 (填充帧、重新同步等), 继续下一轮
    Skip,
    /// 流结束
    End,
}

/// 帧源 trait
pub trait FrameSource: Send {
    /// 帧源名称
    fn name(&self) -> &str;

    /// 打开底层容器/码流并初始化解码器
    fn init(&mut self) -> AacResult<SourceInfo>;

    /// 取下一个压缩单元并解码
    fn next_unit(&mut self) -> AacResult<Unit>;

    /// 定位到目标时间 (毫秒)
    fn seek(&mut self, target_ms: u64) -> AacResult<()>;

    /// 是否支持定位
    fn is_seekable(&self) -> bool;

    /// 释放解码器 (可重复调用, 只有第一次生效)
    fn close(&mut self);
}

/// 按嗅探结果构造帧源
pub fn open_source(
    io: IoContext,
    classification: StreamClassification,
    factory: Arc<dyn CodecFactory>,
    config: &EngineConfig,
    file_name: Option<&str>,
) -> AacResult<Box<dyn FrameSource>> {
    match classification {
        StreamClassification::RawAdts => Ok(Box::new(RawAdtsSource::new(
            io,
            factory,
            config.clone(),
        ))),
        StreamClassification::Mp4Container => Ok(Box::new(ContainerSource::new(
            io,
            Box::new(Mp4Demuxer::new()),
            factory,
            config.clone(),
        ))),
        StreamClassification::Unrecognized => Err(unrecognized_error(file_name)),
    }
}
