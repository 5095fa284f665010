//! 容器解封装能力接口.
//!
//! 解码引擎只依赖 [`ContainerDemuxer`]: 打开字节源后给出
//! "采样索引 → (文件偏移, 字节长度)" 的映射以及轨道元数据.

use std::io::SeekFrom;

use aacplay_core::{AacError, AacResult};
use bytes::Bytes;

use crate::io::IoContext;

/// 轨道标识 (解封装器内部的轨道下标)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TrackId(pub usize);

/// 单个采样在文件中的位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleRange {
    /// 文件偏移
    pub offset: u64,
    /// 字节长度
    pub size: u32,
}

/// 标签元数据 (各字段均可缺失)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tags {
    /// 标题
    pub title: Option<String>,
    /// 专辑
    pub album: Option<String>,
    /// 艺术家
    pub artist: Option<String>,
    /// 日期
    pub date: Option<String>,
    /// 流派
    pub genre: Option<String>,
}

impl Tags {
    /// 是否一个字段都没有
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.album.is_none()
            && self.artist.is_none()
            && self.date.is_none()
            && self.genre.is_none()
    }
}

/// 容器解封装器 trait
pub trait ContainerDemuxer: Send {
    /// 获取解封装器名称
    fn name(&self) -> &str;

    /// 打开并解析容器结构
    fn open(&mut self, io: &mut IoContext) -> AacResult<()>;

    /// 选择第一条 AAC 音频轨道
    fn select_audio_track(&self) -> Option<TrackId>;

    /// 轨道中的采样数
    fn sample_count(&self, track: TrackId) -> u32;

    /// 解码配置 (AudioSpecificConfig), 缺失时返回 None
    fn decoder_config(&self, track: TrackId) -> Option<&[u8]>;

    /// 指定采样的位置
    fn sample_range(&self, track: TrackId, index: u32) -> Option<SampleRange>;

    /// 平均码率 (bit/s)
    fn average_bitrate(&self, track: TrackId) -> Option<u32>;

    /// 标签元数据
    fn tags(&self) -> &Tags;

    /// 读取指定采样的数据
    fn read_sample(&self, io: &mut IoContext, track: TrackId, index: u32) -> AacResult<Bytes> {
        let range = self
            .sample_range(track, index)
            .ok_or_else(|| AacError::Read(format!("采样 {index} 不存在")))?;
        io.seek(SeekFrom::Start(range.offset))?;
        Ok(Bytes::from(io.read_bytes(range.size as usize)?))
    }
}
