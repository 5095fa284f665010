//! 容器驱动的帧源.
//!
//! 解封装器给出 "采样索引 → 字节区间", 每个采样是一个完整的 AAC 访问单元.
//! 读取或解码失败对本轨道是致命的, 不做重试.

use std::sync::Arc;

use aacplay_codec::{AdapterOptions, AudioSpecificConfig, CodecAdapter, CodecFactory};
use aacplay_core::{AacError, AacResult};
use aacplay_format::{ContainerDemuxer, IoContext, TrackId};
use log::{debug, error, info, warn};

use super::{FrameSource, SourceInfo, Unit};
use crate::config::EngineConfig;
use crate::timing;

/// 默认每帧采样数
const DEFAULT_FRAME_SIZE: u32 = 1024;

/// 容器帧源
pub struct ContainerSource {
    io: IoContext,
    demuxer: Box<dyn ContainerDemuxer>,
    factory: Arc<dyn CodecFactory>,
    adapter: Option<Box<dyn CodecAdapter>>,
    config: EngineConfig,
    track: Option<TrackId>,
    sample_count: u32,
    /// 下一个要读取的采样索引
    next_sample: u32,
    frame_size: u32,
    /// 时长与定位换算所用的采样率, 与 `frame_size` 同属 SBR 输出域
    timing_rate: u32,
}

impl ContainerSource {
    /// 创建帧源 (尚未打开)
    pub fn new(
        io: IoContext,
        demuxer: Box<dyn ContainerDemuxer>,
        factory: Arc<dyn CodecFactory>,
        config: EngineConfig,
    ) -> Self {
        Self {
            io,
            demuxer,
            factory,
            adapter: None,
            config,
            track: None,
            sample_count: 0,
            next_sample: 0,
            frame_size: DEFAULT_FRAME_SIZE,
            timing_rate: 0,
        }
    }

    /// 每帧采样数 (初始化后有效)
    pub fn frame_size(&self) -> u32 {
        self.frame_size
    }

    /// 下一个要解码的采样索引
    pub fn position(&self) -> u32 {
        self.next_sample
    }

    /// 轨道采样数
    pub fn sample_count(&self) -> u32 {
        self.sample_count
    }

    fn read_unit(&mut self, track: TrackId, index: u32) -> AacResult<Option<bytes::Bytes>> {
        let range = self
            .demuxer
            .sample_range(track, index)
            .ok_or_else(|| AacError::Read(format!("无法定位采样 {index}")))?;
        if range.size == 0 || range.size as usize > self.config.max_in_flight_bytes {
            return Err(AacError::Read(format!(
                "采样 {index} 长度异常: {} 字节",
                range.size
            )));
        }

        match self.demuxer.read_sample(&mut self.io, track, index) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.is_eof() => Err(AacError::Read(format!("采样 {index} 被截断"))),
            Err(AacError::Io(e)) => {
                error!("读取采样 {index} 时发生 I/O 错误, 按流末尾处理: {e}");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

impl FrameSource for ContainerSource {
    fn name(&self) -> &str {
        "container"
    }

    fn init(&mut self) -> AacResult<SourceInfo> {
        self.demuxer.open(&mut self.io)?;
        let track = self
            .demuxer
            .select_audio_track()
            .ok_or(AacError::UnsupportedTrack)?;
        self.track = Some(track);

        let asc = self
            .demuxer
            .decoder_config(track)
            .ok_or_else(|| AacError::ConfigInit("轨道缺少解码配置".into()))?
            .to_vec();

        let adapter = self.adapter.insert(self.factory.open(AdapterOptions::default())?);
        let stream = adapter.init(&asc)?;
        if stream.channels == 0 {
            return Err(AacError::ConfigInit("解码器报告 0 个声道".into()));
        }

        // 输出端按解码器实际输出的采样率打开; 时长与定位按配置声明的帧长换算,
        // SBR 时帧长翻倍, 换算采样率也取 SBR 输出采样率
        (self.frame_size, self.timing_rate) = match AudioSpecificConfig::parse(&asc) {
            Ok(parsed) => (parsed.frame_size(), parsed.output_sample_rate()),
            Err(e) => {
                warn!("无法解析 AudioSpecificConfig, 按 {DEFAULT_FRAME_SIZE} 采样/帧计算: {e}");
                (DEFAULT_FRAME_SIZE, stream.sample_rate)
            }
        };
        if self.timing_rate != stream.sample_rate {
            debug!(
                "解码输出 {} Hz, 时长按 {} Hz / {} 采样每帧换算",
                stream.sample_rate, self.timing_rate, self.frame_size
            );
        }
        self.sample_count = self.demuxer.sample_count(track);
        self.next_sample = 0;

        let duration = timing::duration_ms(
            self.sample_count,
            self.frame_size,
            self.timing_rate,
            self.config.timing,
        );
        info!(
            "{}: 轨道 #{}, {} 个采样, {} Hz, {} 声道, {} 采样/帧, 时长 {} ms",
            self.demuxer.name(),
            track.0,
            self.sample_count,
            stream.sample_rate,
            stream.channels,
            self.frame_size,
            duration,
        );

        Ok(SourceInfo {
            sample_rate: stream.sample_rate,
            channels: stream.channels,
            duration_ms: Some(duration),
            bitrate: self.demuxer.average_bitrate(track),
            title: self.demuxer.tags().title.clone(),
        })
    }

    fn next_unit(&mut self) -> AacResult<Unit> {
        let track = self
            .track
            .ok_or_else(|| AacError::Internal("帧源未初始化".into()))?;
        if self.next_sample >= self.sample_count {
            return Ok(Unit::End);
        }

        let index = self.next_sample;
        let Some(data) = self.read_unit(track, index)? else {
            return Ok(Unit::End);
        };
        self.next_sample += 1;

        let adapter = self
            .adapter
            .as_mut()
            .ok_or_else(|| AacError::Internal("解码器已关闭".into()))?;
        let out = adapter.decode_unit(&data);
        if let Some(fault) = out.error {
            return Err(AacError::Decode(format!(
                "采样 {index}: {} (错误码 {})",
                fault.message, fault.code
            )));
        }

        match out.pcm {
            Some(pcm) if !pcm.is_empty() => Ok(Unit::Pcm(pcm)),
            _ => Ok(Unit::Skip),
        }
    }

    fn seek(&mut self, target_ms: u64) -> AacResult<()> {
        let index = timing::seek_sample_index(
            target_ms,
            self.frame_size,
            self.timing_rate,
            self.config.timing,
        );
        debug!(
            "定位: {target_ms} ms -> 采样 {index}/{}",
            self.sample_count
        );
        self.next_sample = index;
        Ok(())
    }

    fn is_seekable(&self) -> bool {
        true
    }

    fn close(&mut self) {
        if let Some(mut adapter) = self.adapter.take() {
            debug!("关闭解码器 {}", adapter.name());
            adapter.close();
        }
    }
}

impl Drop for ContainerSource {
    fn drop(&mut self) {
        self.close();
    }
}
