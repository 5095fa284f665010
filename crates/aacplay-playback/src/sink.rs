//! 播放输出能力接口.
//!
//! 真正的声卡输出由宿主提供; 本模块只定义接口, 并给出两个不接声卡的实现:
//! 丢弃数据的 [`NullSink`] 与写入原始 PCM 的 [`PcmWriterSink`].

use std::io::Write;
use std::sync::{Arc, Mutex};

use aacplay_codec::PcmBlock;
use aacplay_core::{AacError, AacResult, SampleFormat};
use log::{debug, warn};

/// 播放输出 trait
pub trait PlaybackSink: Send {
    /// 以指定格式打开输出
    fn open(&mut self, format: SampleFormat, sample_rate: u32, channels: u32) -> AacResult<()>;

    /// 写入一块 PCM, `timestamp_ms` 为输出端自己报告的已播放时间
    fn write(&mut self, pcm: &PcmBlock, timestamp_ms: u64) -> AacResult<()>;

    /// 丢弃缓冲中的音频, 输出时间跳到 `timestamp_ms`
    fn flush(&mut self, timestamp_ms: u64);

    /// 是否仍有缓冲音频在播放
    fn is_draining(&self) -> bool;

    /// 已播放时间 (毫秒)
    fn elapsed_ms(&self) -> u64;

    /// 暂停/恢复
    fn pause(&mut self, _paused: bool) {}

    /// 关闭输出
    fn close(&mut self);
}

/// 解码线程与控制端共享的输出
pub type SharedSink = Arc<Mutex<dyn PlaybackSink>>;

/// 把具体输出包装为共享输出
pub fn shared<S: PlaybackSink + 'static>(sink: S) -> Arc<Mutex<S>> {
    Arc::new(Mutex::new(sink))
}

/// 以 "写入即播放完" 方式计算的输出时钟
#[derive(Debug, Clone, Copy, Default)]
struct WrittenClock {
    base_ms: u64,
    frames: u64,
    sample_rate: u32,
}

impl WrittenClock {
    fn reset(&mut self, sample_rate: u32) {
        *self = Self {
            sample_rate,
            ..Self::default()
        };
    }

    fn advance(&mut self, frames: usize) {
        self.frames += frames as u64;
    }

    fn flush(&mut self, timestamp_ms: u64) {
        self.base_ms = timestamp_ms;
        self.frames = 0;
    }

    fn elapsed_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return self.base_ms;
        }
        self.base_ms + self.frames * 1000 / u64::from(self.sample_rate)
    }
}

/// 丢弃所有数据的输出, 只做计数
#[derive(Debug, Default)]
pub struct NullSink {
    clock: WrittenClock,
    open: bool,
    paused: bool,
    /// 累计写入的块数
    pub blocks: u64,
    /// 累计写入的采样帧数
    pub frames: u64,
}

impl NullSink {
    /// 创建输出
    pub fn new() -> Self {
        Self::default()
    }

    /// 是否处于打开状态
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// 是否暂停
    pub fn is_paused(&self) -> bool {
        self.paused
    }
}

impl PlaybackSink for NullSink {
    fn open(&mut self, format: SampleFormat, sample_rate: u32, channels: u32) -> AacResult<()> {
        debug!("NullSink: 打开 {format} {sample_rate}Hz {channels}ch");
        self.clock.reset(sample_rate);
        self.open = true;
        Ok(())
    }

    fn write(&mut self, pcm: &PcmBlock, _timestamp_ms: u64) -> AacResult<()> {
        if !self.open {
            return Err(AacError::Output("输出未打开".into()));
        }
        self.blocks += 1;
        self.frames += pcm.frames() as u64;
        self.clock.advance(pcm.frames());
        Ok(())
    }

    fn flush(&mut self, timestamp_ms: u64) {
        self.clock.flush(timestamp_ms);
    }

    fn is_draining(&self) -> bool {
        false
    }

    fn elapsed_ms(&self) -> u64 {
        self.clock.elapsed_ms()
    }

    fn pause(&mut self, paused: bool) {
        self.paused = paused;
    }

    fn close(&mut self) {
        self.open = false;
    }
}

/// 把交错 S16 PCM (本机字节序) 原样写入 `W`
pub struct PcmWriterSink<W: Write + Send> {
    writer: W,
    clock: WrittenClock,
    open: bool,
    bytes_written: u64,
}

impl<W: Write + Send> PcmWriterSink<W> {
    /// 创建输出
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            clock: WrittenClock::default(),
            open: false,
            bytes_written: 0,
        }
    }

    /// 已写入的字节数
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// 取回底层 writer
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> PlaybackSink for PcmWriterSink<W> {
    fn open(&mut self, format: SampleFormat, sample_rate: u32, channels: u32) -> AacResult<()> {
        if format != SampleFormat::S16 {
            return Err(AacError::Output(format!("不支持的采样格式: {format}")));
        }
        debug!("PcmWriterSink: 打开 {sample_rate}Hz {channels}ch");
        self.clock.reset(sample_rate);
        self.open = true;
        Ok(())
    }

    fn write(&mut self, pcm: &PcmBlock, _timestamp_ms: u64) -> AacResult<()> {
        if !self.open {
            return Err(AacError::Output("输出未打开".into()));
        }
        let bytes = pcm.to_ne_bytes();
        self.writer
            .write_all(&bytes)
            .map_err(|e| AacError::Output(format!("写入 PCM 失败: {e}")))?;
        self.bytes_written += bytes.len() as u64;
        self.clock.advance(pcm.frames());
        Ok(())
    }

    fn flush(&mut self, timestamp_ms: u64) {
        self.clock.flush(timestamp_ms);
    }

    fn is_draining(&self) -> bool {
        false
    }

    fn elapsed_ms(&self) -> u64 {
        self.clock.elapsed_ms()
    }

    fn close(&mut self) {
        if !self.open {
            return;
        }
        self.open = false;
        if let Err(e) = self.writer.flush() {
            warn!("PcmWriterSink: 刷新输出失败: {e}");
        }
    }
}
