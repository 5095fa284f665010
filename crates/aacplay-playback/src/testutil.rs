//! 单元测试共用的模拟解码器、解封装器与输出.

use std::cell::Cell;
use std::sync::{Arc, Mutex};

use aacplay_codec::{
    AdapterOptions, CodecAdapter, CodecFactory, DecodeOutput, PcmBlock, RawInit, StreamConfig,
};
use aacplay_core::{AacError, AacResult, SampleFormat};
use aacplay_format::{ContainerDemuxer, IoContext, SampleRange, Tags, TrackId};

use crate::sink::PlaybackSink;

/// 解码器调用记录
#[derive(Debug, Clone, Default)]
pub struct AdapterLog {
    /// 每次 open 的 legacy_adts 选项
    pub opens: Vec<bool>,
    pub inits: u32,
    pub decode_calls: u32,
    pub decoded: u32,
    pub closes: u32,
}

type DecodeHook = Arc<dyn Fn(u32) + Send + Sync>;

/// 模拟解码器工厂
#[derive(Clone)]
pub struct MockFactory {
    log: Arc<Mutex<AdapterLog>>,
    channels: u32,
    sample_rate: u32,
    frames: usize,
    /// 每次消耗的字节数, None 表示整段消耗
    unit_bytes: Option<usize>,
    fail_decode_at: Option<u32>,
    fail_non_legacy: bool,
    fail_all: bool,
    silent: bool,
    on_decode: Option<DecodeHook>,
}

impl MockFactory {
    pub fn new() -> Self {
        Self {
            log: Arc::default(),
            channels: 2,
            sample_rate: 44100,
            frames: 1024,
            unit_bytes: None,
            fail_decode_at: None,
            fail_non_legacy: false,
            fail_all: false,
            silent: false,
            on_decode: None,
        }
    }

    pub fn with_channels(mut self, channels: u32) -> Self {
        self.channels = channels;
        self
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn with_unit_bytes(mut self, bytes: usize) -> Self {
        self.unit_bytes = Some(bytes);
        self
    }

    /// 第 `call` 次 (从 0 计) 解码调用报告码流错误
    pub fn fail_decode_at(mut self, call: u32) -> Self {
        self.fail_decode_at = Some(call);
        self
    }

    /// 非旧版模式的解码器每次解码都报错
    pub fn fail_non_legacy(mut self) -> Self {
        self.fail_non_legacy = true;
        self
    }

    pub fn fail_all(mut self) -> Self {
        self.fail_all = true;
        self
    }

    /// 只消耗输入, 不产生音频
    pub fn silent(mut self) -> Self {
        self.silent = true;
        self
    }

    /// 每次解码调用前执行的回调 (参数为调用序号)
    pub fn on_decode(mut self, hook: impl Fn(u32) + Send + Sync + 'static) -> Self {
        self.on_decode = Some(Arc::new(hook));
        self
    }

    pub fn log(&self) -> AdapterLog {
        self.log.lock().unwrap().clone()
    }
}

impl CodecFactory for MockFactory {
    fn open(&self, options: AdapterOptions) -> AacResult<Box<dyn CodecAdapter>> {
        self.log.lock().unwrap().opens.push(options.legacy_adts);
        Ok(Box::new(MockAdapter {
            factory: self.clone(),
            legacy: options.legacy_adts,
        }))
    }
}

struct MockAdapter {
    factory: MockFactory,
    legacy: bool,
}

impl MockAdapter {
    fn stream(&self) -> StreamConfig {
        StreamConfig {
            sample_rate: self.factory.sample_rate,
            channels: self.factory.channels,
        }
    }
}

impl CodecAdapter for MockAdapter {
    fn name(&self) -> &str {
        "mock"
    }

    fn legacy_adts(&self) -> bool {
        self.legacy
    }

    fn init(&mut self, _config: &[u8]) -> AacResult<StreamConfig> {
        self.factory.log.lock().unwrap().inits += 1;
        Ok(self.stream())
    }

    fn init_raw(&mut self, buffer: &[u8]) -> AacResult<RawInit> {
        self.factory.log.lock().unwrap().inits += 1;
        if buffer.is_empty() {
            return Err(AacError::ConfigInit("空缓冲区".into()));
        }
        Ok(RawInit {
            config: self.stream(),
            bytes_consumed: 0,
        })
    }

    fn decode_unit(&mut self, data: &[u8]) -> DecodeOutput {
        let f = &self.factory;
        let call = {
            let mut log = f.log.lock().unwrap();
            log.decode_calls += 1;
            log.decode_calls - 1
        };
        if let Some(hook) = &f.on_decode {
            hook(call);
        }

        if f.fail_all || (f.fail_non_legacy && !self.legacy) || f.fail_decode_at == Some(call) {
            return DecodeOutput::fault(9, "模拟码流错误");
        }

        let consumed = f.unit_bytes.map_or(data.len(), |n| n.min(data.len()));
        if f.silent || data.is_empty() {
            return DecodeOutput::empty(consumed);
        }
        f.log.lock().unwrap().decoded += 1;
        let pcm = PcmBlock::new(
            vec![i16::from(data[0]); f.frames * f.channels as usize],
            f.channels,
            f.sample_rate,
        );
        DecodeOutput::decoded(pcm, consumed)
    }

    fn close(&mut self) {
        self.factory.log.lock().unwrap().closes += 1;
    }
}

/// 模拟解封装器: 采样依次紧密排列, 第 i 个采样的字节全为 `i as u8`
pub struct MockDemuxer {
    pub sizes: Vec<u32>,
    pub asc: Vec<u8>,
    pub has_audio: bool,
    pub tags: Tags,
}

impl MockDemuxer {
    pub fn with_units(count: usize, size: u32) -> Self {
        Self {
            sizes: vec![size; count],
            asc: vec![0x12, 0x10],
            has_audio: true,
            tags: Tags {
                title: Some("mock".into()),
                ..Tags::default()
            },
        }
    }

    /// 与采样表对应的字节内容
    pub fn payload(&self) -> Vec<u8> {
        self.sizes
            .iter()
            .enumerate()
            .flat_map(|(i, &size)| std::iter::repeat_n(i as u8, size as usize))
            .collect()
    }
}

impl ContainerDemuxer for MockDemuxer {
    fn name(&self) -> &str {
        "mock"
    }

    fn open(&mut self, _io: &mut IoContext) -> AacResult<()> {
        Ok(())
    }

    fn select_audio_track(&self) -> Option<TrackId> {
        self.has_audio.then_some(TrackId(0))
    }

    fn sample_count(&self, _track: TrackId) -> u32 {
        self.sizes.len() as u32
    }

    fn decoder_config(&self, _track: TrackId) -> Option<&[u8]> {
        (!self.asc.is_empty()).then_some(self.asc.as_slice())
    }

    fn sample_range(&self, _track: TrackId, index: u32) -> Option<SampleRange> {
        let index = index as usize;
        let size = *self.sizes.get(index)?;
        let offset = self.sizes[..index].iter().map(|&s| u64::from(s)).sum();
        Some(SampleRange { offset, size })
    }

    fn average_bitrate(&self, _track: TrackId) -> Option<u32> {
        Some(128_000)
    }

    fn tags(&self) -> &Tags {
        &self.tags
    }
}

/// 输出调用记录
#[derive(Debug, Clone, Default)]
pub struct SinkLog {
    pub opened: Option<(SampleFormat, u32, u32)>,
    /// (时间戳, 首个采样值)
    pub writes: Vec<(u64, i16)>,
    pub flushes: Vec<u64>,
    pub pauses: Vec<bool>,
    pub closes: u32,
    pub drain_polls: u32,
}

type WriteHook = Box<dyn FnMut(usize) + Send>;

/// 记录所有调用的输出
#[derive(Default)]
pub struct RecordingSink {
    pub log: SinkLog,
    pub fail_open: bool,
    /// `is_draining` 报告 true 的次数
    pub draining_for: Cell<u32>,
    pub(crate) polls: Cell<u32>,
    pub(crate) elapsed: u64,
    pub(crate) on_write: Option<WriteHook>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// 每次写入后执行的回调 (参数为已写入块数)
    pub fn on_write(mut self, hook: impl FnMut(usize) + Send + 'static) -> Self {
        self.on_write = Some(Box::new(hook));
        self
    }
}

impl PlaybackSink for RecordingSink {
    fn open(&mut self, format: SampleFormat, sample_rate: u32, channels: u32) -> AacResult<()> {
        if self.fail_open {
            return Err(AacError::Output("设备忙".into()));
        }
        self.log.opened = Some((format, sample_rate, channels));
        Ok(())
    }

    fn write(&mut self, pcm: &PcmBlock, timestamp_ms: u64) -> AacResult<()> {
        self.log.writes.push((timestamp_ms, pcm.samples[0]));
        // 每块按 10ms 计
        self.elapsed += 10;
        if let Some(hook) = &mut self.on_write {
            hook(self.log.writes.len());
        }
        Ok(())
    }

    fn flush(&mut self, timestamp_ms: u64) {
        self.log.flushes.push(timestamp_ms);
        self.elapsed = timestamp_ms;
    }

    fn is_draining(&self) -> bool {
        self.polls.set(self.polls.get() + 1);
        let left = self.draining_for.get();
        if left > 0 {
            self.draining_for.set(left - 1);
            true
        } else {
            false
        }
    }

    fn elapsed_ms(&self) -> u64 {
        self.elapsed
    }

    fn pause(&mut self, paused: bool) {
        self.log.pauses.push(paused);
    }

    fn close(&mut self) {
        self.log.closes += 1;
        self.log.drain_polls = self.polls.get();
    }
}
