//! 集成测试共用的构造器与模拟组件.
//!
//! - MP4 / ADTS 字节流构造
//! - 按脚本出错的解码器工厂
//! - 记录调用的输出端

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use aacplay::codec::{
    AdapterOptions, AudioSpecificConfig, CodecAdapter, CodecFactory, DecodeOutput, PcmBlock,
    RawInit, StreamConfig,
};
use aacplay::core::{AacError, AacResult, SampleFormat};
use aacplay::format::adts;
use aacplay::playback::PlaybackSink;

/// 打开测试日志, 便于用 RUST_LOG 查看引擎日志
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// ========================
// 辅助函数: 构造 MP4 Box
// ========================

/// 构造一个普通 box
pub fn build_box(tag: &[u8; 4], content: &[u8]) -> Vec<u8> {
    let size = (8 + content.len()) as u32;
    let mut data = Vec::with_capacity(size as usize);
    data.extend_from_slice(&size.to_be_bytes());
    data.extend_from_slice(tag);
    data.extend_from_slice(content);
    data
}

/// 构造一个 FullBox (version + flags + content)
pub fn build_fullbox(tag: &[u8; 4], version: u8, flags: u32, content: &[u8]) -> Vec<u8> {
    let mut full = vec![
        version,
        ((flags >> 16) & 0xFF) as u8,
        ((flags >> 8) & 0xFF) as u8,
        (flags & 0xFF) as u8,
    ];
    full.extend_from_slice(content);
    build_box(tag, &full)
}

/// 构造 esds box (ES_Descriptor → DecoderConfig → DecoderSpecificInfo)
fn build_esds(object_type: u8, avg_bitrate: u32, asc: &[u8]) -> Vec<u8> {
    let mut dsi = vec![0x05, asc.len() as u8];
    dsi.extend_from_slice(asc);

    let mut dcd = vec![object_type, 0x15, 0, 0x18, 0];
    dcd.extend_from_slice(&avg_bitrate.to_be_bytes()); // max bitrate
    dcd.extend_from_slice(&avg_bitrate.to_be_bytes());
    dcd.extend_from_slice(&dsi);

    let mut es = vec![0x00, 0x01, 0x00, 0x04, dcd.len() as u8];
    es.extend_from_slice(&dcd);
    es.extend_from_slice(&[0x06, 0x01, 0x02]);

    let mut esd = vec![0x03, es.len() as u8];
    esd.extend_from_slice(&es);
    build_fullbox(b"esds", 0, 0, &esd)
}

/// 构造 ilst 中的一个条目
pub fn build_item(name: &[u8; 4], type_indicator: u32, payload: &[u8]) -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(&type_indicator.to_be_bytes());
    data.extend_from_slice(&0u32.to_be_bytes());
    data.extend_from_slice(payload);
    build_box(name, &build_box(b"data", &data))
}

fn build_udta(items: &[Vec<u8>]) -> Vec<u8> {
    let mut hdlr = vec![0u8; 4];
    hdlr.extend_from_slice(b"mdirappl");
    hdlr.extend_from_slice(&[0u8; 9]);
    let mut meta = build_fullbox(b"hdlr", 0, 0, &hdlr);
    meta.extend_from_slice(&build_box(b"ilst", &items.concat()));
    build_box(b"udta", &build_fullbox(b"meta", 0, 0, &meta))
}

/// MP4 文件描述
pub struct Mp4File {
    pub samples: Vec<Vec<u8>>,
    pub asc: Vec<u8>,
    pub avg_bitrate: u32,
    pub items: Vec<Vec<u8>>,
}

impl Mp4File {
    /// `count` 个采样, 第 i 个采样的字节全为 `i as u8`
    pub fn with_samples(count: usize, len: usize) -> Self {
        Self {
            samples: (0..count).map(|i| vec![i as u8; len]).collect(),
            // AAC-LC, 44100 Hz, 立体声
            asc: vec![0x12, 0x10],
            avg_bitrate: 128_000,
            items: Vec::new(),
        }
    }

    /// 构造 ftyp + moov + mdat, 所有采样放在一个块中
    pub fn build(&self) -> Vec<u8> {
        let ftyp = build_box(b"ftyp", b"M4A \x00\x00\x00\x00isomM4A mp42");
        let moov_len = self.build_moov(0).len();
        let chunk_offset = (ftyp.len() + moov_len + 8) as u32;

        let mut out = ftyp;
        out.extend_from_slice(&self.build_moov(chunk_offset));
        out.extend_from_slice(&build_box(b"mdat", &self.samples.concat()));
        out
    }

    fn build_moov(&self, chunk_offset: u32) -> Vec<u8> {
        let count = self.samples.len() as u32;

        // mp4a 采样条目
        let mut entry = vec![0u8; 6];
        entry.extend_from_slice(&1u16.to_be_bytes()); // data_reference_index
        entry.extend_from_slice(&[0u8; 8]);
        entry.extend_from_slice(&2u16.to_be_bytes()); // channelcount
        entry.extend_from_slice(&16u16.to_be_bytes()); // samplesize
        entry.extend_from_slice(&[0u8; 4]);
        entry.extend_from_slice(&(44100u32 << 16).to_be_bytes());
        entry.extend_from_slice(&build_esds(0x40, self.avg_bitrate, &self.asc));

        let mut stsd = 1u32.to_be_bytes().to_vec();
        stsd.extend_from_slice(&build_box(b"mp4a", &entry));

        let mut stsz = 0u32.to_be_bytes().to_vec();
        stsz.extend_from_slice(&count.to_be_bytes());
        for s in &self.samples {
            stsz.extend_from_slice(&(s.len() as u32).to_be_bytes());
        }

        let mut stsc = 1u32.to_be_bytes().to_vec();
        stsc.extend_from_slice(&1u32.to_be_bytes());
        stsc.extend_from_slice(&count.to_be_bytes());
        stsc.extend_from_slice(&1u32.to_be_bytes());

        let mut stco = 1u32.to_be_bytes().to_vec();
        stco.extend_from_slice(&chunk_offset.to_be_bytes());

        let stbl = build_box(
            b"stbl",
            &[
                build_fullbox(b"stsd", 0, 0, &stsd),
                build_fullbox(b"stsc", 0, 0, &stsc),
                build_fullbox(b"stsz", 0, 0, &stsz),
                build_fullbox(b"stco", 0, 0, &stco),
            ]
            .concat(),
        );

        let mut mdhd = vec![0u8; 8];
        mdhd.extend_from_slice(&44100u32.to_be_bytes());
        mdhd.extend_from_slice(&(count * 1024).to_be_bytes());
        mdhd.extend_from_slice(&[0u8; 4]);

        let mut hdlr = vec![0u8; 4];
        hdlr.extend_from_slice(b"soun");
        hdlr.extend_from_slice(&[0u8; 13]);

        let mdia = build_box(
            b"mdia",
            &[
                build_fullbox(b"mdhd", 0, 0, &mdhd),
                build_fullbox(b"hdlr", 0, 0, &hdlr),
                build_box(b"minf", &stbl),
            ]
            .concat(),
        );

        let mut moov = build_box(b"trak", &mdia);
        if !self.items.is_empty() {
            moov.extend_from_slice(&build_udta(&self.items));
        }
        build_box(b"moov", &moov)
    }
}

// ========================
// 辅助函数: 构造 ADTS 帧
// ========================

/// 构造一个 ADTS 帧 (AAC-LC, 44100 Hz, 立体声, 无 CRC)
pub fn adts_frame(payload_len: usize, fill: u8) -> Vec<u8> {
    let len = (7 + payload_len) as u16;
    let mut frame = vec![
        0xFF,
        0xF1,
        0x50,
        0x80 | ((len >> 11) as u8 & 0x03),
        (len >> 3) as u8,
        ((len & 0x07) as u8) << 5 | 0x1F,
        0xFC,
    ];
    frame.resize(len as usize, fill);
    frame
}

/// 连续 `count` 个 ADTS 帧, 第 i 帧的负载全为 `i as u8`
pub fn adts_stream(count: usize, payload_len: usize) -> Vec<u8> {
    (0..count)
        .flat_map(|i| adts_frame(payload_len, i as u8))
        .collect()
}

// ========================
// 模拟解码器
// ========================

/// 解码器调用记录
#[derive(Debug, Clone, Default)]
pub struct CodecLog {
    /// 每次 open 的 legacy_adts 选项
    pub opens: Vec<bool>,
    pub decodes: u32,
    pub closes: u32,
}

/// 模拟解码器工厂
///
/// 容器模式整段消耗输入; 裸流模式按 ADTS 帧头给出的帧长逐帧消耗.
/// 每个 PCM 块 1024 帧, 采样值为输入的第一个负载字节.
#[derive(Clone, Default)]
pub struct ScriptedFactory {
    pub log: Arc<Mutex<CodecLog>>,
    /// 新版约定的解码器每次解码都报错
    pub fail_non_legacy: bool,
}

impl ScriptedFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self) -> CodecLog {
        self.log.lock().unwrap().clone()
    }
}

impl CodecFactory for ScriptedFactory {
    fn open(&self, options: AdapterOptions) -> AacResult<Box<dyn CodecAdapter>> {
        self.log.lock().unwrap().opens.push(options.legacy_adts);
        Ok(Box::new(ScriptedAdapter {
            factory: self.clone(),
            legacy: options.legacy_adts,
            stream: None,
        }))
    }
}

struct ScriptedAdapter {
    factory: ScriptedFactory,
    legacy: bool,
    stream: Option<StreamConfig>,
}

impl CodecAdapter for ScriptedAdapter {
    fn name(&self) -> &str {
        "scripted"
    }

    fn legacy_adts(&self) -> bool {
        self.legacy
    }

    fn init(&mut self, config: &[u8]) -> AacResult<StreamConfig> {
        let asc = AudioSpecificConfig::parse(config)?;
        let stream = StreamConfig {
            sample_rate: asc.output_sample_rate(),
            channels: asc.channel_count(),
        };
        self.stream = Some(stream);
        Ok(stream)
    }

    fn init_raw(&mut self, buffer: &[u8]) -> AacResult<RawInit> {
        let offset = (0..buffer.len())
            .find(|&i| adts::parse_frame(&buffer[i..]).is_some())
            .ok_or_else(|| AacError::ConfigInit("缓冲区中没有 ADTS 帧".into()))?;
        let header = adts::parse_frame(&buffer[offset..])
            .ok_or_else(|| AacError::ConfigInit("无效帧头".into()))?;
        let channels = adts::channel_configuration(&buffer[offset..]).unwrap_or(2);
        let stream = StreamConfig {
            sample_rate: header.sample_rate,
            channels: u32::from(channels),
        };
        self.stream = Some(stream);
        Ok(RawInit {
            config: stream,
            bytes_consumed: offset,
        })
    }

    fn decode_unit(&mut self, data: &[u8]) -> DecodeOutput {
        self.factory.log.lock().unwrap().decodes += 1;
        if self.factory.fail_non_legacy && !self.legacy {
            return DecodeOutput::fault(3, "bitstream error");
        }
        let Some(stream) = self.stream else {
            return DecodeOutput::fault(4, "not initialized");
        };
        let (consumed, value) = match adts::parse_frame(data) {
            Some(h) => (
                (h.frame_length_bytes as usize).min(data.len()),
                data.get(adts::ADTS_HEADER_LEN).copied().unwrap_or(0),
            ),
            None if data.is_empty() => return DecodeOutput::empty(0),
            None => (data.len(), data[0]),
        };
        let pcm = PcmBlock::new(
            vec![i16::from(value); 1024 * stream.channels as usize],
            stream.channels,
            stream.sample_rate,
        );
        DecodeOutput::decoded(pcm, consumed)
    }

    fn close(&mut self) {
        self.factory.log.lock().unwrap().closes += 1;
    }
}

// ========================
// 模拟输出
// ========================

/// 输出调用记录
#[derive(Debug, Clone, Default)]
pub struct SinkLog {
    pub opened: Option<(SampleFormat, u32, u32)>,
    /// (时间戳, 首个采样值)
    pub writes: Vec<(u64, i16)>,
    pub flushes: Vec<u64>,
    pub closes: u32,
}

type WriteHook = Box<dyn FnMut(usize) + Send>;

/// 记录调用的输出端, 已播放时间按写入的 PCM 时长累加
#[derive(Default)]
pub struct CollectSink {
    pub log: SinkLog,
    elapsed: u64,
    on_write: Option<WriteHook>,
}

impl CollectSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// 每次写入后执行的回调 (参数为已写入块数)
    pub fn on_write(mut self, hook: impl FnMut(usize) + Send + 'static) -> Self {
        self.on_write = Some(Box::new(hook));
        self
    }
}

impl PlaybackSink for CollectSink {
    fn open(&mut self, format: SampleFormat, sample_rate: u32, channels: u32) -> AacResult<()> {
        self.log.opened = Some((format, sample_rate, channels));
        Ok(())
    }

    fn write(&mut self, pcm: &PcmBlock, timestamp_ms: u64) -> AacResult<()> {
        self.log.writes.push((timestamp_ms, pcm.samples[0]));
        self.elapsed += pcm.duration_ms();
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
        false
    }

    fn elapsed_ms(&self) -> u64 {
        self.elapsed
    }

    fn close(&mut self) {
        self.log.closes += 1;
    }
}
