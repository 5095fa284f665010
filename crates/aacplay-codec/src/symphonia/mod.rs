//! 基于 symphonia 的 AAC 解码适配器.
//!
//! 容器模式: 由 AudioSpecificConfig 初始化, 每次送入一个完整访问单元.
//! 裸流模式: 自行定位首个 ADTS 帧头并据此构造配置, 每次 `decode_unit`
//! 解码缓冲区起始处的一个 ADTS 帧.
//!
//! symphonia 0.5 的 AAC 解码器不做 SBR/PS 重建, 输出的是核心采样率的 PCM,
//! 因此协商结果总是报告核心采样率.

pub mod adts;

use aacplay_core::{AacError, AacResult};
use log::{debug, warn};
use symphonia_codec_aac::AacDecoder as SymAacDecoder;
use symphonia_core::audio::SampleBuffer;
use symphonia_core::codecs::{
    CODEC_TYPE_AAC, CodecParameters as SymCodecParameters, Decoder as SymDecoderTrait,
    DecoderOptions as SymDecoderOptions,
};
use symphonia_core::formats::Packet as SymPacket;

use self::adts::{AdtsHeader, find_sync};
use crate::adapter::{
    AdapterOptions, CodecAdapter, CodecFactory, DecodeOutput, RawInit, StreamConfig,
};
use crate::asc::AudioSpecificConfig;
use crate::pcm::PcmBlock;

/// 错误码: 缓冲区中找不到 ADTS 帧头
pub const FAULT_NO_SYNC: u8 = 1;
/// 错误码: 帧数据不完整
pub const FAULT_TRUNCATED: u8 = 2;
/// 错误码: 码流解码失败
pub const FAULT_BITSTREAM: u8 = 3;
/// 错误码: 句柄未初始化
pub const FAULT_NOT_READY: u8 = 4;

/// 初始化后的工作模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// 未初始化
    Idle,
    /// 容器访问单元
    Config,
    /// ADTS 裸流
    Raw,
}

/// symphonia AAC 适配器
pub struct SymphoniaAacAdapter {
    options: AdapterOptions,
    decoder: Option<SymAacDecoder>,
    mode: Mode,
    /// 下一个包的时间戳 (采样帧)
    next_ts: u64,
    /// 每帧输出的采样数 (核心帧长)
    frame_size: u32,
}

impl SymphoniaAacAdapter {
    /// 创建未初始化的适配器
    pub fn new(options: AdapterOptions) -> Self {
        Self {
            options,
            decoder: None,
            mode: Mode::Idle,
            next_ts: 0,
            frame_size: 1024,
        }
    }

    fn open_decoder(&mut self, asc: &[u8]) -> AacResult<()> {
        let params = SymCodecParameters {
            codec: CODEC_TYPE_AAC,
            extra_data: Some(asc.to_vec().into_boxed_slice()),
            ..Default::default()
        };
        let decoder = SymAacDecoder::try_new(&params, &SymDecoderOptions::default())
            .map_err(|e| AacError::ConfigInit(format!("symphonia aac 初始化失败: {e}")))?;
        self.decoder = Some(decoder);
        self.next_ts = 0;
        Ok(())
    }

    /// 解码一段已去除 ADTS 帧头的原始数据块
    fn decode_payload(&mut self, payload: &[u8], consumed: usize) -> DecodeOutput {
        let Some(decoder) = self.decoder.as_mut() else {
            return DecodeOutput::fault(FAULT_NOT_READY, "适配器未初始化");
        };

        let pkt = SymPacket::new_from_slice(0, self.next_ts, u64::from(self.frame_size), payload);
        match decoder.decode(&pkt) {
            Ok(decoded) => {
                let frames = decoded.frames();
                if frames == 0 {
                    return DecodeOutput::empty(consumed);
                }
                let spec = *decoded.spec();
                let mut sample_buf = SampleBuffer::<i16>::new(decoded.capacity() as u64, spec);
                sample_buf.copy_interleaved_ref(decoded);
                let channels = spec.channels.count() as u32;
                let pcm = PcmBlock::new(sample_buf.samples().to_vec(), channels, spec.rate);
                self.next_ts += frames as u64;
                DecodeOutput::decoded(pcm, consumed)
            }
            Err(e) => {
                let mut out = DecodeOutput::fault(FAULT_BITSTREAM, format!("symphonia aac: {e}"));
                out.bytes_consumed = consumed;
                out
            }
        }
    }

    fn decode_adts(&mut self, data: &[u8]) -> DecodeOutput {
        let legacy = self.options.legacy_adts;
        let header = match AdtsHeader::parse(data, legacy) {
            Some(h) => h,
            None => match find_sync(data, legacy) {
                Some((pos, _)) => {
                    debug!("ADTS 重新同步, 跳过 {pos} 字节");
                    return DecodeOutput::empty(pos);
                }
                None => return DecodeOutput::fault(FAULT_NO_SYNC, "未找到 ADTS 帧头"),
            },
        };
        if data.len() < header.frame_length {
            return DecodeOutput::fault(
                FAULT_TRUNCATED,
                format!("ADTS 帧不完整: 需要 {} 字节, 仅有 {}", header.frame_length, data.len()),
            );
        }
        let payload = header.payload(&data[..header.frame_length]);
        self.decode_payload(&payload, header.frame_length)
    }
}

impl CodecAdapter for SymphoniaAacAdapter {
    fn name(&self) -> &str {
        "symphonia-aac"
    }

    fn legacy_adts(&self) -> bool {
        self.options.legacy_adts
    }

    fn init(&mut self, config: &[u8]) -> AacResult<StreamConfig> {
        let asc = AudioSpecificConfig::parse(config)
            .map_err(|e| AacError::ConfigInit(format!("解码配置无效: {e}")))?;
        self.open_decoder(config)?;
        self.mode = Mode::Config;
        self.frame_size = asc.core_frame_size();
        if asc.sbr_present {
            warn!(
                "symphonia aac 不支持 SBR, 按核心采样率 {} Hz 输出 (配置声明 {} Hz)",
                asc.sample_rate,
                asc.output_sample_rate(),
            );
        }
        debug!(
            "symphonia aac 初始化: aot={}, {} Hz, {} 声道, 帧长 {}",
            asc.object_type,
            asc.sample_rate,
            asc.channel_count(),
            self.frame_size,
        );
        Ok(StreamConfig {
            sample_rate: asc.sample_rate,
            channels: asc.channel_count(),
        })
    }

    fn init_raw(&mut self, buffer: &[u8]) -> AacResult<RawInit> {
        let legacy = self.options.legacy_adts;
        let (offset, header) = find_sync(buffer, legacy)
            .ok_or_else(|| AacError::ConfigInit("缓冲区中没有可识别的 ADTS 帧".into()))?;
        if header.profile == 3 {
            return Err(AacError::ConfigInit("ADTS profile 3 (保留) 不受支持".into()));
        }
        let asc_bytes = AudioSpecificConfig::encode_adts(
            header.profile,
            header.sampling_index,
            header.channel_configuration,
        );
        let asc = AudioSpecificConfig::parse(&asc_bytes)
            .map_err(|e| AacError::ConfigInit(format!("ADTS 帧头无法转换为解码配置: {e}")))?;
        self.open_decoder(&asc_bytes)?;
        self.mode = Mode::Raw;
        self.frame_size = asc.core_frame_size();
        if offset > 0 {
            warn!("裸流起始处有 {offset} 字节无法识别的数据, 已跳过");
        }
        debug!(
            "symphonia aac 裸流初始化: legacy={legacy}, {} Hz, {} 声道",
            asc.sample_rate,
            asc.channel_count(),
        );
        Ok(RawInit {
            config: StreamConfig {
                sample_rate: asc.sample_rate,
                channels: asc.channel_count(),
            },
            bytes_consumed: offset,
        })
    }

    fn decode_unit(&mut self, data: &[u8]) -> DecodeOutput {
        match self.mode {
            Mode::Idle => DecodeOutput::fault(FAULT_NOT_READY, "适配器未初始化"),
            Mode::Config => self.decode_payload(data, data.len()),
            Mode::Raw => self.decode_adts(data),
        }
    }

    fn close(&mut self) {
        self.decoder = None;
        self.mode = Mode::Idle;
    }
}

/// symphonia AAC 适配器工厂
#[derive(Debug, Clone, Copy, Default)]
pub struct SymphoniaAacFactory;

impl CodecFactory for SymphoniaAacFactory {
    fn open(&self, options: AdapterOptions) -> AacResult<Box<dyn CodecAdapter>> {
        Ok(Box::new(SymphoniaAacAdapter::new(options)))
    }
}
