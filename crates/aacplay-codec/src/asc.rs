//! AudioSpecificConfig 解析 (ISO 14496-3 1.6.2.1).
//!
//! MP4 容器中 `esds` 描述符携带的解码配置. 播放时只关心其中几项:
//! 采样率、声道配置、`frameLengthFlag` 以及是否存在 SBR 扩展,
//! 后两者决定每帧采样数.
//!
//! ```text
//! audioObjectType           5 bits (31 表示再读 6 bits 扩展)
//! samplingFrequencyIndex    4 bits (15 表示再读 24 bits 显式采样率)
//! channelConfiguration      4 bits
//! [显式 SBR: AOT=5/29 时读取扩展采样率和真实 AOT]
//! GASpecificConfig:
//!   frameLengthFlag         1 bit  (1 = 960 点帧)
//!   dependsOnCoreCoder      1 bit  [+ coreCoderDelay 14 bits]
//!   extensionFlag           1 bit
//! [后向兼容 SBR 信令: syncExtensionType=0x2B7]
//! ```

use aacplay_core::bitreader::BitReader;
use aacplay_core::{AacError, AacResult};

/// AAC 采样率索引表 (ISO 14496-3)
pub const AAC_SAMPLE_RATES: [u32; 13] = [
    96000, 88200, 64000, 48000, 44100, 32000, 24000, 22050, 16000, 12000, 11025, 8000, 7350,
];

/// 基础帧长 (采样数)
const BASE_FRAME_SIZE: u32 = 1024;

/// 短帧长 (frameLengthFlag = 1)
const SHORT_FRAME_SIZE: u32 = 960;

/// SBR 扩展对象类型
const AOT_SBR: u8 = 5;

/// PS 扩展对象类型 (隐含 SBR)
const AOT_PS: u8 = 29;

/// 后向兼容扩展的同步字
const SYNC_EXTENSION_SBR: u32 = 0x2B7;

/// 已解析的 AudioSpecificConfig
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioSpecificConfig {
    /// 对象类型 (2 = AAC-LC)
    pub object_type: u8,
    /// 采样率索引 (显式采样率时为 15)
    pub sampling_index: u8,
    /// 核心采样率
    pub sample_rate: u32,
    /// 声道配置 (0 表示由 PCE 定义)
    pub channel_configuration: u8,
    /// 960 点短帧标志
    pub frame_length_flag: bool,
    /// 是否存在 SBR
    pub sbr_present: bool,
    /// SBR 输出采样率 (仅在信令中显式给出时)
    pub extension_sample_rate: Option<u32>,
}

impl AudioSpecificConfig {
    /// 解析 AudioSpecificConfig 字节
    pub fn parse(data: &[u8]) -> AacResult<Self> {
        if data.len() < 2 {
            return Err(AacError::InvalidData(format!(
                "AudioSpecificConfig 过短: {} 字节",
                data.len()
            )));
        }

        let mut br = BitReader::new(data);
        let mut object_type = read_object_type(&mut br)?;
        let (sampling_index, sample_rate) = read_sampling_frequency(&mut br)?;
        let channel_configuration = br.read_bits(4)? as u8;

        let mut sbr_present = false;
        let mut extension_sample_rate = None;
        let explicit_sbr = object_type == AOT_SBR || object_type == AOT_PS;
        if explicit_sbr {
            sbr_present = true;
            let (_, ext_rate) = read_sampling_frequency(&mut br)?;
            extension_sample_rate = Some(ext_rate);
            object_type = read_object_type(&mut br)?;
        }

        let mut frame_length_flag = false;
        if is_ga_object_type(object_type) {
            frame_length_flag = br.read_flag()?;
            if br.read_flag()? {
                br.skip_bits(14)?; // coreCoderDelay
            }
            let extension_flag = br.read_flag()?;
            // channelConfiguration=0 时紧跟 PCE, 这里不展开, 只取到帧长标志为止
            if channel_configuration != 0 {
                if object_type == 6 || object_type == 20 {
                    br.skip_bits(3)?; // layerNr
                }
                if extension_flag {
                    if object_type == 22 {
                        br.skip_bits(5 + 11)?;
                    }
                    if matches!(object_type, 17 | 19 | 20 | 23) {
                        br.skip_bits(3)?;
                    }
                    br.skip_bits(1)?; // extensionFlag3
                }

                if !explicit_sbr && br.bits_left() >= 16 {
                    if let Some(rate) = read_sync_extension(&mut br)? {
                        sbr_present = true;
                        extension_sample_rate = rate;
                    }
                }
            }
        }

        Ok(Self {
            object_type,
            sampling_index,
            sample_rate,
            channel_configuration,
            frame_length_flag,
            sbr_present,
            extension_sample_rate,
        })
    }

    /// 每帧采样数
    ///
    /// 基础 1024, 短帧标志置位时为 960; 存在 SBR 时在所选基础上翻倍.
    pub fn frame_size(&self) -> u32 {
        let base = self.core_frame_size();
        if self.sbr_present { base * 2 } else { base }
    }

    /// 核心编码器每帧采样数 (不计 SBR)
    pub fn core_frame_size(&self) -> u32 {
        if self.frame_length_flag {
            SHORT_FRAME_SIZE
        } else {
            BASE_FRAME_SIZE
        }
    }

    /// 声道数 (配置 0 返回 0, 7 对应 7.1 共 8 声道)
    pub fn channel_count(&self) -> u32 {
        match self.channel_configuration {
            7 => 8,
            n => u32::from(n),
        }
    }

    /// 解码输出采样率 (SBR 时为扩展采样率)
    pub fn output_sample_rate(&self) -> u32 {
        if self.sbr_present {
            self.extension_sample_rate
                .unwrap_or(self.sample_rate.saturating_mul(2))
        } else {
            self.sample_rate
        }
    }

    /// 由 ADTS 帧头字段构造 2 字节 AudioSpecificConfig
    ///
    /// ADTS profile + 1 即 audioObjectType.
    pub fn encode_adts(profile: u8, sampling_index: u8, channel_configuration: u8) -> [u8; 2] {
        let aot = profile + 1;
        [
            (aot << 3) | (sampling_index >> 1),
            ((sampling_index & 1) << 7) | (channel_configuration << 3),
        ]
    }
}

fn read_object_type(br: &mut BitReader<'_>) -> AacResult<u8> {
    let aot = br.read_bits(5)? as u8;
    if aot == 31 {
        Ok(32 + br.read_bits(6)? as u8)
    } else {
        Ok(aot)
    }
}

fn read_sampling_frequency(br: &mut BitReader<'_>) -> AacResult<(u8, u32)> {
    let index = br.read_bits(4)? as u8;
    if index == 0x0F {
        return Ok((index, br.read_bits(24)?));
    }
    let rate = AAC_SAMPLE_RATES
        .get(index as usize)
        .copied()
        .ok_or_else(|| AacError::InvalidData(format!("保留的采样率索引: {index}")))?;
    Ok((index, rate))
}

/// GASpecificConfig 适用的对象类型
fn is_ga_object_type(aot: u8) -> bool {
    matches!(aot, 1 | 2 | 3 | 4 | 6 | 7 | 17 | 19 | 20 | 21 | 22 | 23)
}

/// 解析后向兼容的 SBR 扩展信令
///
/// 返回 `Some(rate)` 表示 sbrPresentFlag=1 (rate 为可选的扩展采样率).
fn read_sync_extension(br: &mut BitReader<'_>) -> AacResult<Option<Option<u32>>> {
    if br.peek_bits(11)? != SYNC_EXTENSION_SBR {
        return Ok(None);
    }
    br.skip_bits(11)?;
    let ext_type = read_object_type(br)?;
    if ext_type != AOT_SBR {
        return Ok(None);
    }
    if !br.read_flag()? {
        return Ok(None);
    }
    let rate = match read_sampling_frequency(br) {
        Ok((_, rate)) => Some(rate),
        Err(AacError::Eof) => None,
        Err(e) => return Err(e),
    };
    Ok(Some(rate))
}
