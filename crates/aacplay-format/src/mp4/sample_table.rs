//! MP4 采样表 (Sample Table) 解析.
//!
//! 采样表 (stbl) 给出从采样索引到文件偏移的完整映射, 由以下子 box 组成:
//! - stsd: 采样描述 (mp4a + esds 中的 AudioSpecificConfig)
//! - stsc: 采样→块映射 (压缩的 Run-Length 编码)
//! - stsz: 每个采样的字节大小
//! - stco/co64: 每个块的文件偏移
//!
//! 全部子 box 解析完成后调用 [`SampleTable::build_index`], 预先展开每个采样的偏移.
//! 声明的采样数必须能被 box 内容或数据大小容纳, 否则视为损坏的文件.

use aacplay_core::{AacError, AacResult};
use byteorder::{BigEndian, ByteOrder};
use log::debug;

use super::boxes::read_fullbox_header;
use crate::io::IoContext;

/// MPEG-4 Audio (objectTypeIndication)
const OTI_MPEG4_AUDIO: u8 = 0x40;

/// MPEG-2 AAC Main / LC / SSR (objectTypeIndication)
const OTI_MPEG2_AAC: [u8; 3] = [0x66, 0x67, 0x68];

/// 逐采样表预留容量上限
const MAX_RESERVED_SAMPLES: usize = 1 << 20;

/// 采样→块条目 (stsc)
#[derive(Debug, Clone)]
struct StscEntry {
    /// 起始块号 (1-based)
    first_chunk: u32,
    /// 每块的采样数
    samples_per_chunk: u32,
}

/// esds 中与播放相关的字段
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EsDescriptor {
    /// objectTypeIndication
    pub object_type: u8,
    /// 最大码率
    pub max_bitrate: u32,
    /// 平均码率
    pub avg_bitrate: u32,
    /// DecoderSpecificInfo (AudioSpecificConfig)
    pub decoder_specific_info: Option<Vec<u8>>,
}

impl EsDescriptor {
    /// 是否为 AAC 码流
    pub fn is_aac(&self) -> bool {
        self.object_type == OTI_MPEG4_AUDIO || OTI_MPEG2_AAC.contains(&self.object_type)
    }
}

/// 采样表
#[derive(Debug, Default)]
pub struct SampleTable {
    // === 来自 stsd 的信息 ===
    /// 采样条目 FourCC
    pub format: Option<[u8; 4]>,
    /// esds 描述
    pub esds: Option<EsDescriptor>,
    /// 音频采样率 (采样条目中的 16.16 定点整数部分)
    pub sample_rate: u32,
    /// 声道数
    pub channel_count: u32,

    // === stsc ===
    stsc_entries: Vec<StscEntry>,
    // === stsz ===
    /// 默认采样大小 (0 表示使用逐样本大小表)
    default_sample_size: u32,
    /// 逐样本大小表
    sample_sizes: Vec<u32>,
    /// 总采样数
    total_samples: u32,
    // === stco/co64 ===
    chunk_offsets: Vec<u64>,

    /// 展开后的逐采样偏移
    offsets: Vec<u64>,
}

impl SampleTable {
    /// 是否为 AAC 音频轨道
    pub fn is_aac(&self) -> bool {
        self.format == Some(*b"mp4a") && self.esds.as_ref().is_some_and(EsDescriptor::is_aac)
    }

    /// 解码配置
    pub fn decoder_config(&self) -> Option<&[u8]> {
        self.esds
            .as_ref()
            .and_then(|e| e.decoder_specific_info.as_deref())
            .filter(|c| !c.is_empty())
    }

    /// 获取总采样数
    pub fn sample_count(&self) -> u32 {
        if self.total_samples > 0 {
            self.total_samples
        } else {
            self.sample_sizes.len() as u32
        }
    }

    /// 获取指定采样的字节大小
    pub fn sample_size(&self, sample_idx: u32) -> u32 {
        if self.default_sample_size > 0 {
            self.default_sample_size
        } else {
            self.sample_sizes
                .get(sample_idx as usize)
                .copied()
                .unwrap_or(0)
        }
    }

    /// 获取指定采样在文件中的偏移量 (需先 `build_index`)
    pub fn sample_offset(&self, sample_idx: u32) -> Option<u64> {
        self.offsets.get(sample_idx as usize).copied()
    }

    /// 所有采样的总字节数
    pub fn total_bytes(&self) -> u64 {
        (0..self.sample_count())
            .map(|i| u64::from(self.sample_size(i)))
            .sum()
    }

    // === 解析方法 ===

    /// 解析 stsd (Sample Description Box), 只取第一个条目
    pub fn parse_stsd(&mut self, io: &mut IoContext, box_end: u64) -> AacResult<()> {
        read_fullbox_header(io)?;
        let entry_count = io.read_u32_be()?;
        if entry_count == 0 {
            return Ok(());
        }

        let entry_start = io.position()?;
        let entry_size = io.read_u32_be()?;
        let entry_format = io.read_tag()?;
        let entry_end = (entry_start + u64::from(entry_size)).min(box_end);
        self.format = Some(entry_format);

        if &entry_format == b"mp4a" {
            self.parse_audio_sample_entry(io, entry_end)?;
        } else {
            debug!(
                "MP4: 非 mp4a 采样条目 {}",
                String::from_utf8_lossy(&entry_format)
            );
        }
        Ok(())
    }

    /// 解析音频采样条目 (ISO 14496-12 AudioSampleEntry)
    fn parse_audio_sample_entry(&mut self, io: &mut IoContext, entry_end: u64) -> AacResult<()> {
        io.skip(6)?; // reserved
        let _data_ref_idx = io.read_u16_be()?;
        let version = io.read_u16_be()?;
        io.skip(6)?; // revision + vendor
        self.channel_count = u32::from(io.read_u16_be()?);
        let _sample_size = io.read_u16_be()?;
        io.skip(4)?; // pre_defined + reserved
        self.sample_rate = io.read_u32_be()? >> 16;

        // QuickTime 声音描述 v1/v2 的扩展字段
        match version {
            1 => io.skip(16)?,
            2 => io.skip(36)?,
            _ => {}
        }

        self.parse_codec_config_boxes(io, entry_end)
    }

    /// 在采样条目内寻找 esds
    fn parse_codec_config_boxes(&mut self, io: &mut IoContext, end: u64) -> AacResult<()> {
        while io.position()? + 8 <= end {
            let pos = io.position()?;
            let size = io.read_u32_be()?;
            let tag = io.read_tag()?;
            if size < 8 {
                break;
            }

            if &tag == b"esds" {
                let data = io.read_bytes(size as usize - 8)?;
                let esds = parse_esds(&data);
                debug!(
                    "MP4: esds oti=0x{:02X}, avg_bitrate={}, asc={:02X?}",
                    esds.object_type, esds.avg_bitrate, esds.decoder_specific_info
                );
                self.esds = Some(esds);
            }

            io.seek(std::io::SeekFrom::Start(pos + u64::from(size)))?;
        }
        Ok(())
    }

    /// 解析 stsc (Sample-to-Chunk Box)
    pub fn parse_stsc(&mut self, io: &mut IoContext) -> AacResult<()> {
        read_fullbox_header(io)?;
        let entry_count = io.read_u32_be()?;

        self.stsc_entries.reserve(entry_count.min(1 << 16) as usize);
        for _ in 0..entry_count {
            let first_chunk = io.read_u32_be()?;
            let samples_per_chunk = io.read_u32_be()?;
            let _sample_desc_idx = io.read_u32_be()?;
            self.stsc_entries.push(StscEntry {
                first_chunk,
                samples_per_chunk,
            });
        }
        Ok(())
    }

    /// 解析 stsz (Sample Size Box)
    ///
    /// 逐样本大小表的条目数不能超过 box 内容所能容纳的数量.
    pub fn parse_stsz(&mut self, io: &mut IoContext, box_end: u64) -> AacResult<()> {
        read_fullbox_header(io)?;
        self.default_sample_size = io.read_u32_be()?;
        self.total_samples = io.read_u32_be()?;

        if self.default_sample_size == 0 {
            let capacity = box_end.saturating_sub(io.position()?) / 4;
            if u64::from(self.total_samples) > capacity {
                return Err(AacError::InvalidData(format!(
                    "MP4: stsz 声明 {} 个采样, 但只容纳 {capacity} 个大小条目",
                    self.total_samples
                )));
            }
            self.sample_sizes
                .reserve((self.total_samples as usize).min(MAX_RESERVED_SAMPLES));
            for _ in 0..self.total_samples {
                self.sample_sizes.push(io.read_u32_be()?);
            }
        }
        Ok(())
    }

    /// 解析 stco/co64 (Chunk Offset Box)
    pub fn parse_stco(&mut self, io: &mut IoContext, is_64bit: bool) -> AacResult<()> {
        read_fullbox_header(io)?;
        let entry_count = io.read_u32_be()?;

        self.chunk_offsets.reserve(entry_count.min(1 << 20) as usize);
        for _ in 0..entry_count {
            let offset = if is_64bit {
                io.read_u64_be()?
            } else {
                u64::from(io.read_u32_be()?)
            };
            self.chunk_offsets.push(offset);
        }
        Ok(())
    }

    /// 展开逐采样偏移
    ///
    /// 按 stsc 的 run 遍历每个块, 块内采样偏移为块起点加上前面采样的大小之和.
    /// 块表不足以覆盖全部采样时, 只保留能定位到的部分.
    ///
    /// 统一采样大小时, 声明的总字节数超过 `data_size` 返回 `InvalidData`.
    pub fn build_index(&mut self, data_size: u64) -> AacResult<()> {
        let count = self.sample_count();
        if self.default_sample_size > 0 {
            let declared = u64::from(count) * u64::from(self.default_sample_size);
            if declared > data_size {
                return Err(AacError::InvalidData(format!(
                    "MP4: stsz 声明 {count} 个 {} 字节的采样, 超出数据大小 {data_size}",
                    self.default_sample_size
                )));
            }
        }

        let total = count as usize;
        let total_chunks = self.chunk_offsets.len();
        let mut offsets = Vec::with_capacity(total.min(MAX_RESERVED_SAMPLES));

        'runs: for (i, entry) in self.stsc_entries.iter().enumerate() {
            let first_chunk = (entry.first_chunk as usize).saturating_sub(1);
            let next_first = self
                .stsc_entries
                .get(i + 1)
                .map_or(total_chunks, |e| (e.first_chunk as usize).saturating_sub(1))
                .min(total_chunks);

            for chunk in first_chunk..next_first {
                let mut offset = self.chunk_offsets[chunk];
                for _ in 0..entry.samples_per_chunk {
                    if offsets.len() >= total {
                        break 'runs;
                    }
                    offsets.push(offset);
                    offset += u64::from(self.sample_size(offsets.len() as u32 - 1));
                }
            }
        }

        if offsets.len() < total {
            debug!("MP4: 块表只能定位 {}/{} 个采样", offsets.len(), total);
        }
        self.offsets = offsets;
        Ok(())
    }

    /// 可定位的采样数
    pub fn indexed_count(&self) -> u32 {
        self.offsets.len() as u32
    }
}

/// 解析 esds box 内容
///
/// esds 结构: version(1) + flags(3) + ES_Descriptor(tag=0x03)
///   → DecoderConfigDescriptor(tag=0x04)
///     → DecoderSpecificInfo(tag=0x05) = AudioSpecificConfig
pub fn parse_esds(esds_data: &[u8]) -> EsDescriptor {
    let mut esds = EsDescriptor::default();
    if esds_data.len() < 4 {
        return esds;
    }

    if let Some(dcd) = search_descriptor(&esds_data[4..], 0x04) {
        if dcd.len() >= 13 {
            esds.object_type = dcd[0];
            esds.max_bitrate = BigEndian::read_u32(&dcd[5..9]);
            esds.avg_bitrate = BigEndian::read_u32(&dcd[9..13]);
        }
    }
    esds.decoder_specific_info = search_descriptor(&esds_data[4..], 0x05).map(<[u8]>::to_vec);
    esds
}

/// 在 MPEG-4 描述符数据中递归搜索指定 tag 的 payload
fn search_descriptor(data: &[u8], target_tag: u8) -> Option<&[u8]> {
    let mut pos = 0;
    while pos < data.len() {
        let tag = data[pos];
        pos += 1;

        // 可变长度: 每字节高位为续标志, 低 7 位为值
        let mut len = 0usize;
        for _ in 0..4 {
            let b = *data.get(pos)?;
            pos += 1;
            len = (len << 7) | usize::from(b & 0x7F);
            if b & 0x80 == 0 {
                break;
            }
        }

        let desc_end = (pos + len).min(data.len());
        if tag == target_tag {
            return Some(&data[pos..desc_end]);
        }

        let header_skip = descriptor_header_size(tag, &data[pos..desc_end]);
        let child_start = (pos + header_skip).min(desc_end);
        if child_start < desc_end {
            if let Some(found) = search_descriptor(&data[child_start..desc_end], target_tag) {
                return Some(found);
            }
        }

        pos = desc_end;
    }
    None
}

/// 获取 MPEG-4 描述符固定头部大小
fn descriptor_header_size(tag: u8, payload: &[u8]) -> usize {
    match tag {
        0x03 => {
            // ES_Descriptor: ES_ID(2) + flags(1) + 可选字段
            if payload.len() < 3 {
                return payload.len();
            }
            let flags = payload[2];
            let mut skip = 3;
            if flags & 0x80 != 0 {
                skip += 2; // dependsOn_ES_ID
            }
            if flags & 0x40 != 0 && skip < payload.len() {
                skip += 1 + payload[skip] as usize; // URL
            }
            if flags & 0x20 != 0 {
                skip += 2; // OCR_ES_Id
            }
            skip
        }
        0x04 => 13, // objectType(1)+stream(1)+buf(3)+max(4)+avg(4)
        _ => 0,
    }
}
