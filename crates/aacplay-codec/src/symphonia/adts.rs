//! 完整 ADTS 帧头解析 (供 symphonia 后端拆帧).
//!
//! 与探测用的帧扫描器不同, 这里按 ISO 13818-7 逐字段读取, 并支持旧版约定:
//! 2002 年勘误之前, MPEG-4 (ID=0) 帧头在 `home` 之后还有 2 bit `emphasis`,
//! 帧头因此变为 58 bit (带 CRC 为 74 bit), 负载不再按字节对齐.

use aacplay_core::bitreader::BitReader;

/// 最短帧头字节数 (无 CRC)
pub const ADTS_MIN_HEADER: usize = 7;

/// 解析出的 ADTS 帧头
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdtsHeader {
    /// MPEG 版本标识 (0 = MPEG-4, 1 = MPEG-2)
    pub id: u8,
    /// profile (audioObjectType - 1)
    pub profile: u8,
    /// 采样率索引
    pub sampling_index: u8,
    /// 声道配置
    pub channel_configuration: u8,
    /// 是否携带 CRC
    pub has_crc: bool,
    /// 整帧长度 (含帧头)
    pub frame_length: usize,
    /// 帧头位数
    pub header_bits: usize,
    /// 帧内原始数据块数
    pub raw_blocks: u8,
}

impl AdtsHeader {
    /// 在 `data` 起始处解析帧头, 失败返回 None
    pub fn parse(data: &[u8], legacy: bool) -> Option<Self> {
        if data.len() < ADTS_MIN_HEADER + 1 {
            return None;
        }
        let mut br = BitReader::new(data);
        if br.read_bits(12).ok()? != 0xFFF {
            return None;
        }
        let id = br.read_bits(1).ok()? as u8;
        let layer = br.read_bits(2).ok()?;
        if layer != 0 {
            return None;
        }
        let protection_absent = br.read_flag().ok()?;
        let profile = br.read_bits(2).ok()? as u8;
        let sampling_index = br.read_bits(4).ok()? as u8;
        if sampling_index > 12 {
            return None;
        }
        br.skip_bits(1).ok()?; // private_bit
        let channel_configuration = br.read_bits(3).ok()? as u8;
        br.skip_bits(2).ok()?; // original_copy, home
        if legacy && id == 0 {
            br.skip_bits(2).ok()?; // emphasis
        }
        br.skip_bits(2).ok()?; // copyright_id_bit, copyright_id_start
        let frame_length = br.read_bits(13).ok()? as usize;
        br.skip_bits(11).ok()?; // buffer_fullness
        let raw_blocks = br.read_bits(2).ok()? as u8 + 1;

        let mut header_bits = br.bits_read();
        if !protection_absent {
            header_bits += 16;
        }
        if frame_length * 8 <= header_bits {
            return None;
        }

        Some(Self {
            id,
            profile,
            sampling_index,
            channel_configuration,
            has_crc: !protection_absent,
            frame_length,
            header_bits,
            raw_blocks,
        })
    }

    /// 从完整帧中取出负载 (帧头不对齐时按位平移)
    pub fn payload(&self, frame: &[u8]) -> Vec<u8> {
        let start = self.header_bits / 8;
        let shift = (self.header_bits % 8) as u32;
        let end = self.frame_length.min(frame.len());
        if shift == 0 {
            return frame[start.min(end)..end].to_vec();
        }

        let len = (end * 8).saturating_sub(self.header_bits) / 8;
        let mut out = Vec::with_capacity(len);
        for i in 0..len {
            let hi = frame[start + i] << shift;
            let lo = frame[start + i + 1] >> (8 - shift);
            out.push(hi | lo);
        }
        out
    }
}

/// 从 `data` 起始处查找首个可解析的帧头, 返回其偏移
pub fn find_sync(data: &[u8], legacy: bool) -> Option<(usize, AdtsHeader)> {
    (0..data.len().saturating_sub(ADTS_MIN_HEADER)).find_map(|pos| {
        if data[pos] != 0xFF {
            return None;
        }
        AdtsHeader::parse(&data[pos..], legacy).map(|h| (pos, h))
    })
}
