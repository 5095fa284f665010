//! ADTS 帧扫描器.
//!
//! 无状态地识别缓冲区中某个偏移处的一个 ADTS 帧头, 供格式嗅探使用.
//!
//! # ADTS 帧头 (7 或 9 字节)
//! ```text
//! byte 0      sync (0xFF)
//! byte 1      sync(4) ID(1) layer(2) protection_absent(1)
//! byte 2      profile(2) sampling_frequency_index(4) private(1) ch高位(1)
//! byte 3..5   ... frame_length(13) 跨 byte3 低 2 位 / byte4 / byte5 高 3 位
//! byte 6      buffer_fullness 低位 + raw_data_blocks
//! ```
//!
//! 这里只做扫描所需的最少判断; 解码用的完整字段解析在解码器适配层.

/// ADTS 采样率表 (索引 0-11)
pub const ADTS_SAMPLE_RATES: [u32; 12] = [
    96000, 88200, 64000, 48000, 44100, 32000, 24000, 22050, 16000, 12000, 11025, 8000,
];

/// 扫描器需要的最少字节数
pub const SCAN_HEADER_LEN: usize = 7;

/// ADTS 帧头最短长度 (无 CRC)
pub const ADTS_HEADER_LEN: usize = 7;

/// ID3v2 标签头长度
pub const ID3V2_HEADER_LEN: usize = 10;

/// 扫描得到的 ADTS 帧头
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdtsFrameHeader {
    /// 采样率
    pub sample_rate: u32,
    /// 帧内块数
    ///
    /// 取值为 `(byte6 & 0x02) + 1`, 即 1 或 3, 与标准的 2 bit 字段并不一致;
    /// 该值仅供参考, 不参与任何时长计算.
    pub samples_per_frame_code: u8,
    /// 整帧长度 (含帧头)
    pub frame_length_bytes: u32,
}

/// 尝试在 `buf` 起始处解析一个 ADTS 帧头
///
/// 同步判断只看 `byte0 == 0xFF` 与 `byte1 & 0xF6 == 0xF0`, 忽略区分
/// MPEG-2/MPEG-4 的 ID 位和保护位. 采样率索引 12-15 视为无效.
/// 长度不足 7 字节时返回 None.
pub fn parse_frame(buf: &[u8]) -> Option<AdtsFrameHeader> {
    if buf.len() < SCAN_HEADER_LEN {
        return None;
    }
    if buf[0] != 0xFF || (buf[1] & 0xF6) != 0xF0 {
        return None;
    }

    let sr_index = ((buf[2] >> 2) & 0x0F) as usize;
    let sample_rate = *ADTS_SAMPLE_RATES.get(sr_index)?;

    let frame_length = (u32::from(buf[3] & 0x03) << 11)
        | (u32::from(buf[4]) << 3)
        | (u32::from(buf[5] >> 5) & 0x07);

    Some(AdtsFrameHeader {
        sample_rate,
        samples_per_frame_code: (buf[6] & 0x02) + 1,
        frame_length_bytes: frame_length,
    })
}

/// `buf` 起始处有效帧的声道配置 (0 表示由码流内 PCE 指定)
pub fn channel_configuration(buf: &[u8]) -> Option<u8> {
    parse_frame(buf)?;
    Some(((buf[2] & 0x01) << 2) | (buf[3] >> 6))
}

/// 返回 `buf` 起始处的帧长 (0 表示此处不是有效帧)
pub fn frame_length(buf: &[u8]) -> u32 {
    parse_frame(buf).map_or(0, |h| h.frame_length_bytes)
}

/// 解析 ID3v2 syncsafe 整数 (每字节 7 位有效)
pub fn syncsafe_u32(bytes: [u8; 4]) -> u32 {
    (u32::from(bytes[0] & 0x7F) << 21)
        | (u32::from(bytes[1] & 0x7F) << 14)
        | (u32::from(bytes[2] & 0x7F) << 7)
        | u32::from(bytes[3] & 0x7F)
}

/// 若 `buf` 以 ID3v2 标签开头, 返回整个标签 (含 10 字节头) 的长度
pub fn id3v2_tag_len(buf: &[u8]) -> Option<usize> {
    if buf.len() < ID3V2_HEADER_LEN || &buf[..3] != b"ID3" {
        return None;
    }
    let size = syncsafe_u32([buf[6], buf[7], buf[8], buf[9]]);
    Some(size as usize + ID3V2_HEADER_LEN)
}
