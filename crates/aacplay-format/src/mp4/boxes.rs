//! MP4 Box (Atom) 头部解析.
//!
//! ISO 14496-12 定义的 Box 结构:
//! ```text
//! Size:       4 bytes (big-endian, 含头部本身)
//! Type:       4 bytes (FourCC)
//! [ExtSize]:  8 bytes (仅当 Size==1 时存在, 64-bit 大小)
//! ```
//!
//! 特殊大小值:
//! - 0: Box 延伸到文件末尾
//! - 1: 使用 64-bit 扩展大小

use aacplay_core::{AacError, AacResult};

use crate::io::IoContext;

/// Box 类型枚举 (播放路径用到的 FourCC)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoxType {
    /// ftyp - 文件类型
    Ftyp,
    /// moov - 影片元数据
    Moov,
    /// trak - 轨道
    Trak,
    /// mdia - 媒体
    Mdia,
    /// mdhd - 媒体头部
    Mdhd,
    /// hdlr - 处理器引用
    Hdlr,
    /// minf - 媒体信息
    Minf,
    /// stbl - 采样表
    Stbl,
    /// stsd - 采样描述
    Stsd,
    /// stsc - 采样→块映射
    Stsc,
    /// stsz - 采样大小
    Stsz,
    /// stco - 块偏移 (32位)
    Stco,
    /// co64 - 块偏移 (64位)
    Co64,
    /// udta - 用户数据
    Udta,
    /// meta - 元数据
    Meta,
    /// ilst - iTunes 标签列表
    Ilst,
    /// mdat - 媒体数据
    Mdat,
    /// 未知 box 类型
    Unknown([u8; 4]),
}

impl BoxType {
    /// 从 4 字节 FourCC 创建
    pub fn from_fourcc(fourcc: &[u8; 4]) -> Self {
        match fourcc {
            b"ftyp" => Self::Ftyp,
            b"moov" => Self::Moov,
            b"trak" => Self::Trak,
            b"mdia" => Self::Mdia,
            b"mdhd" => Self::Mdhd,
            b"hdlr" => Self::Hdlr,
            b"minf" => Self::Minf,
            b"stbl" => Self::Stbl,
            b"stsd" => Self::Stsd,
            b"stsc" => Self::Stsc,
            b"stsz" => Self::Stsz,
            b"stco" => Self::Stco,
            b"co64" => Self::Co64,
            b"udta" => Self::Udta,
            b"meta" => Self::Meta,
            b"ilst" => Self::Ilst,
            b"mdat" => Self::Mdat,
            _ => Self::Unknown(*fourcc),
        }
    }
}

impl std::fmt::Display for BoxType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unknown(cc) => write!(f, "{}", String::from_utf8_lossy(cc)),
            _ => write!(f, "{self:?}"),
        }
    }
}

/// 已解析的 Box 头部
#[derive(Debug, Clone, Copy)]
pub struct BoxHeader {
    /// Box 总大小 (含头部, 0 表示到文件末尾)
    pub size: u64,
    /// Box 类型
    pub box_type: BoxType,
    /// 头部大小 (8 或 16 字节)
    pub header_size: u64,
}

impl BoxHeader {
    /// 内容区域大小 (不含头部)
    pub fn content_size(&self) -> u64 {
        if self.size == 0 {
            u64::MAX
        } else {
            self.size - self.header_size
        }
    }

    /// 根据内容起点和上级边界计算本 box 的结束位置
    pub fn end(&self, content_start: u64, parent_end: u64) -> u64 {
        if self.size == 0 {
            parent_end
        } else {
            content_start.saturating_add(self.content_size()).min(parent_end)
        }
    }
}

/// 读取一个 Box 头部
pub fn read_box_header(io: &mut IoContext) -> AacResult<BoxHeader> {
    let size32 = io.read_u32_be()?;
    let fourcc = io.read_tag()?;
    let box_type = BoxType::from_fourcc(&fourcc);

    let (size, header_size) = if size32 == 1 {
        (io.read_u64_be()?, 16u64)
    } else {
        (u64::from(size32), 8u64)
    };

    if size != 0 && size < header_size {
        return Err(AacError::InvalidData(format!(
            "MP4: box {box_type} 大小 {size} 小于头部"
        )));
    }

    Ok(BoxHeader {
        size,
        box_type,
        header_size,
    })
}

/// 读取 FullBox 的 version 与 flags
pub fn read_fullbox_header(io: &mut IoContext) -> AacResult<(u8, u32)> {
    let version = io.read_u8()?;
    let flags = io.read_u24_be()?;
    Ok((version, flags))
}
