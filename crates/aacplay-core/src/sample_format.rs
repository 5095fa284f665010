//! PCM 采样格式定义.
//!
//! 播放输出端按此格式接收交错 PCM 数据.

use std::fmt;

/// PCM 采样格式 (交错)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum SampleFormat {
    /// 未指定
    None,
    /// 有符号 16 位整数, 本机字节序
    S16,
    /// 有符号 32 位整数, 本机字节序
    S32,
    /// 32 位浮点
    F32,
}

impl SampleFormat {
    /// 每个采样点占用的字节数
    pub const fn bytes_per_sample(&self) -> u32 {
        match self {
            Self::None => 0,
            Self::S16 => 2,
            Self::S32 | Self::F32 => 4,
        }
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "none",
            Self::S16 => "s16",
            Self::S32 => "s32",
            Self::F32 => "flt",
        };
        write!(f, "{name}")
    }
}
