//! 格式嗅探.
//!
//! 判断一个字节源是 ADTS 裸流、MP4 容器还是无法识别. ADTS 没有全局魔数,
//! 只能在探测窗口内统计可解析的帧数; 失败后再看 `ftyp` 与 ID3 前缀.
//!
//! 嗅探结束后字节源会回到调用前的位置.

use std::io::SeekFrom;
use std::path::Path;

use aacplay_core::{AacError, AacResult};
use log::{debug, trace};

use crate::adts::{self, ADTS_HEADER_LEN, SCAN_HEADER_LEN};
use crate::io::IoContext;

/// 默认探测窗口 (字节)
pub const DEFAULT_PROBE_WINDOW: u64 = 32768;

/// 默认所需有效帧数
pub const DEFAULT_PROBE_FRAMES: u32 = 8;

/// ID3 前缀流允许的扩展名
const ID3_CONTAINER_EXTENSIONS: [&str; 3] = ["mp4", "m4a", "aac"];

/// 码流分类结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamClassification {
    /// ADTS 裸流
    RawAdts,
    /// MP4/M4A 容器 (含 ID3 前缀 + 扩展名匹配的情况)
    Mp4Container,
    /// 无法识别
    Unrecognized,
}

impl StreamClassification {
    /// 是否可以播放
    pub fn is_playable(self) -> bool {
        !matches!(self, Self::Unrecognized)
    }
}

impl std::fmt::Display for StreamClassification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::RawAdts => "adts",
            Self::Mp4Container => "mp4",
            Self::Unrecognized => "unknown",
        };
        write!(f, "{s}")
    }
}

/// 嗅探参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SniffConfig {
    /// 探测窗口 (字节)
    pub probe_window_bytes: u64,
    /// 判定为裸流所需的有效帧数
    pub probe_min_frames: u32,
}

impl Default for SniffConfig {
    fn default() -> Self {
        Self {
            probe_window_bytes: DEFAULT_PROBE_WINDOW,
            probe_min_frames: DEFAULT_PROBE_FRAMES,
        }
    }
}

/// 对字节源分类
///
/// `file_name` 用于 ID3 前缀时的扩展名判断, 可以是完整路径.
pub fn sniff(
    io: &mut IoContext,
    file_name: Option<&str>,
    config: &SniffConfig,
) -> AacResult<StreamClassification> {
    let start = io.position()?;
    let result = sniff_inner(io, file_name, config);
    io.seek(SeekFrom::Start(start))?;
    let class = result?;
    debug!("嗅探结果: {class} ({})", file_name.unwrap_or("<内存>"));
    Ok(class)
}

/// 打开文件并分类
pub fn sniff_path(path: impl AsRef<Path>, config: &SniffConfig) -> AacResult<StreamClassification> {
    let path = path.as_ref();
    let mut io = IoContext::open_read(path)?;
    sniff(&mut io, path.to_str(), config)
}

fn sniff_inner(
    io: &mut IoContext,
    file_name: Option<&str>,
    config: &SniffConfig,
) -> AacResult<StreamClassification> {
    let start = io.position()?;
    let mut magic = [0u8; 8];
    let magic_len = io.read(&mut magic)?;
    io.seek(SeekFrom::Start(start))?;

    if is_raw_adts(io, config)? {
        return Ok(StreamClassification::RawAdts);
    }

    if magic_len >= 8 && &magic[4..8] == b"ftyp" {
        return Ok(StreamClassification::Mp4Container);
    }
    if magic_len >= 3 && &magic[..3] == b"ID3" {
        if file_name.is_some_and(has_container_extension) {
            return Ok(StreamClassification::Mp4Container);
        }
        debug!("ID3 前缀但扩展名不在允许列表中");
    }
    Ok(StreamClassification::Unrecognized)
}

/// 扩展名是否属于 ID3 前缀容器允许列表 (不区分大小写)
pub fn has_container_extension(file_name: &str) -> bool {
    Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| {
            ID3_CONTAINER_EXTENSIONS
                .iter()
                .any(|allowed| ext.eq_ignore_ascii_case(allowed))
        })
}

/// 从当前位置探测是否为 ADTS 裸流
///
/// 逐字节寻找 0xFF, 对其后的帧头做一次扫描; 成功则跳过整帧并计数,
/// 失败则从已读位置继续寻找. 在探测窗口内累计到所需帧数即判定成功;
/// 先到达流末尾或超出窗口则失败. 结束后恢复原位置.
pub fn is_raw_adts(io: &mut IoContext, config: &SniffConfig) -> AacResult<bool> {
    let start = io.position()?;
    let result = scan_frames(io, start, config);
    io.seek(SeekFrom::Start(start))?;
    match result {
        Ok(found) => Ok(found >= config.probe_min_frames),
        Err(e) if e.is_eof() => Ok(false),
        Err(e) => Err(e),
    }
}

/// 返回窗口内找到的帧数 (到达所需帧数即提前返回)
fn scan_frames(io: &mut IoContext, start: u64, config: &SniffConfig) -> AacResult<u32> {
    let window = config.probe_window_bytes;
    let mut found = 0u32;
    let mut probed = start;

    while probed - start <= window && found < config.probe_min_frames {
        // 寻找同步字节
        let mut c = 0u8;
        while c != 0xFF {
            if probed - start > window {
                return Ok(found);
            }
            c = io.read_u8()?;
            probed += 1;
        }

        let mut header = [0u8; SCAN_HEADER_LEN + 1];
        header[0] = 0xFF;
        io.read_exact(&mut header[1..])?;

        let len = adts::frame_length(&header) as usize;
        if len >= ADTS_HEADER_LEN {
            found += 1;
            trace!("ADTS 探测: 第 {found} 帧, 偏移 {}, 长度 {len}", probed - 1);
            io.seek(SeekFrom::Current(len as i64 - header.len() as i64))?;
        }
        probed = io.position()?;
    }

    Ok(found)
}

/// 嗅探失败时给出的统一错误
pub fn unrecognized_error(file_name: Option<&str>) -> AacError {
    AacError::Unsupported(format!(
        "无法识别的码流格式: {}",
        file_name.unwrap_or("<内存>")
    ))
}
