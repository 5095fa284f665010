//! 只读元数据探测.
//!
//! 不打开输出、不启动解码线程, 供播放列表浏览使用. 探测失败时
//! [`probe_path`] 返回 None 而不是错误, 一个坏文件不影响其他文件.

use std::io::SeekFrom;
use std::path::Path;

use aacplay_codec::AudioSpecificConfig;
use aacplay_core::{AacError, AacResult};
use aacplay_format::adts::{self, SCAN_HEADER_LEN};
use aacplay_format::sniff::unrecognized_error;
use aacplay_format::{ContainerDemuxer, IoContext, Mp4Demuxer, StreamClassification, sniff};
use log::debug;
use serde::Serialize;

use crate::config::EngineConfig;
use crate::timing;

/// 轨道元数据快照
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TrackMetadata {
    /// 码流类型 (`adts` / `mp4`)
    pub format: String,
    pub title: Option<String>,
    pub album: Option<String>,
    pub artist: Option<String>,
    pub genre: Option<String>,
    /// 日期标签开头的年份
    pub year: Option<i32>,
    /// 总时长 (毫秒), 裸流未知
    pub duration_ms: Option<u64>,
    /// 平均码率 (bit/s), 裸流未知
    pub bitrate: Option<u32>,
    pub sample_rate: u32,
    pub channels: u32,
    /// 文件名 (含扩展名)
    pub file_name: Option<String>,
    /// 所在目录
    pub file_path: Option<String>,
    /// 扩展名 (不含点)
    pub file_ext: Option<String>,
}

impl TrackMetadata {
    /// 显示标题: 标题标签, 缺失时为去掉扩展名的文件名
    pub fn display_title(&self) -> String {
        match &self.title {
            Some(title) if !title.is_empty() => title.clone(),
            _ => self
                .file_name
                .as_deref()
                .map(fallback_title)
                .unwrap_or_default(),
        }
    }

    fn set_file_fields(&mut self, name: &str) {
        let path = Path::new(name);
        self.file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned());
        self.file_path = path
            .parent()
            .map(|p| p.to_string_lossy().into_owned())
            .filter(|p| !p.is_empty());
        self.file_ext = path
            .extension()
            .map(|e| e.to_string_lossy().into_owned());
    }
}

/// 去掉目录与扩展名的文件名
pub fn fallback_title(name: &str) -> String {
    let path = Path::new(name);
    path.file_stem()
        .or_else(|| path.file_name())
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_string())
}

/// 解析日期开头的整数 (`"2004-05-01"` → 2004)
pub fn parse_year(date: &str) -> Option<i32> {
    let s = date.trim_start();
    let (sign, digits) = match s.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, s.strip_prefix('+').unwrap_or(s)),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }
    digits[..end].parse::<i32>().ok().map(|y| sign * y)
}

/// 探测文件, 失败时返回 None
pub fn probe_path(path: impl AsRef<Path>, config: &EngineConfig) -> Option<TrackMetadata> {
    let path = path.as_ref();
    match try_probe_path(path, config) {
        Ok(meta) => Some(meta),
        Err(e) => {
            debug!("无法读取元数据 {}: {e}", path.display());
            None
        }
    }
}

/// 探测文件
pub fn try_probe_path(path: impl AsRef<Path>, config: &EngineConfig) -> AacResult<TrackMetadata> {
    let path = path.as_ref();
    let mut io = IoContext::open_read(path)?;
    probe_io(&mut io, path.to_str(), config)
}

/// 探测字节源
pub fn probe_io(
    io: &mut IoContext,
    file_name: Option<&str>,
    config: &EngineConfig,
) -> AacResult<TrackMetadata> {
    let classification = sniff(io, file_name, &config.sniff_config())?;
    let mut meta = match classification {
        StreamClassification::Mp4Container => probe_container(io, config)?,
        StreamClassification::RawAdts => probe_raw(io, config)?,
        StreamClassification::Unrecognized => return Err(unrecognized_error(file_name)),
    };
    meta.format = classification.to_string();
    if let Some(name) = file_name {
        meta.set_file_fields(name);
    }
    Ok(meta)
}

fn probe_container(io: &mut IoContext, config: &EngineConfig) -> AacResult<TrackMetadata> {
    let mut demuxer = Mp4Demuxer::new();
    demuxer.open(io)?;
    let track = demuxer
        .select_audio_track()
        .ok_or(AacError::UnsupportedTrack)?;
    let asc = demuxer
        .decoder_config(track)
        .ok_or_else(|| AacError::ConfigInit("轨道缺少解码配置".into()))?;
    let asc = AudioSpecificConfig::parse(asc)?;

    let sample_rate = asc.output_sample_rate();
    let sample_count = demuxer.sample_count(track);
    let tags = demuxer.tags().clone();

    Ok(TrackMetadata {
        title: tags.title,
        album: tags.album,
        artist: tags.artist,
        genre: tags.genre,
        year: tags.date.as_deref().and_then(parse_year),
        duration_ms: Some(timing::duration_ms(
            sample_count,
            asc.frame_size(),
            sample_rate,
            config.timing,
        )),
        bitrate: demuxer.average_bitrate(track),
        sample_rate,
        channels: asc.channel_count(),
        ..TrackMetadata::default()
    })
}

/// 裸流只能从第一个帧头得到采样率与声道数
fn probe_raw(io: &mut IoContext, config: &EngineConfig) -> AacResult<TrackMetadata> {
    let start = io.position()?;
    let mut buf = vec![0u8; config.max_in_flight_bytes];
    let mut len = read_full(io, &mut buf)?;
    if let Some(tag_len) = adts::id3v2_tag_len(&buf[..len]) {
        io.seek(SeekFrom::Start(start + tag_len as u64))?;
        len = read_full(io, &mut buf)?;
    }
    io.seek(SeekFrom::Start(start))?;

    let data = &buf[..len];
    let (offset, header) = (0..data.len().saturating_sub(SCAN_HEADER_LEN - 1))
        .find_map(|i| adts::parse_frame(&data[i..]).map(|h| (i, h)))
        .ok_or_else(|| AacError::InvalidData("未找到 ADTS 帧头".into()))?;
    let channels = adts::channel_configuration(&data[offset..]).unwrap_or(0);

    Ok(TrackMetadata {
        sample_rate: header.sample_rate,
        channels: u32::from(channels),
        ..TrackMetadata::default()
    })
}

fn read_full(io: &mut IoContext, buf: &mut [u8]) -> AacResult<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = io.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}
