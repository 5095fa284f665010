//! MP4/M4A (ISO Base Media File Format) 解封装器.
//!
//! 只解析播放 AAC 音频所需的部分.
//!
//! # Box 树结构
//! ```text
//! ftyp                  文件类型
//! moov                  影片元数据
//! ├── trak              轨道
//! │   └── mdia
//! │       ├── mdhd      媒体头部 (时间刻度, 时长)
//! │       ├── hdlr      处理器引用 (soun)
//! │       └── minf
//! │           └── stbl  采样表 (stsd/stsc/stsz/stco/co64)
//! └── udta
//!     └── meta
//!         └── ilst      iTunes 标签
//! mdat                  媒体数据
//! ```

mod boxes;
mod meta;
mod sample_table;

pub use meta::genre_name;
pub use sample_table::{EsDescriptor, parse_esds};

use aacplay_core::{AacError, AacResult};
use log::{debug, warn};

use self::boxes::{BoxType, read_box_header, read_fullbox_header};
use self::sample_table::SampleTable;
use crate::demuxer::{ContainerDemuxer, SampleRange, Tags, TrackId};
use crate::io::IoContext;

/// 单条轨道
#[derive(Debug, Default)]
struct Mp4Track {
    /// 处理器类型 (soun/vide/...)
    handler: [u8; 4],
    /// 媒体时间刻度
    timescale: u32,
    /// 媒体时长 (以 timescale 为单位)
    duration: u64,
    /// 采样表
    table: SampleTable,
}

impl Mp4Track {
    fn is_aac_audio(&self) -> bool {
        &self.handler == b"soun" && self.table.is_aac()
    }
}

/// MP4 解封装器
#[derive(Debug, Default)]
pub struct Mp4Demuxer {
    /// 轨道列表
    tracks: Vec<Mp4Track>,
    /// 标签
    tags: Tags,
    /// 主品牌
    major_brand: Option<[u8; 4]>,
}

impl Mp4Demuxer {
    /// 创建 MP4 解封装器
    pub fn new() -> Self {
        Self::default()
    }

    /// 轨道数
    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    /// ftyp 主品牌
    pub fn major_brand(&self) -> Option<String> {
        self.major_brand
            .map(|b| String::from_utf8_lossy(&b).trim_end().to_string())
    }

    /// 轨道媒体时长 (毫秒, 来自 mdhd)
    pub fn media_duration_ms(&self, track: TrackId) -> Option<u64> {
        let t = self.tracks.get(track.0)?;
        if t.timescale == 0 || t.duration == 0 {
            return None;
        }
        Some(t.duration * 1000 / u64::from(t.timescale))
    }

    /// 采样条目中声明的采样率与声道数
    pub fn sample_entry_format(&self, track: TrackId) -> Option<(u32, u32)> {
        let t = self.tracks.get(track.0)?;
        Some((t.table.sample_rate, t.table.channel_count))
    }

    /// 解析 moov box 内容
    fn parse_moov(&mut self, io: &mut IoContext, moov_end: u64) -> AacResult<()> {
        while io.position()? + 8 <= moov_end {
            let header = read_box_header(io)?;
            let content_start = io.position()?;
            let box_end = header.end(content_start, moov_end);

            match header.box_type {
                BoxType::Trak => self.parse_trak(io, box_end)?,
                BoxType::Udta => meta::parse_udta(io, box_end, &mut self.tags)?,
                _ => {}
            }

            io.seek(std::io::SeekFrom::Start(box_end))?;
        }
        Ok(())
    }

    /// 解析 trak (Track Box)
    fn parse_trak(&mut self, io: &mut IoContext, trak_end: u64) -> AacResult<()> {
        let mut track = Mp4Track::default();
        Self::parse_trak_boxes(io, trak_end, &mut track)?;
        track.table.build_index(io.size().unwrap_or(u64::MAX))?;

        debug!(
            "MP4: 轨道 #{}: handler={}, timescale={}, samples={} (可定位 {}), aac={}",
            self.tracks.len(),
            String::from_utf8_lossy(&track.handler),
            track.timescale,
            track.table.sample_count(),
            track.table.indexed_count(),
            track.is_aac_audio(),
        );
        self.tracks.push(track);
        Ok(())
    }

    /// 递归解析 trak 内部的 box
    fn parse_trak_boxes(io: &mut IoContext, end: u64, track: &mut Mp4Track) -> AacResult<()> {
        while io.position()? + 8 <= end {
            let header = read_box_header(io)?;
            let content_start = io.position()?;
            let box_end = header.end(content_start, end);

            match header.box_type {
                BoxType::Mdia | BoxType::Minf | BoxType::Stbl => {
                    Self::parse_trak_boxes(io, box_end, track)?;
                }
                BoxType::Mdhd => Self::parse_mdhd(io, track)?,
                BoxType::Hdlr => {
                    read_fullbox_header(io)?;
                    let _pre_defined = io.read_u32_be()?;
                    track.handler = io.read_tag()?;
                }
                BoxType::Stsd => track.table.parse_stsd(io, box_end)?,
                BoxType::Stsc => track.table.parse_stsc(io)?,
                BoxType::Stsz => track.table.parse_stsz(io, box_end)?,
                BoxType::Stco => track.table.parse_stco(io, false)?,
                BoxType::Co64 => track.table.parse_stco(io, true)?,
                _ => {}
            }

            io.seek(std::io::SeekFrom::Start(box_end))?;
        }
        Ok(())
    }

    /// 解析 mdhd (Media Header Box)
    fn parse_mdhd(io: &mut IoContext, track: &mut Mp4Track) -> AacResult<()> {
        let (version, _flags) = read_fullbox_header(io)?;
        if version == 1 {
            io.skip(16)?; // creation + modification
            track.timescale = io.read_u32_be()?;
            track.duration = io.read_u64_be()?;
        } else {
            io.skip(8)?;
            track.timescale = io.read_u32_be()?;
            track.duration = u64::from(io.read_u32_be()?);
        }
        Ok(())
    }

    fn track(&self, track: TrackId) -> Option<&Mp4Track> {
        self.tracks.get(track.0)
    }
}

impl ContainerDemuxer for Mp4Demuxer {
    fn name(&self) -> &str {
        "mp4"
    }

    fn open(&mut self, io: &mut IoContext) -> AacResult<()> {
        let file_size = io.size().unwrap_or(u64::MAX);

        loop {
            let pos = io.position()?;
            if pos.saturating_add(8) > file_size {
                break;
            }

            let header = match read_box_header(io) {
                Ok(h) => h,
                Err(e) if e.is_eof() => break,
                Err(e) => return Err(e),
            };
            let content_start = io.position()?;
            let box_end = header.end(content_start, file_size);

            match header.box_type {
                BoxType::Ftyp => {
                    self.major_brand = Some(io.read_tag()?);
                }
                BoxType::Moov => self.parse_moov(io, box_end)?,
                _ => {}
            }

            if box_end == u64::MAX {
                break;
            }
            io.seek(std::io::SeekFrom::Start(box_end))?;
        }

        if self.tracks.is_empty() {
            return Err(AacError::InvalidData("MP4 文件中未找到任何轨道".into()));
        }
        debug!(
            "打开 MP4: brand={:?}, {} 个轨道",
            self.major_brand(),
            self.tracks.len()
        );
        Ok(())
    }

    fn select_audio_track(&self) -> Option<TrackId> {
        self.tracks
            .iter()
            .position(Mp4Track::is_aac_audio)
            .map(TrackId)
    }

    fn sample_count(&self, track: TrackId) -> u32 {
        self.track(track).map_or(0, |t| t.table.sample_count())
    }

    fn decoder_config(&self, track: TrackId) -> Option<&[u8]> {
        self.track(track)?.table.decoder_config()
    }

    fn sample_range(&self, track: TrackId, index: u32) -> Option<SampleRange> {
        let table = &self.track(track)?.table;
        let offset = table.sample_offset(index)?;
        Some(SampleRange {
            offset,
            size: table.sample_size(index),
        })
    }

    fn average_bitrate(&self, track: TrackId) -> Option<u32> {
        let t = self.track(track)?;
        if let Some(avg) = t.table.esds.as_ref().map(|e| e.avg_bitrate) {
            if avg > 0 {
                return Some(avg);
            }
        }

        // 退化为总字节数 / 媒体时长
        if t.timescale == 0 || t.duration == 0 {
            warn!("MP4: 无法估算码率 (缺少 esds 码率和媒体时长)");
            return None;
        }
        let bits = t.table.total_bytes() * 8;
        Some((bits * u64::from(t.timescale) / t.duration) as u32)
    }

    fn tags(&self) -> &Tags {
        &self.tags
    }
}

/// 构造测试用 MP4 文件
#[cfg(test)]
pub(crate) mod tests {
    use super::boxes::tests::{build_box, build_fullbox};
    use super::meta::tests::{build_item, build_udta};
    use super::sample_table::tests::build_esds;
    use super::*;

    /// 测试文件描述
    pub(crate) struct Mp4Layout<'a> {
        pub samples: &'a [Vec<u8>],
        pub asc: &'a [u8],
        pub object_type: u8,
        pub avg_bitrate: u32,
        pub handler: &'a [u8; 4],
        pub timescale: u32,
        pub items: Vec<Vec<u8>>,
    }

    impl Default for Mp4Layout<'_> {
        fn default() -> Self {
            Self {
                samples: &[],
                asc: &[0x12, 0x10],
                object_type: 0x40,
                avg_bitrate: 0,
                handler: b"soun",
                timescale: 44100,
                items: Vec::new(),
            }
        }
    }

    /// 构造 ftyp + moov + mdat, 所有采样放在一个块中
    pub(crate) fn build_mp4(layout: &Mp4Layout<'_>) -> Vec<u8> {
        let ftyp = build_box(b"ftyp", b"M4A \x00\x00\x00\x00isomM4A ");

        let build_moov = |chunk_offset: u32| {
            let mut entry = vec![0u8; 6];
            entry.extend_from_slice(&1u16.to_be_bytes());
            entry.extend_from_slice(&[0u8; 8]);
            entry.extend_from_slice(&2u16.to_be_bytes());
            entry.extend_from_slice(&16u16.to_be_bytes());
            entry.extend_from_slice(&[0u8; 4]);
            entry.extend_from_slice(&(44100u32 << 16).to_be_bytes());
            entry.extend_from_slice(&build_fullbox(
                b"esds",
                0,
                0,
                &build_esds(layout.object_type, layout.avg_bitrate, layout.asc)[4..],
            ));
            let mp4a = build_box(b"mp4a", &entry);

            let mut stsd = 1u32.to_be_bytes().to_vec();
            stsd.extend_from_slice(&mp4a);

            let mut stsz = 0u32.to_be_bytes().to_vec();
            stsz.extend_from_slice(&(layout.samples.len() as u32).to_be_bytes());
            for s in layout.samples {
                stsz.extend_from_slice(&(s.len() as u32).to_be_bytes());
            }

            let mut stsc = 1u32.to_be_bytes().to_vec();
            stsc.extend_from_slice(&1u32.to_be_bytes());
            stsc.extend_from_slice(&(layout.samples.len() as u32).to_be_bytes());
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
            let minf = build_box(b"minf", &stbl);

            let mut mdhd = vec![0u8; 8];
            mdhd.extend_from_slice(&layout.timescale.to_be_bytes());
            mdhd.extend_from_slice(&((layout.samples.len() as u32) * 1024).to_be_bytes());
            mdhd.extend_from_slice(&[0u8; 4]);

            let mut hdlr = vec![0u8; 4];
            hdlr.extend_from_slice(layout.handler);
            hdlr.extend_from_slice(&[0u8; 13]);

            let mdia = build_box(
                b"mdia",
                &[
                    build_fullbox(b"mdhd", 0, 0, &mdhd),
                    build_fullbox(b"hdlr", 0, 0, &hdlr),
                    minf,
                ]
                .concat(),
            );
            let trak = build_box(b"trak", &mdia);
            let mut moov_content = trak;
            if !layout.items.is_empty() {
                moov_content.extend_from_slice(&build_udta(&layout.items));
            }
            build_box(b"moov", &moov_content)
        };

        // moov 大小与块偏移无关, 先算一次长度
        let moov_len = build_moov(0).len();
        let chunk_offset = (ftyp.len() + moov_len + 8) as u32;
        let moov = build_moov(chunk_offset);

        let mut out = ftyp;
        out.extend_from_slice(&moov);
        out.extend_from_slice(&build_box(b"mdat", &layout.samples.concat()));
        out
    }

    pub(crate) fn samples(count: usize, len: usize) -> Vec<Vec<u8>> {
        (0..count)
            .map(|i| vec![(i % 251) as u8; len + i % 3])
            .collect()
    }

    fn open(data: Vec<u8>) -> (Mp4Demuxer, IoContext) {
        let mut io = IoContext::from_memory(data);
        let mut demuxer = Mp4Demuxer::new();
        demuxer.open(&mut io).unwrap();
        (demuxer, io)
    }

    #[test]
    fn test_解析完整_aac_轨道() {
        let samples = samples(100, 200);
        let (demuxer, mut io) = open(build_mp4(&Mp4Layout {
            samples: &samples,
            avg_bitrate: 96_000,
            ..Mp4Layout::default()
        }));

        assert_eq!(demuxer.major_brand().as_deref(), Some("M4A"));
        let track = demuxer.select_audio_track().unwrap();
        assert_eq!(demuxer.sample_count(track), 100);
        assert_eq!(demuxer.decoder_config(track), Some(&[0x12, 0x10][..]));
        assert_eq!(demuxer.average_bitrate(track), Some(96_000));
        assert_eq!(demuxer.sample_entry_format(track), Some((44100, 2)));

        for idx in [0u32, 1, 57, 99] {
            let data = demuxer.read_sample(&mut io, track, idx).unwrap();
            assert_eq!(&data[..], &samples[idx as usize][..], "采样 {idx}");
        }
        assert!(demuxer.sample_range(track, 100).is_none());
    }

    #[test]
    fn test_码率退化估算() {
        let samples = vec![vec![0u8; 441]; 100];
        let (demuxer, _) = open(build_mp4(&Mp4Layout {
            samples: &samples,
            ..Mp4Layout::default()
        }));
        let track = demuxer.select_audio_track().unwrap();
        // 44100 字节 / (102400 / 44100 s)
        assert_eq!(
            demuxer.average_bitrate(track),
            Some((44100u64 * 8 * 44100 / 102400) as u32)
        );
        assert_eq!(demuxer.media_duration_ms(track), Some(2321));
    }

    #[test]
    fn test_无_aac_轨道() {
        let samples = samples(4, 10);
        let (demuxer, _) = open(build_mp4(&Mp4Layout {
            samples: &samples,
            object_type: 0x6B,
            ..Mp4Layout::default()
        }));
        assert!(demuxer.select_audio_track().is_none());

        let (demuxer, _) = open(build_mp4(&Mp4Layout {
            samples: &samples,
            handler: b"vide",
            ..Mp4Layout::default()
        }));
        assert!(demuxer.select_audio_track().is_none());
    }

    #[test]
    fn test_标签() {
        let samples = samples(2, 10);
        let (demuxer, _) = open(build_mp4(&Mp4Layout {
            samples: &samples,
            items: vec![
                build_item(b"\xA9nam", 1, b"Title"),
                build_item(b"gnre", 0, &9u16.to_be_bytes()),
            ],
            ..Mp4Layout::default()
        }));
        assert_eq!(demuxer.tags().title.as_deref(), Some("Title"));
        assert_eq!(demuxer.tags().genre.as_deref(), Some("Jazz"));
    }

    /// 改写 stsz 的统一大小与采样数
    fn patch_stsz(data: &mut [u8], sample_size: u32, count: u32) {
        let pos = data.windows(4).position(|w| w == b"stsz").unwrap();
        data[pos + 8..pos + 12].copy_from_slice(&sample_size.to_be_bytes());
        data[pos + 12..pos + 16].copy_from_slice(&count.to_be_bytes());
    }

    #[test]
    fn test_声明超大采样数时报错() {
        let samples = samples(4, 10);
        let file = build_mp4(&Mp4Layout {
            samples: &samples,
            ..Mp4Layout::default()
        });

        // 统一大小: 8 字节 * u32::MAX 远超文件大小
        let mut data = file.clone();
        patch_stsz(&mut data, 8, u32::MAX);
        let mut io = IoContext::from_memory(data);
        let err = Mp4Demuxer::new().open(&mut io).unwrap_err();
        assert!(matches!(err, AacError::InvalidData(_)), "{err}");

        // 逐样本大小: 条目数超出 stsz 内容
        let mut data = file;
        patch_stsz(&mut data, 0, u32::MAX);
        let mut io = IoContext::from_memory(data);
        let err = Mp4Demuxer::new().open(&mut io).unwrap_err();
        assert!(matches!(err, AacError::InvalidData(_)), "{err}");
    }

    #[test]
    fn test_没有轨道() {
        let data = build_box(b"ftyp", b"isom\x00\x00\x00\x00");
        let mut io = IoContext::from_memory(data);
        let mut demuxer = Mp4Demuxer::new();
        assert!(demuxer.open(&mut io).is_err());
    }
}
