//! iTunes 风格标签 (`moov/udta/meta/ilst`).
//!
//! 每个标签是 ilst 下的一个子 box, 内含一个 `data` box:
//! ```text
//! data: type_indicator(4) + locale(4) + payload
//! ```
//! 文本标签的 payload 为 UTF-8; `gnre` 是 ID3v1 流派编号 (1-based, u16 大端).

use aacplay_core::AacResult;
use byteorder::{BigEndian, ByteOrder};
use log::debug;

use super::boxes::{BoxType, read_box_header};
use crate::demuxer::Tags;
use crate::io::IoContext;

/// ID3v1 标准流派表
const ID3V1_GENRES: [&str; 80] = [
    "Blues",
    "Classic Rock",
    "Country",
    "Dance",
    "Disco",
    "Funk",
    "Grunge",
    "Hip-Hop",
    "Jazz",
    "Metal",
    "New Age",
    "Oldies",
    "Other",
    "Pop",
    "R&B",
    "Rap",
    "Reggae",
    "Rock",
    "Techno",
    "Industrial",
    "Alternative",
    "Ska",
    "Death Metal",
    "Pranks",
    "Soundtrack",
    "Euro-Techno",
    "Ambient",
    "Trip-Hop",
    "Vocal",
    "Jazz+Funk",
    "Fusion",
    "Trance",
    "Classical",
    "Instrumental",
    "Acid",
    "House",
    "Game",
    "Sound Clip",
    "Gospel",
    "Noise",
    "AlternRock",
    "Bass",
    "Soul",
    "Punk",
    "Space",
    "Meditative",
    "Instrumental Pop",
    "Instrumental Rock",
    "Ethnic",
    "Gothic",
    "Darkwave",
    "Techno-Industrial",
    "Electronic",
    "Pop-Folk",
    "Eurodance",
    "Dream",
    "Southern Rock",
    "Comedy",
    "Cult",
    "Gangsta",
    "Top 40",
    "Christian Rap",
    "Pop/Funk",
    "Jungle",
    "Native American",
    "Cabaret",
    "New Wave",
    "Psychadelic",
    "Rave",
    "Showtunes",
    "Trailer",
    "Lo-Fi",
    "Tribal",
    "Acid Punk",
    "Acid Jazz",
    "Polka",
    "Retro",
    "Musical",
    "Rock & Roll",
    "Hard Rock",
];

/// 由 1-based 编号取流派名
pub fn genre_name(index: u16) -> Option<&'static str> {
    ID3V1_GENRES.get(usize::from(index).checked_sub(1)?).copied()
}

/// 解析 udta 内容, 把找到的标签写入 `tags`
pub fn parse_udta(io: &mut IoContext, end: u64, tags: &mut Tags) -> AacResult<()> {
    while io.position()? + 8 <= end {
        let header = read_box_header(io)?;
        let content_start = io.position()?;
        let box_end = header.end(content_start, end);

        if header.box_type == BoxType::Meta {
            parse_meta(io, box_end, tags)?;
        }
        io.seek(std::io::SeekFrom::Start(box_end))?;
    }
    Ok(())
}

/// 解析 meta (MP4 中为 FullBox, QuickTime 中为普通 box)
fn parse_meta(io: &mut IoContext, end: u64, tags: &mut Tags) -> AacResult<()> {
    let start = io.position()?;
    // 如果紧跟的 4 字节之后就是子 box 类型, 说明没有 version/flags
    let maybe_size = io.read_u32_be()?;
    let maybe_tag = io.read_tag()?;
    let is_fullbox = !(maybe_size >= 8 && (&maybe_tag == b"hdlr" || &maybe_tag == b"ilst"));
    let children_start = if is_fullbox { start + 4 } else { start };
    io.seek(std::io::SeekFrom::Start(children_start))?;

    while io.position()? + 8 <= end {
        let header = read_box_header(io)?;
        let content_start = io.position()?;
        let box_end = header.end(content_start, end);

        if header.box_type == BoxType::Ilst {
            parse_ilst(io, box_end, tags)?;
        }
        io.seek(std::io::SeekFrom::Start(box_end))?;
    }
    Ok(())
}

/// 解析 ilst 中的各个标签
fn parse_ilst(io: &mut IoContext, end: u64, tags: &mut Tags) -> AacResult<()> {
    while io.position()? + 8 <= end {
        let item_start = io.position()?;
        let item_size = u64::from(io.read_u32_be()?);
        let item_tag = io.read_tag()?;
        if item_size < 8 {
            break;
        }
        let item_end = (item_start + item_size).min(end);

        if let Some(payload) = read_data_payload(io, item_end)? {
            apply_tag(&item_tag, &payload, tags);
        }
        io.seek(std::io::SeekFrom::Start(item_end))?;
    }
    Ok(())
}

/// 读取标签项中第一个 data box 的负载
fn read_data_payload(io: &mut IoContext, end: u64) -> AacResult<Option<Vec<u8>>> {
    while io.position()? + 16 <= end {
        let pos = io.position()?;
        let size = u64::from(io.read_u32_be()?);
        let tag = io.read_tag()?;
        if size < 16 {
            return Ok(None);
        }
        if &tag == b"data" {
            let _type_indicator = io.read_u32_be()?;
            let _locale = io.read_u32_be()?;
            let len = (pos + size).min(end) - (pos + 16);
            return Ok(Some(io.read_bytes(len as usize)?));
        }
        io.seek(std::io::SeekFrom::Start(pos + size))?;
    }
    Ok(None)
}

fn apply_tag(item: &[u8; 4], payload: &[u8], tags: &mut Tags) {
    let text = || {
        let s = String::from_utf8_lossy(payload)
            .trim_end_matches('\0')
            .trim()
            .to_string();
        (!s.is_empty()).then_some(s)
    };

    match item {
        b"\xA9nam" => tags.title = text(),
        b"\xA9alb" => tags.album = text(),
        b"\xA9ART" => tags.artist = text(),
        b"\xA9day" => tags.date = text(),
        b"\xA9gen" => tags.genre = text(),
        b"gnre" if tags.genre.is_none() && payload.len() >= 2 => {
            let index = BigEndian::read_u16(payload);
            tags.genre = genre_name(index).map(str::to_string);
        }
        _ => {
            debug!("MP4: 忽略标签 {}", String::from_utf8_lossy(item));
        }
    }
}
