//! 字节源抽象层.
//!
//! 提供统一的只读、可定位字节源接口, 支持文件与内存缓冲区两种后端.
//! 格式嗅探、解封装与裸流解码都通过 [`IoContext`] 访问数据.

use std::io::{self, Read, Seek};
use std::path::Path;

use aacplay_core::{AacError, AacResult};

/// 字节源上下文
///
/// 封装底层后端并带有读缓冲, 为嗅探器/解封装器提供统一的读取接口.
pub struct IoContext {
    /// 内部后端
    inner: Box<dyn IoBackend>,
    /// 读缓冲区
    buffer: Vec<u8>,
    /// 缓冲区中的有效数据长度
    buf_len: usize,
    /// 缓冲区当前读取位置
    buf_pos: usize,
}

/// 字节源后端 trait
///
/// 实现此 trait 以支持不同的数据来源 (文件、内存等).
pub trait IoBackend: Send {
    /// 读取数据到缓冲区, 返回实际读取的字节数 (0 表示流末尾)
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
    /// 定位
    fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64>;
    /// 获取当前位置
    fn position(&mut self) -> io::Result<u64>;
    /// 获取总大小 (如果可知)
    fn size(&self) -> Option<u64>;
    /// 是否支持 seek
    fn is_seekable(&self) -> bool;
}

/// 默认缓冲区大小 (32 KB)
const DEFAULT_BUFFER_SIZE: usize = 32 * 1024;

impl IoContext {
    /// 从后端创建上下文
    pub fn new(backend: Box<dyn IoBackend>) -> Self {
        Self {
            inner: backend,
            buffer: vec![0u8; DEFAULT_BUFFER_SIZE],
            buf_len: 0,
            buf_pos: 0,
        }
    }

    /// 从文件路径打开 (只读)
    pub fn open_read(path: impl AsRef<Path>) -> AacResult<Self> {
        let file = std::fs::File::open(path)?;
        Ok(Self::new(Box::new(FileBackend::new(file))))
    }

    /// 从内存数据创建
    pub fn from_memory(data: Vec<u8>) -> Self {
        Self::new(Box::new(MemoryBackend::from_data(data)))
    }

    // ========================
    // 读取方法
    // ========================

    /// 尽量读取数据, 返回实际读取的字节数
    ///
    /// 只有到达流末尾时返回值才会小于 `buf.len()`; 返回 0 表示已无数据.
    pub fn read(&mut self, buf: &mut [u8]) -> AacResult<usize> {
        let mut total_read = 0;
        while total_read < buf.len() {
            let buffered = self.buf_len - self.buf_pos;
            if buffered > 0 {
                let to_copy = buffered.min(buf.len() - total_read);
                buf[total_read..total_read + to_copy]
                    .copy_from_slice(&self.buffer[self.buf_pos..self.buf_pos + to_copy]);
                self.buf_pos += to_copy;
                total_read += to_copy;
            } else {
                self.buf_pos = 0;
                self.buf_len = self.inner.read(&mut self.buffer)?;
                if self.buf_len == 0 {
                    break;
                }
            }
        }
        Ok(total_read)
    }

    /// 读取指定字节数, 不足时返回 `Eof`
    pub fn read_exact(&mut self, buf: &mut [u8]) -> AacResult<()> {
        if self.read(buf)? < buf.len() {
            return Err(AacError::Eof);
        }
        Ok(())
    }

    /// 读取 1 个字节
    pub fn read_u8(&mut self) -> AacResult<u8> {
        let mut buf = [0u8; 1];
        self.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    /// 读取 u16 大端
    pub fn read_u16_be(&mut self) -> AacResult<u16> {
        let mut buf = [0u8; 2];
        self.read_exact(&mut buf)?;
        Ok(u16::from_be_bytes(buf))
    }

    /// 读取 u24 大端 (3 字节无符号整数)
    pub fn read_u24_be(&mut self) -> AacResult<u32> {
        let mut buf = [0u8; 3];
        self.read_exact(&mut buf)?;
        Ok((u32::from(buf[0]) << 16) | (u32::from(buf[1]) << 8) | u32::from(buf[2]))
    }

    /// 读取 u32 大端
    pub fn read_u32_be(&mut self) -> AacResult<u32> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf)?;
        Ok(u32::from_be_bytes(buf))
    }

    /// 读取 u64 大端
    pub fn read_u64_be(&mut self) -> AacResult<u64> {
        let mut buf = [0u8; 8];
        self.read_exact(&mut buf)?;
        Ok(u64::from_be_bytes(buf))
    }

    /// 读取 4 字节标签 (FourCC)
    pub fn read_tag(&mut self) -> AacResult<[u8; 4]> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// 读取指定数量的字节
    pub fn read_bytes(&mut self, count: usize) -> AacResult<Vec<u8>> {
        let mut buf = vec![0u8; count];
        self.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// 跳过指定字节数
    pub fn skip(&mut self, count: usize) -> AacResult<()> {
        let buffered = self.buf_len - self.buf_pos;
        if count <= buffered {
            self.buf_pos += count;
            return Ok(());
        }

        let remaining = count - buffered;
        self.buf_pos = self.buf_len;

        if self.inner.is_seekable() {
            self.inner.seek(io::SeekFrom::Current(remaining as i64))?;
        } else {
            let mut left = remaining;
            while left > 0 {
                let to_read = left.min(self.buffer.len());
                self.buf_len = self.inner.read(&mut self.buffer[..to_read])?;
                if self.buf_len == 0 {
                    return Err(AacError::Eof);
                }
                left -= self.buf_len;
            }
            self.buf_pos = 0;
            self.buf_len = 0;
        }
        Ok(())
    }

    // ========================
    // 定位方法
    // ========================

    /// 定位
    ///
    /// 注意: seek 会清空读缓冲区.
    pub fn seek(&mut self, pos: io::SeekFrom) -> AacResult<u64> {
        // 后端位置领先于逻辑位置 (读缓冲), 相对定位需先换算成绝对位置
        let pos = match pos {
            io::SeekFrom::Current(delta) => {
                let target = self.position()? as i64 + delta;
                if target < 0 {
                    return Err(AacError::InvalidArgument(format!(
                        "seek 位置不能为负: {target}"
                    )));
                }
                io::SeekFrom::Start(target as u64)
            }
            other => other,
        };
        self.buf_pos = 0;
        self.buf_len = 0;
        Ok(self.inner.seek(pos)?)
    }

    /// 获取当前位置
    ///
    /// 考虑读缓冲区中尚未消耗的数据量.
    pub fn position(&mut self) -> AacResult<u64> {
        let raw_pos = self.inner.position()?;
        let buffered = (self.buf_len - self.buf_pos) as u64;
        Ok(raw_pos - buffered)
    }

    /// 是否支持随机访问
    pub fn is_seekable(&self) -> bool {
        self.inner.is_seekable()
    }

    /// 获取总大小
    pub fn size(&self) -> Option<u64> {
        self.inner.size()
    }
}

/// 文件后端
struct FileBackend {
    file: std::fs::File,
    size: Option<u64>,
}

impl FileBackend {
    fn new(file: std::fs::File) -> Self {
        let size = file.metadata().ok().map(|m| m.len());
        Self { file, size }
    }
}

impl IoBackend for FileBackend {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }

    fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
        self.file.seek(pos)
    }

    fn position(&mut self) -> io::Result<u64> {
        self.file.stream_position()
    }

    fn size(&self) -> Option<u64> {
        self.size
    }

    fn is_seekable(&self) -> bool {
        true
    }
}

/// 内存缓冲区后端
///
/// 用于测试和内存中处理.
pub struct MemoryBackend {
    /// 数据缓冲区
    data: Vec<u8>,
    /// 当前位置
    pos: usize,
}

impl MemoryBackend {
    /// 从已有数据创建
    pub fn from_data(data: Vec<u8>) -> Self {
        Self { data, pos: 0 }
    }

    /// 获取内部数据的引用
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

impl IoBackend for MemoryBackend {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let available = self.data.len().saturating_sub(self.pos);
        let to_read = buf.len().min(available);
        if to_read == 0 {
            return Ok(0);
        }
        buf[..to_read].copy_from_slice(&self.data[self.pos..self.pos + to_read]);
        self.pos += to_read;
        Ok(to_read)
    }

    fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
        let new_pos = match pos {
            io::SeekFrom::Start(offset) => offset as i64,
            io::SeekFrom::End(offset) => self.data.len() as i64 + offset,
            io::SeekFrom::Current(offset) => self.pos as i64 + offset,
        };
        if new_pos < 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek 位置不能为负",
            ));
        }
        self.pos = new_pos as usize;
        Ok(self.pos as u64)
    }

    fn position(&mut self) -> io::Result<u64> {
        Ok(self.pos as u64)
    }

    fn size(&self) -> Option<u64> {
        Some(self.data.len() as u64)
    }

    fn is_seekable(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_部分读取返回实际字节数() {
        let mut io = IoContext::from_memory(vec![1, 2, 3, 4, 5]);
        let mut buf = [0u8; 3];
        assert_eq!(io.read(&mut buf).unwrap(), 3);
        assert_eq!(buf, [1, 2, 3]);

        let mut buf = [0u8; 8];
        assert_eq!(io.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], &[4, 5]);
        assert_eq!(io.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_read_exact_不足返回_eof() {
        let mut io = IoContext::from_memory(vec![0xAB]);
        assert!(matches!(io.read_u16_be(), Err(AacError::Eof)));
    }

    #[test]
    fn test_大端读取与位置() {
        let mut io = IoContext::from_memory(vec![
            0x00, 0x01, 0x02, 0x03, 0x04, 0x05, b'f', b't', b'y', b'p',
        ]);
        assert_eq!(io.read_u16_be().unwrap(), 0x0001);
        assert_eq!(io.read_u24_be().unwrap(), 0x020304);
        assert_eq!(io.position().unwrap(), 5);
        io.skip(1).unwrap();
        assert_eq!(&io.read_tag().unwrap(), b"ftyp");
        io.seek(io::SeekFrom::Start(2)).unwrap();
        assert_eq!(io.read_u8().unwrap(), 0x02);
    }

    #[test]
    fn test_负偏移_seek_报错() {
        let mut io = IoContext::from_memory(vec![0u8; 4]);
        assert!(io.seek(io::SeekFrom::Current(-1)).is_err());
    }

    #[test]
    fn test_文件后端() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[9, 8, 7, 6, 5, 4, 3, 2, 1, 0]).unwrap();
        file.flush().unwrap();

        let mut io = IoContext::open_read(file.path()).unwrap();
        assert_eq!(io.size(), Some(10));
        assert!(io.is_seekable());
        io.skip(4).unwrap();
        assert_eq!(io.read_u32_be().unwrap(), 0x05040302);
        assert_eq!(io.position().unwrap(), 8);
    }
}
