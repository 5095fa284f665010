//! 解码输出的 PCM 块.

/// 交错 S16 PCM 数据块
///
/// 一次 `decode_unit` 调用的输出. `samples` 按声道交错排列 (LRLR...),
/// 长度为 `帧数 × 声道数`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PcmBlock {
    /// 交错采样数据
    pub samples: Vec<i16>,
    /// 声道数
    pub channels: u32,
    /// 采样率
    pub sample_rate: u32,
}

impl PcmBlock {
    /// 创建 PCM 块
    pub fn new(samples: Vec<i16>, channels: u32, sample_rate: u32) -> Self {
        Self {
            samples,
            channels,
            sample_rate,
        }
    }

    /// 创建全零 (静音) PCM 块
    pub fn silence(frames: usize, channels: u32, sample_rate: u32) -> Self {
        Self::new(vec![0; frames * channels as usize], channels, sample_rate)
    }

    /// 每声道采样帧数
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels as usize
        }
    }

    /// 是否不含任何采样
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// 本块对应的播放时长 (毫秒)
    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        self.frames() as u64 * 1000 / u64::from(self.sample_rate)
    }

    /// 转换为本机字节序的字节流
    pub fn to_ne_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.samples.len() * 2);
        for s in &self.samples {
            out.extend_from_slice(&s.to_ne_bytes());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pcm_块帧数与时长() {
        let block = PcmBlock::silence(1024, 2, 44100);
        assert_eq!(block.samples.len(), 2048);
        assert_eq!(block.frames(), 1024);
        assert_eq!(block.duration_ms(), 23);
        assert_eq!(block.to_ne_bytes().len(), 4096);
    }

    #[test]
    fn test_零声道不除零() {
        let block = PcmBlock::new(vec![1, 2, 3], 0, 0);
        assert_eq!(block.frames(), 0);
        assert_eq!(block.duration_ms(), 0);
    }
}
