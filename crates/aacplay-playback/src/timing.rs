//! 时长与定位换算.
//!
//! 容器模式下 "采样" 指一个压缩访问单元, 每个单元解码出 `frame_size` 个
//! PCM 采样帧. [`TimingPolicy::Legacy`] 以 `frame_size - 1` 参与换算.

use crate::config::TimingPolicy;

/// 换算用的每单元采样数
pub fn samples_per_unit(frame_size: u32, policy: TimingPolicy) -> u64 {
    match policy {
        TimingPolicy::Legacy => u64::from(frame_size.saturating_sub(1)),
        TimingPolicy::Exact => u64::from(frame_size),
    }
}

/// 轨道总时长 (毫秒)
///
/// `sample_count * per_unit / sample_rate * 1000`, 向下取整.
pub fn duration_ms(sample_count: u32, frame_size: u32, sample_rate: u32, policy: TimingPolicy) -> u64 {
    if sample_rate == 0 {
        return 0;
    }
    u64::from(sample_count) * samples_per_unit(frame_size, policy) * 1000 / u64::from(sample_rate)
}

/// 把目标时间换算为采样索引
///
/// `target_ms * sample_rate / 1000 / per_unit`.
pub fn seek_sample_index(
    target_ms: u64,
    frame_size: u32,
    sample_rate: u32,
    policy: TimingPolicy,
) -> u32 {
    let per_unit = samples_per_unit(frame_size, policy);
    if per_unit == 0 {
        return 0;
    }
    let index = target_ms.saturating_mul(u64::from(sample_rate)) / 1000 / per_unit;
    u32::try_from(index).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_时长公式保留减一() {
        assert_eq!(duration_ms(100, 1024, 44100, TimingPolicy::Legacy), 2319);
        assert_eq!(duration_ms(100, 1024, 44100, TimingPolicy::Exact), 2321);
        // HE-AAC: 2048 采样/帧
        assert_eq!(duration_ms(1000, 2048, 48000, TimingPolicy::Legacy), 42645);
        assert_eq!(duration_ms(10, 1024, 0, TimingPolicy::Legacy), 0);
    }

    #[test]
    fn test_定位换算() {
        assert_eq!(seek_sample_index(0, 1024, 44100, TimingPolicy::Legacy), 0);
        // 1000ms * 44100 / 1000 / 1023 = 43.1
        assert_eq!(seek_sample_index(1000, 1024, 44100, TimingPolicy::Legacy), 43);
        assert_eq!(seek_sample_index(1000, 1024, 44100, TimingPolicy::Exact), 43);
        assert_eq!(seek_sample_index(60_000, 960, 48000, TimingPolicy::Legacy), 3003);
        assert_eq!(seek_sample_index(1000, 1, 44100, TimingPolicy::Legacy), 0);
    }

    #[test]
    fn test_定位换算幂等() {
        for ms in [0u64, 1, 999, 12_345, 3_600_000] {
            let a = seek_sample_index(ms, 1024, 44100, TimingPolicy::Legacy);
            let b = seek_sample_index(ms, 1024, 44100, TimingPolicy::Legacy);
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_时长与定位互逆() {
        let duration = duration_ms(100, 1024, 44100, TimingPolicy::Legacy);
        let last = seek_sample_index(duration, 1024, 44100, TimingPolicy::Legacy);
        assert!(last <= 100);
    }
}
