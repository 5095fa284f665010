//! ADTS 裸流帧源.
//!
//! 维护一个滑动缓冲区: 每次解码前把已消耗的字节移出缓冲区前部, 再从字节源补满.
//! 解码器自行识别 ADTS 帧, 每次 `decode_unit` 报告消耗的字节数.
//!
//! 出错时以另一种 ADTS 头部约定重新打开解码器, 只尝试一次; 再次出错则放弃剩余数据,
//! 按流结束处理.

use std::io::SeekFrom;
use std::sync::Arc;

use aacplay_codec::{AdapterOptions, CodecAdapter, CodecFactory, DecodeFault};
use aacplay_core::{AacError, AacResult};
use aacplay_format::IoContext;
use aacplay_format::adts::id3v2_tag_len;
use log::{debug, error, info, warn};

use super::{FrameSource, SourceInfo, Unit};
use crate::config::EngineConfig;

/// ADTS 裸流帧源
pub struct RawAdtsSource {
    io: IoContext,
    factory: Arc<dyn CodecFactory>,
    adapter: Option<Box<dyn CodecAdapter>>,
    config: EngineConfig,
    buffer: Vec<u8>,
    /// 缓冲区中有效字节数
    valid: usize,
    /// 有效字节中已被解码器消耗的部分
    consumed: usize,
    /// 是否已经做过一次 ADTS 约定回退
    fallback_used: bool,
    /// 连续无进展次数
    stalled: u32,
}

impl RawAdtsSource {
    /// 创建帧源 (尚未打开)
    pub fn new(io: IoContext, factory: Arc<dyn CodecFactory>, config: EngineConfig) -> Self {
        Self {
            io,
            factory,
            adapter: None,
            config,
            buffer: Vec::new(),
            valid: 0,
            consumed: 0,
            fallback_used: false,
            stalled: 0,
        }
    }

    /// 是否已经切换过 ADTS 约定
    pub fn fallback_used(&self) -> bool {
        self.fallback_used
    }

    /// 从 `self.valid` 开始补满缓冲区
    ///
    /// I/O 错误按流末尾处理, 但在日志中与真正的流末尾区分.
    fn fill(&mut self) {
        while self.valid < self.buffer.len() {
            match self.io.read(&mut self.buffer[self.valid..]) {
                Ok(0) => break,
                Ok(n) => self.valid += n,
                Err(e) if e.is_eof() => break,
                Err(e) => {
                    error!("读取 ADTS 裸流时发生 I/O 错误, 按流末尾处理: {e}");
                    break;
                }
            }
        }
    }

    /// 把已消耗的字节移出缓冲区并补充新数据
    fn compact(&mut self) {
        if self.consumed == 0 {
            return;
        }
        self.buffer.copy_within(self.consumed..self.valid, 0);
        self.valid -= self.consumed;
        self.consumed = 0;
        self.fill();
    }

    /// 解码出错后的处理
    fn recover(&mut self, fault: DecodeFault) -> Unit {
        if self.fallback_used {
            warn!(
                "ADTS 解码失败 ({}, 错误码 {}), 放弃剩余 {} 字节",
                fault.message, fault.code, self.valid
            );
            self.valid = 0;
            return Unit::End;
        }
        self.fallback_used = true;

        let legacy = !self.adapter.as_ref().is_some_and(|a| a.legacy_adts());
        warn!(
            "ADTS 解码失败 ({}), 以{}头部约定重新初始化解码器",
            fault.message,
            if legacy { "旧版" } else { "新版" }
        );
        self.close();

        let reopened = self
            .factory
            .open(AdapterOptions {
                legacy_adts: legacy,
            })
            .and_then(|mut adapter| {
                let raw = adapter.init_raw(&self.buffer[..self.valid]);
                self.adapter = Some(adapter);
                raw
            });

        match reopened {
            Ok(raw) => {
                self.consumed = raw.bytes_consumed.min(self.valid);
                Unit::Skip
            }
            Err(e) => {
                warn!("重新初始化失败, 放弃剩余数据: {e}");
                self.valid = 0;
                Unit::End
            }
        }
    }
}

impl FrameSource for RawAdtsSource {
    fn name(&self) -> &str {
        "adts"
    }

    fn init(&mut self) -> AacResult<SourceInfo> {
        let start = self.io.position()?;
        self.buffer = vec![0; self.config.max_in_flight_bytes];
        self.valid = 0;
        self.consumed = 0;
        self.fill();
        if self.valid == 0 {
            return Err(AacError::Read("ADTS 裸流为空".into()));
        }

        if let Some(tag_len) = id3v2_tag_len(&self.buffer[..self.valid]) {
            debug!("跳过 {tag_len} 字节的 ID3v2 标签");
            self.io.seek(SeekFrom::Start(start + tag_len as u64))?;
            self.valid = 0;
            self.fill();
            if self.valid == 0 {
                return Err(AacError::Read("ID3v2 标签之后没有音频数据".into()));
            }
        }

        let adapter = self
            .adapter
            .insert(self.factory.open(AdapterOptions::default())?);
        let raw = adapter.init_raw(&self.buffer[..self.valid])?;
        self.consumed = raw.bytes_consumed.min(self.valid);
        info!(
            "ADTS 裸流: {} Hz, {} 声道, 跳过 {} 字节",
            raw.config.sample_rate, raw.config.channels, raw.bytes_consumed
        );

        Ok(SourceInfo {
            sample_rate: raw.config.sample_rate,
            channels: raw.config.channels,
            ..SourceInfo::default()
        })
    }

    fn next_unit(&mut self) -> AacResult<Unit> {
        if self.valid == 0 {
            return Ok(Unit::End);
        }
        self.compact();
        if self.valid == 0 {
            return Ok(Unit::End);
        }

        let adapter = self
            .adapter
            .as_mut()
            .ok_or_else(|| AacError::Internal("解码器已关闭".into()))?;
        let out = adapter.decode_unit(&self.buffer[..self.valid]);
        if let Some(fault) = out.error {
            return Ok(self.recover(fault));
        }

        self.consumed = (self.consumed + out.bytes_consumed).min(self.valid);
        match out.pcm {
            Some(pcm) if !pcm.is_empty() => {
                self.stalled = 0;
                Ok(Unit::Pcm(pcm))
            }
            _ => {
                if out.bytes_consumed == 0 {
                    self.stalled += 1;
                    if self.stalled > self.config.max_stalled_units {
                        warn!("解码器连续 {} 次无进展, 按流末尾处理", self.stalled);
                        self.valid = 0;
                        return Ok(Unit::End);
                    }
                } else {
                    self.stalled = 0;
                }
                debug!("本次解码无音频输出, 消耗 {} 字节", out.bytes_consumed);
                Ok(Unit::Skip)
            }
        }
    }

    fn seek(&mut self, target_ms: u64) -> AacResult<()> {
        Err(AacError::Unsupported(format!(
            "ADTS 裸流没有采样表, 无法定位到 {target_ms} ms"
        )))
    }

    fn is_seekable(&self) -> bool {
        false
    }

    fn close(&mut self) {
        if let Some(mut adapter) = self.adapter.take() {
            debug!("关闭解码器 {}", adapter.name());
            adapter.close();
        }
    }
}

impl Drop for RawAdtsSource {
    fn drop(&mut self) {
        self.close();
    }
}
