//! 解码引擎.
//!
//! 状态机:
//! ```text
//! Init ──start──▶ Decoding ◀──▶ SeekPending
//!                    │
//!                    ├── 流结束 ──▶ Draining ──▶ Closed
//!                    └── 停止/错误 ──────────────▶ Closed
//! ```
//!
//! 每一轮循环先检查播放标志, 再处理挂起的定位请求, 最后从帧源取一个单元解码.
//! 解出的 PCM 以输出端自己报告的已播放时间为时间戳写入.

use std::sync::{Arc, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use aacplay_core::{AacError, AacResult, SampleFormat};
use log::{debug, error, info, warn};

use crate::config::EngineConfig;
use crate::control::PlaybackControl;
use crate::host::{PlaybackHost, StreamInfo};
use crate::sink::{PlaybackSink, SharedSink};
use crate::source::{FrameSource, Unit};

/// 引擎状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineState {
    /// 尚未初始化
    Init,
    /// 正在解码
    Decoding,
    /// 正在处理定位请求
    SeekPending,
    /// 流已结束, 等待输出排空
    Draining,
    /// 已释放全部资源
    Closed,
}

/// 结束原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// 播放到流末尾
    Finished,
    /// 外部清除了播放标志
    Stopped,
}

/// 一次播放的统计
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineReport {
    /// 结束原因
    pub end: EndReason,
    /// 写入输出的 PCM 块数
    pub blocks: u64,
    /// 写入输出的采样帧数
    pub frames: u64,
    /// 完成的定位次数
    pub seeks: u32,
}

fn lock_sink(sink: &SharedSink) -> MutexGuard<'_, dyn PlaybackSink + 'static> {
    sink.lock().unwrap_or_else(PoisonError::into_inner)
}

/// 解码引擎
pub struct DecodeEngine {
    source: Box<dyn FrameSource>,
    sink: SharedSink,
    control: PlaybackControl,
    host: Option<Arc<dyn PlaybackHost>>,
    config: EngineConfig,
    fallback_title: String,
    state: EngineState,
    sink_open: bool,
    blocks: u64,
    frames: u64,
    seeks: u32,
}

impl DecodeEngine {
    /// 创建引擎
    pub fn new(
        source: Box<dyn FrameSource>,
        sink: SharedSink,
        control: PlaybackControl,
        config: EngineConfig,
    ) -> Self {
        Self {
            source,
            sink,
            control,
            host: None,
            config,
            fallback_title: String::new(),
            state: EngineState::Init,
            sink_open: false,
            blocks: 0,
            frames: 0,
            seeks: 0,
        }
    }

    /// 设置宿主
    pub fn with_host(mut self, host: Arc<dyn PlaybackHost>) -> Self {
        self.host = Some(host);
        self
    }

    /// 标签中没有标题时使用的标题
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.fallback_title = title.into();
        self
    }

    /// 当前状态
    pub fn state(&self) -> EngineState {
        self.state
    }

    /// 初始化帧源与输出 (Init → Decoding)
    ///
    /// 失败时不会产生任何 PCM, 已打开的资源全部释放.
    pub fn start(&mut self) -> AacResult<StreamInfo> {
        if self.state != EngineState::Init {
            return Err(AacError::Internal(format!(
                "引擎状态 {:?} 下不能启动",
                self.state
            )));
        }

        let info = match self.source.init() {
            Ok(info) => info,
            Err(e) => {
                error!("{}: 初始化失败: {e}", self.source.name());
                self.shutdown();
                return Err(e);
            }
        };

        {
            let mut sink = lock_sink(&self.sink);
            if let Err(e) = sink.open(SampleFormat::S16, info.sample_rate, info.channels) {
                sink.close();
                drop(sink);
                error!("打开输出失败: {e}");
                self.shutdown();
                return Err(match e {
                    AacError::Output(_) => e,
                    other => AacError::Output(other.to_string()),
                });
            }
            sink.flush(0);
        }
        self.sink_open = true;
        self.control.set_seekable(self.source.is_seekable());

        let stream_info = StreamInfo {
            title: info
                .title
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| self.fallback_title.clone()),
            duration_ms: info.duration_ms,
            bitrate: info.bitrate,
            sample_rate: info.sample_rate,
            channels: info.channels,
        };
        if let Some(host) = &self.host {
            host.set_info(&stream_info);
        }

        self.state = EngineState::Decoding;
        Ok(stream_info)
    }

    /// 运行解码循环直到流结束、被停止或出错
    pub fn run(mut self) -> AacResult<EngineReport> {
        if self.state == EngineState::Init {
            self.start()?;
        }

        loop {
            if !self.control.is_playing() {
                debug!("播放标志已清除, 停止解码");
                return Ok(self.finish(EndReason::Stopped));
            }

            if let Some(target_ms) = self.control.pending_seek() {
                self.handle_seek(target_ms);
            }

            match self.source.next_unit() {
                Ok(Unit::Pcm(pcm)) => {
                    if !self.control.is_playing() {
                        return Ok(self.finish(EndReason::Stopped));
                    }
                    let written = {
                        let mut sink = lock_sink(&self.sink);
                        let timestamp = sink.elapsed_ms();
                        sink.write(&pcm, timestamp)
                    };
                    if let Err(e) = written {
                        error!("写入输出失败: {e}");
                        self.shutdown();
                        return Err(e);
                    }
                    self.blocks += 1;
                    self.frames += pcm.frames() as u64;
                }
                Ok(Unit::Skip) => {}
                Ok(Unit::End) => break,
                Err(e) => {
                    error!("{}: 解码终止: {e}", self.source.name());
                    self.shutdown();
                    return Err(e);
                }
            }
        }

        self.drain();
        Ok(self.finish(EndReason::Finished))
    }

    fn handle_seek(&mut self, target_ms: u64) {
        self.state = EngineState::SeekPending;
        match self.source.seek(target_ms) {
            Ok(()) => {
                lock_sink(&self.sink).flush(target_ms);
                self.seeks += 1;
                info!("定位到 {target_ms} ms");
            }
            Err(e) => warn!("{}: 忽略定位请求: {e}", self.source.name()),
        }
        self.control.complete_seek(target_ms);
        self.state = EngineState::Decoding;
    }

    /// 等待输出端播放完缓冲的音频, 期间仍响应停止
    fn drain(&mut self) {
        self.state = EngineState::Draining;
        let poll = Duration::from_millis(self.config.drain_poll_interval_ms);
        while self.control.is_playing() && lock_sink(&self.sink).is_draining() {
            thread::sleep(poll);
        }
    }

    fn finish(&mut self, end: EndReason) -> EngineReport {
        self.shutdown();
        info!(
            "播放结束 ({end:?}): {} 块, {} 帧, {} 次定位",
            self.blocks, self.frames, self.seeks
        );
        EngineReport {
            end,
            blocks: self.blocks,
            frames: self.frames,
            seeks: self.seeks,
        }
    }

    /// 关闭输出与解码器并清除播放标志 (只执行一次)
    fn shutdown(&mut self) {
        if self.state == EngineState::Closed {
            return;
        }
        if self.sink_open {
            lock_sink(&self.sink).close();
            self.sink_open = false;
        }
        self.source.close();
        self.control.stop();
        self.state = EngineState::Closed;
    }
}

impl Drop for DecodeEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}
