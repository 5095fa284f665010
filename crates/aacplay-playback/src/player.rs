//! 播放控制.
//!
//! 每个轨道由一个独立的解码线程运行 [`DecodeEngine`]; 控制端 (播放、停止、
//! 定位、查询时间) 只通过 [`PlaybackControl`] 与之交互. 开始新轨道前必须先停止并
//! 等待上一个解码线程退出.

use std::path::Path;
use std::sync::{Arc, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use aacplay_codec::CodecFactory;
use aacplay_core::{AacError, AacResult};
use aacplay_format::{IoContext, sniff};
use log::{debug, info, warn};

use crate::config::EngineConfig;
use crate::control::PlaybackControl;
use crate::engine::{DecodeEngine, EngineReport};
use crate::host::{PlaybackHost, StreamInfo};
use crate::probe::fallback_title;
use crate::sink::SharedSink;
use crate::source::{FrameSource, open_source};

/// 播放器
pub struct Player {
    sink: SharedSink,
    factory: Arc<dyn CodecFactory>,
    host: Option<Arc<dyn PlaybackHost>>,
    config: EngineConfig,
    control: PlaybackControl,
    worker: Option<JoinHandle<AacResult<EngineReport>>>,
}

impl Player {
    /// 创建播放器
    pub fn new(sink: SharedSink, factory: Arc<dyn CodecFactory>, config: EngineConfig) -> Self {
        Self {
            sink,
            factory,
            host: None,
            config,
            control: PlaybackControl::new(),
            worker: None,
        }
    }

    /// 设置宿主
    pub fn with_host(mut self, host: Arc<dyn PlaybackHost>) -> Self {
        self.host = Some(host);
        self
    }

    /// 共享控制句柄
    pub fn control(&self) -> PlaybackControl {
        self.control.clone()
    }

    /// 播放文件
    pub fn play_path(&mut self, path: impl AsRef<Path>) -> AacResult<StreamInfo> {
        let path = path.as_ref();
        info!("正在打开: {}", path.display());
        let io = IoContext::open_read(path)?;
        self.play_io(io, path.to_str())
    }

    /// 播放已打开的字节源
    ///
    /// `file_name` 用于嗅探时的扩展名判断与缺省标题.
    pub fn play_io(&mut self, mut io: IoContext, file_name: Option<&str>) -> AacResult<StreamInfo> {
        self.config.validate()?;
        let classification = sniff(&mut io, file_name, &self.config.sniff_config())?;
        let source = open_source(
            io,
            classification,
            self.factory.clone(),
            &self.config,
            file_name,
        )?;
        let title = file_name.map(fallback_title).unwrap_or_default();
        self.play_source(source, title)
    }

    /// 播放指定帧源
    ///
    /// 初始化在调用线程完成, 启动失败直接返回错误; 成功后解码循环转入后台线程.
    pub fn play_source(
        &mut self,
        source: Box<dyn FrameSource>,
        title: impl Into<String>,
    ) -> AacResult<StreamInfo> {
        self.stop();
        self.control.start();

        let mut engine = DecodeEngine::new(
            source,
            self.sink.clone(),
            self.control.clone(),
            self.config.clone(),
        )
        .with_title(title);
        if let Some(host) = &self.host {
            engine = engine.with_host(host.clone());
        }
        let info = engine.start()?;

        let handle = thread::Builder::new()
            .name("aacplay-decode".into())
            .spawn(move || engine.run())
            .map_err(|e| AacError::Internal(format!("无法创建解码线程: {e}")))?;
        self.worker = Some(handle);
        Ok(info)
    }

    /// 停止播放并等待解码线程退出
    ///
    /// 返回解码线程的结果; 没有正在运行的线程时返回 None.
    pub fn stop(&mut self) -> Option<AacResult<EngineReport>> {
        self.control.stop();
        self.join()
    }

    /// 等待当前轨道自然结束
    pub fn wait(&mut self) -> Option<AacResult<EngineReport>> {
        self.join()
    }

    fn join(&mut self) -> Option<AacResult<EngineReport>> {
        let handle = self.worker.take()?;
        let result = handle
            .join()
            .unwrap_or_else(|_| Err(AacError::Internal("解码线程异常退出".into())));
        debug!("解码线程已退出");
        Some(result)
    }

    /// 是否在播放
    pub fn is_playing(&self) -> bool {
        self.control.is_playing()
    }

    /// 定位到指定时间, 阻塞直到解码线程处理完请求
    pub fn seek(&self, target_ms: u64) -> AacResult<()> {
        if !self.control.is_playing() {
            return Err(AacError::InvalidArgument("当前没有正在播放的轨道".into()));
        }
        if !self.control.is_seekable() {
            warn!("当前轨道不支持定位, 忽略 {target_ms} ms");
            return Err(AacError::Unsupported("当前轨道不支持定位".into()));
        }
        let poll = Duration::from_millis(self.config.seek_poll_interval_ms);
        self.control.seek_blocking(target_ms, poll);
        Ok(())
    }

    /// 当前播放时间 (毫秒), 未播放时为 None
    pub fn time_ms(&self) -> Option<u64> {
        if !self.control.is_playing() {
            return None;
        }
        let sink = self.sink.lock().unwrap_or_else(PoisonError::into_inner);
        Some(sink.elapsed_ms())
    }

    /// 暂停/恢复输出
    pub fn pause(&self, paused: bool) {
        self.sink
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pause(paused);
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        self.stop();
    }
}
