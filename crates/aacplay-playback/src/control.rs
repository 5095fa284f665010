//! 解码线程与控制端之间的共享状态.
//!
//! 只有两项: 播放标志与挂起的定位请求, 由同一把锁保护.
//! 新的定位请求会覆盖尚未处理的旧请求.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

#[derive(Debug)]
struct ControlState {
    playing: bool,
    seek_ms: Option<u64>,
    seekable: bool,
}

impl Default for ControlState {
    fn default() -> Self {
        Self {
            playing: false,
            seek_ms: None,
            seekable: true,
        }
    }
}

/// 播放控制句柄 (可克隆, 所有克隆共享同一状态)
#[derive(Debug, Clone, Default)]
pub struct PlaybackControl {
    inner: Arc<Mutex<ControlState>>,
}

impl PlaybackControl {
    /// 创建控制句柄 (初始为未播放)
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ControlState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 开始新轨道: 置播放标志并清除遗留的定位请求
    pub fn start(&self) {
        let mut state = self.lock();
        state.playing = true;
        state.seek_ms = None;
        state.seekable = true;
    }

    /// 清除播放标志
    pub fn stop(&self) {
        self.lock().playing = false;
    }

    /// 是否在播放
    pub fn is_playing(&self) -> bool {
        self.lock().playing
    }

    /// 提交定位请求 (覆盖未处理的旧请求)
    pub fn request_seek(&self, target_ms: u64) {
        self.lock().seek_ms = Some(target_ms);
    }

    /// 当前挂起的定位请求
    pub fn pending_seek(&self) -> Option<u64> {
        self.lock().seek_ms
    }

    /// 完成定位请求
    ///
    /// 只有挂起值仍为 `target_ms` 时才清除; 处理期间到达的新请求保留到下一轮.
    pub fn complete_seek(&self, target_ms: u64) {
        let mut state = self.lock();
        if state.seek_ms == Some(target_ms) {
            state.seek_ms = None;
        }
    }

    /// 当前轨道是否支持定位
    pub fn is_seekable(&self) -> bool {
        self.lock().seekable
    }

    /// 由解码引擎在初始化后设置
    pub fn set_seekable(&self, seekable: bool) {
        self.lock().seekable = seekable;
    }

    /// 提交定位请求并等待解码引擎处理
    ///
    /// 播放停止时立即返回. 返回值表示请求是否已被处理.
    pub fn seek_blocking(&self, target_ms: u64, poll: Duration) -> bool {
        self.request_seek(target_ms);
        loop {
            {
                let state = self.lock();
                if !state.playing {
                    return false;
                }
                if state.seek_ms.is_none() {
                    return true;
                }
            }
            thread::sleep(poll);
        }
    }
}
