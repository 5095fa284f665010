//! 解码器适配器能力接口.
//!
//! 所有底层 AAC 解码引擎通过 `CodecAdapter` 接入解码引擎.
//!
//! 使用流程:
//! 1. 通过 `CodecFactory::open()` 打开一个适配器句柄
//! 2. 容器模式调用 `init()` 送入解码配置; 裸流模式调用 `init_raw()` 送入缓冲区
//! 3. 反复调用 `decode_unit()`, 每次解码一个压缩单元
//! 4. 调用 `close()` 释放句柄

use aacplay_core::AacResult;

use crate::pcm::PcmBlock;

/// 解码器协商出的输出参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamConfig {
    /// 输出采样率
    pub sample_rate: u32,
    /// 输出声道数
    pub channels: u32,
}

/// 裸流初始化结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawInit {
    /// 输出参数
    pub config: StreamConfig,
    /// 初始化过程中消耗 (跳过) 的字节数
    pub bytes_consumed: usize,
}

/// 解码器报告的码流错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeFault {
    /// 解码器错误码 (非零)
    pub code: u8,
    /// 错误描述
    pub message: String,
}

/// 单次 `decode_unit` 的结果
///
/// 与底层引擎的调用约定一致: 错误以 `error` 字段返回, 而不是 `Err`,
/// 因为出错时 `bytes_consumed` 仍然有意义.
#[derive(Debug, Clone, Default)]
pub struct DecodeOutput {
    /// 解码出的 PCM (无输出时为 None)
    pub pcm: Option<PcmBlock>,
    /// 产生的采样值总数 (所有声道之和)
    pub samples: usize,
    /// 本次消耗的输入字节数
    pub bytes_consumed: usize,
    /// 码流错误
    pub error: Option<DecodeFault>,
}

impl DecodeOutput {
    /// 构造成功输出
    pub fn decoded(pcm: PcmBlock, bytes_consumed: usize) -> Self {
        Self {
            samples: pcm.samples.len(),
            pcm: Some(pcm),
            bytes_consumed,
            error: None,
        }
    }

    /// 构造 "消耗了输入但无音频" 的输出 (填充帧等)
    pub fn empty(bytes_consumed: usize) -> Self {
        Self {
            bytes_consumed,
            ..Self::default()
        }
    }

    /// 构造错误输出
    pub fn fault(code: u8, message: impl Into<String>) -> Self {
        Self {
            error: Some(DecodeFault {
                code,
                message: message.into(),
            }),
            ..Self::default()
        }
    }

    /// 是否带有错误
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// 打开适配器时的选项
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdapterOptions {
    /// 使用旧版 ADTS 头部约定 (MPEG-4 帧头中多出 2 bit emphasis 字段)
    pub legacy_adts: bool,
}

/// 解码器适配器 trait
pub trait CodecAdapter: Send {
    /// 获取适配器名称
    fn name(&self) -> &str;

    /// 是否处于旧版 ADTS 模式
    fn legacy_adts(&self) -> bool;

    /// 使用解码配置 (AudioSpecificConfig) 初始化
    fn init(&mut self, config: &[u8]) -> AacResult<StreamConfig>;

    /// 直接使用裸流缓冲区初始化 (适配器自行识别 ADTS 帧)
    fn init_raw(&mut self, buffer: &[u8]) -> AacResult<RawInit>;

    /// 解码一个压缩单元
    fn decode_unit(&mut self, data: &[u8]) -> DecodeOutput;

    /// 释放句柄
    fn close(&mut self);
}

/// 适配器工厂 trait
///
/// 裸流模式在解码出错时需要以另一种 ADTS 约定重新打开适配器,
/// 因此引擎持有工厂而不是单个适配器实例.
pub trait CodecFactory: Send + Sync {
    /// 打开一个新的适配器句柄
    fn open(&self, options: AdapterOptions) -> AacResult<Box<dyn CodecAdapter>>;
}
