//! # aacplay-core
//!
//! aacplay 核心库, 提供统一错误类型、PCM 采样格式与比特流读取器.
//!
//! 其余 crate (codec / format / playback) 都建立在本 crate 之上.

pub mod bitreader;
pub mod error;
pub mod sample_format;

// 重导出常用类型
pub use error::{AacError, AacResult};
pub use sample_format::SampleFormat;
