//! 统一错误类型定义.
//!
//! 所有 aacplay crate 共用的错误类型, 覆盖轨道启动失败、稳态解码失败与 I/O 失败.

use thiserror::Error;

/// aacplay 统一错误类型
#[derive(Debug, Error)]
pub enum AacError {
    /// 容器中没有 AAC 音频轨道
    #[error("不支持的音频轨道: 容器中未找到 AAC 轨道")]
    UnsupportedTrack,

    /// 解码器拒绝解码配置
    #[error("解码器初始化失败: {0}")]
    ConfigInit(String),

    /// 压缩单元读取失败 (格式错误或被截断)
    #[error("读取错误: {0}")]
    Read(String),

    /// 解码器报告码流损坏
    #[error("解码错误: {0}")]
    Decode(String),

    /// 播放输出打开失败
    #[error("输出错误: {0}")]
    Output(String),

    /// I/O 错误
    #[error("I/O 错误: {0}")]
    Io(#[from] std::io::Error),

    /// 已到达流末尾
    #[error("已到达流末尾")]
    Eof,

    /// 无效数据 (损坏的码流等)
    #[error("无效数据: {0}")]
    InvalidData(String),

    /// 不支持的操作
    #[error("不支持的操作: {0}")]
    Unsupported(String),

    /// 无效参数
    #[error("无效参数: {0}")]
    InvalidArgument(String),

    /// 内部错误 (不应发生)
    #[error("内部错误: {0}")]
    Internal(String),
}

impl AacError {
    /// 是否属于 "无法播放此轨道" 一类的启动失败
    ///
    /// 这类错误发生在产生任何 PCM 之前, 调用方不会观察到部分状态.
    pub fn is_startup_failure(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedTrack | Self::ConfigInit(_) | Self::Output(_)
        )
    }

    /// 是否为流末尾 (而非真正的 I/O 故障)
    pub fn is_eof(&self) -> bool {
        match self {
            Self::Eof => true,
            Self::Io(e) => e.kind() == std::io::ErrorKind::UnexpectedEof,
            _ => false,
        }
    }
}

/// aacplay 统一 Result 类型
pub type AacResult<T> = Result<T, AacError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_启动失败分类() {
        assert!(AacError::UnsupportedTrack.is_startup_failure());
        assert!(AacError::ConfigInit("asc".into()).is_startup_failure());
        assert!(AacError::Output("device".into()).is_startup_failure());
        assert!(!AacError::Read("短读".into()).is_startup_failure());
        assert!(!AacError::Decode("crc".into()).is_startup_failure());
    }

    #[test]
    fn test_eof_判定() {
        assert!(AacError::Eof.is_eof());
        let io = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof");
        assert!(AacError::from(io).is_eof());
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        assert!(!AacError::from(io).is_eof());
    }
}
