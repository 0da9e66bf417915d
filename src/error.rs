// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 错误类型 (Error taxonomy)
//!
//! 工作线程内部的错误不会跨线程抛出, 而是转换成 `pipeline::Status` 投递给控制器。

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MediaError {
    /// 采集设备/文件无法打开
    #[error("source unavailable: {source_name}: {reason}")]
    SourceUnavailable { source_name: String, reason: String },

    /// 读帧失败 (瞬时错误)
    #[error("frame read failed: {0}")]
    FrameRead(String),

    /// 模型加载失败 (致命)
    #[error("model load failed: {0}")]
    ModelLoad(String),

    /// 模型尚未加载完成
    #[error("model is not ready")]
    ModelNotReady,

    /// 该输入源不支持跳转
    #[error("source is not seekable")]
    NotSeekable,

    #[error("image decode failed: {path}: {reason}")]
    ImageDecode { path: PathBuf, reason: String },

    #[error("worker spawn failed: {0}")]
    Spawn(#[from] std::io::Error),
}

impl MediaError {
    pub fn unavailable(source_name: impl Into<String>, reason: impl ToString) -> Self {
        MediaError::SourceUnavailable {
            source_name: source_name.into(),
            reason: reason.to_string(),
        }
    }
}

pub type MediaResult<T> = std::result::Result<T, MediaError>;
