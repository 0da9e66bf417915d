// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 采集/推理流水线 (Capture/Inference Pipeline)
///
/// 一个会话一个工作线程, 通过 crossbeam 通道与控制器通信:
/// - worker:  采集 → 检测 → 标注 → 发布 (独立线程)
/// - control: 停止/暂停/跳转/单步/倍速 原子信号
/// - retry:   摄像头重连策略
/// - export:  标注帧保存为 PNG (无界面检测)
pub mod control;
pub mod export;
pub mod retry;
pub mod worker;

use std::fmt;

use image::RgbaImage;

use crate::detection::Detection;
use crate::input::SourceInfo;

pub use control::SessionControl;
pub use export::FrameExporter;
pub use retry::RetryPolicy;
pub use worker::{Worker, WorkerHandle, WorkerSettings};

/// 会话编号 (单调递增); 控制器据此丢弃过期会话的事件
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SessionId(pub u64);

impl SessionId {
    pub fn next(self) -> Self {
        SessionId(self.0 + 1)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ========== 工作线程 → 控制器 消息 ==========

/// 已标注、可直接显示的帧 (所有权从工作线程转移给控制器)
#[derive(Clone, Debug)]
pub struct RenderedFrame {
    pub image: RgbaImage,
    pub detections: Vec<Detection>,
    pub frame_index: Option<u64>, // 仅视频
}

impl RenderedFrame {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

#[derive(Debug)]
pub struct WorkerEvent {
    pub session: SessionId,
    pub kind: WorkerEventKind,
}

#[derive(Debug)]
pub enum WorkerEventKind {
    /// 采集句柄已打开
    Opened(SourceInfo),
    Frame(RenderedFrame),
    Status(Status),
    /// 完成信号: 发送前采集句柄已释放
    Finished(EndReason),
}

/// 会话结束原因
#[derive(Debug, Clone, PartialEq)]
pub enum EndReason {
    StreamEnded,
    Stopped,
    /// 图片处理完成
    Completed,
    SourceUnavailable,
    ReconnectFailed,
    Failed(String),
}

impl EndReason {
    /// 结束时附带的状态消息
    pub fn status(&self) -> Option<Status> {
        match self {
            EndReason::StreamEnded => Some(Status::StreamEnded),
            EndReason::Stopped => Some(Status::Stopped),
            EndReason::ReconnectFailed => Some(Status::ReconnectFailed),
            EndReason::Failed(reason) => Some(Status::WorkerFailed(reason.clone())),
            EndReason::Completed | EndReason::SourceUnavailable => None,
        }
    }
}

/// 状态分类, 展示层按此选择颜色
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Error,
    Success,
    Info,
    Neutral,
}

/// 结构化状态消息, 在事件源头产生
#[derive(Debug, Clone, PartialEq)]
pub enum Status {
    // 模型
    ModelLoading,
    ModelReady,
    ModelLoadFailed(String),

    // 会话开始
    CameraStarted(u32),
    VideoStarted { name: String, frames: Option<u64> },
    ImageProcessed { objects: usize },

    // 错误
    SourceUnavailable(String),
    ReadFailed(String),
    ReconnectFailed,
    DetectionFailed(String),
    SeekRejected,
    WorkerFailed(String),

    // 过程
    Reconnecting { attempt: u32, max_attempts: u32 },
    Paused,
    Resumed,
    Seeked { frame: u64 },
    SpeedChanged(f32),
    Stopping,

    // 结束/空闲
    StreamEnded,
    Stopped,
    NoActiveSession,
}

impl Status {
    pub fn kind(&self) -> StatusKind {
        use Status::*;
        match self {
            ModelLoadFailed(_) | SourceUnavailable(_) | ReadFailed(_) | ReconnectFailed
            | DetectionFailed(_) | SeekRejected | WorkerFailed(_) => StatusKind::Error,
            ModelReady | CameraStarted(_) | VideoStarted { .. } | ImageProcessed { .. } => {
                StatusKind::Success
            }
            ModelLoading | Reconnecting { .. } | Paused | Resumed | Seeked { .. }
            | SpeedChanged(_) | Stopping => StatusKind::Info,
            StreamEnded | Stopped | NoActiveSession => StatusKind::Neutral,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::ModelLoading => write!(f, "Loading detection model..."),
            Status::ModelReady => write!(f, "Model loaded. Ready"),
            Status::ModelLoadFailed(e) => write!(f, "Model load failed: {}", e),
            Status::CameraStarted(index) => write!(f, "Camera #{} started", index),
            Status::VideoStarted { name, frames } => match frames {
                Some(n) => write!(f, "Playing {} ({} frames)", name, n),
                None => write!(f, "Playing {}", name),
            },
            Status::ImageProcessed { objects } => {
                write!(f, "Image processed: {} objects detected", objects)
            }
            Status::SourceUnavailable(e) => write!(f, "Cannot open source: {}", e),
            Status::ReadFailed(e) => write!(f, "Frame read failed: {}", e),
            Status::ReconnectFailed => write!(f, "Camera reconnect failed"),
            Status::DetectionFailed(e) => write!(f, "Detection failed: {}", e),
            Status::SeekRejected => write!(f, "Seeking is only available for video files"),
            Status::WorkerFailed(e) => write!(f, "Processing aborted: {}", e),
            Status::Reconnecting {
                attempt,
                max_attempts,
            } => write!(f, "Camera read failed, reconnecting ({}/{})", attempt, max_attempts),
            Status::Paused => write!(f, "Paused"),
            Status::Resumed => write!(f, "Resumed"),
            Status::Seeked { frame } => write!(f, "Jumped to frame {}", frame),
            Status::SpeedChanged(speed) => write!(f, "Playback speed {:.2}x", speed),
            Status::Stopping => write!(f, "Stopping..."),
            Status::StreamEnded => write!(f, "Video playback finished"),
            Status::Stopped => write!(f, "Stopped"),
            Status::NoActiveSession => write!(f, "Nothing is playing"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_kind_mapping() {
        assert_eq!(Status::ReconnectFailed.kind(), StatusKind::Error);
        assert_eq!(Status::SourceUnavailable("x".into()).kind(), StatusKind::Error);
        assert_eq!(Status::CameraStarted(0).kind(), StatusKind::Success);
        assert_eq!(
            Status::Reconnecting {
                attempt: 1,
                max_attempts: 1
            }
            .kind(),
            StatusKind::Info
        );
        assert_eq!(Status::StreamEnded.kind(), StatusKind::Neutral);
    }

    #[test]
    fn test_status_text() {
        assert_eq!(
            Status::ImageProcessed { objects: 3 }.to_string(),
            "Image processed: 3 objects detected"
        );
        assert_eq!(
            Status::Reconnecting {
                attempt: 1,
                max_attempts: 1
            }
            .to_string(),
            "Camera read failed, reconnecting (1/1)"
        );
    }

    #[test]
    fn test_end_reason_status() {
        assert_eq!(EndReason::StreamEnded.status(), Some(Status::StreamEnded));
        assert_eq!(EndReason::Completed.status(), None);
        assert_eq!(
            EndReason::Failed("boom".into()).status().map(|s| s.kind()),
            Some(StatusKind::Error)
        );
    }

    #[test]
    fn test_session_id_order() {
        let first = SessionId::default();
        assert!(first.next() > first);
        assert_eq!(first.next().to_string(), "#1");
    }
}
