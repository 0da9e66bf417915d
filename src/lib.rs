#![allow(clippy::type_complexity)]
// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
pub mod config; // 配置参数 (CLI + JSON)
pub mod controller; // 展示控制器 (会话状态机)
pub mod detection; // 检测结果类型、检测器接口与标注
pub mod error; // 错误类型
pub mod input; // 视频输入系统
pub mod models; // 模型实现与异步加载
pub mod pipeline; // 采集/推理工作线程
pub mod viewer; // macroquad + egui 窗口

#[cfg(test)]
pub(crate) mod testing;

pub use crate::config::{Args, ViewerConfig};
pub use crate::controller::{Controller, Controls, ModelState, SessionState};
pub use crate::detection::{Annotator, BBox, Detection, Detector, SharedDetector};
pub use crate::error::{MediaError, MediaResult};
pub use crate::input::{Capture, CaptureProvider, MediaCaptureProvider, MediaSource, SourceInfo};
pub use crate::pipeline::{EndReason, RenderedFrame, SessionId, Status, StatusKind, WorkerEvent};

pub fn gen_time_string(delimiter: &str) -> String {
    let t_now = chrono::Local::now();
    let fmt = format!(
        "%Y{}%m{}%d{}%H{}%M{}%S",
        delimiter, delimiter, delimiter, delimiter, delimiter
    );
    t_now.format(&fmt).to_string()
}
