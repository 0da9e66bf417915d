// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 检测器接口 (Detector)
//! 职责: RGB图像 → 检测结果列表
//!
//! 模型在启动时加载一次, 之后只读, 多个会话顺序共享同一实例。

use std::sync::Arc;

use anyhow::Result;
use image::RgbImage;

use super::types::Detection;

/// 统一的检测器接口
///
/// 同步阻塞调用; 实现必须是无状态的 (或内部自行加锁),
/// 以便通过 `Arc` 在工作线程之间复用。
pub trait Detector: Send + Sync {
    /// 检测单张 RGB 图像, 坐标为输入图像的像素坐标
    fn detect(&self, image: &RgbImage) -> Result<Vec<Detection>>;

    /// 检测器名称 (日志用)
    fn name(&self) -> &str;
}

pub type SharedDetector = Arc<dyn Detector>;
