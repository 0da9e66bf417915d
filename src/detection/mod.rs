// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 检测系统 (Detection System)
///
/// - types:    检测框与检测结果
/// - detector: 检测器接口 (模型加载后只读共享)
/// - annotate: 在原图上绘制检测框与类别标签
pub mod annotate;
pub mod detector;
pub mod types;

pub use annotate::Annotator;
pub use detector::{Detector, SharedDetector};
pub use types::{BBox, Detection};
