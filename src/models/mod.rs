// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 检测模型
///
/// - yolov8: ONNX Runtime 推理 (letterbox 预处理 → run → 解码 + NMS)
/// - loader: 后台线程加载模型, 通过通道通知控制器
///
/// ```text
/// RgbImage → letterbox → NCHW 张量
///          ↓
///     ONNX Runtime
///          ↓
///     [1, 4+nc, N] → decode_predictions → Vec<Detection>
/// ```
pub mod loader;
pub mod yolov8;

pub use loader::ModelEvent;
pub use yolov8::YOLOv8;
