// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 异步模型加载: 界面先启动, 模型在后台线程加载完成后通知控制器

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use crossbeam_channel::Receiver;

use super::yolov8::YOLOv8;
use crate::config::ViewerConfig;
use crate::detection::SharedDetector;
use crate::error::MediaError;

pub enum ModelEvent {
    Loaded(SharedDetector),
    Failed(MediaError),
}

impl std::fmt::Debug for ModelEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelEvent::Loaded(detector) => write!(f, "Loaded({})", detector.name()),
            ModelEvent::Failed(e) => write!(f, "Failed({})", e),
        }
    }
}

/// 后台加载 YOLOv8 模型
pub fn spawn(config: ViewerConfig) -> Receiver<ModelEvent> {
    log::info!("📦 正在加载模型: {}", config.model_path);
    spawn_with(move || {
        let model = YOLOv8::new(&config)?;
        Ok(Arc::new(model) as SharedDetector)
    })
}

/// 在后台线程执行任意加载函数
///
/// 线程无法创建时接收端直接断开, 控制器按加载失败处理。
pub fn spawn_with<F>(load: F) -> Receiver<ModelEvent>
where
    F: FnOnce() -> Result<SharedDetector> + Send + 'static,
{
    let (tx, rx) = crossbeam_channel::bounded(1);
    let spawned = std::thread::Builder::new()
        .name("model-loader".to_string())
        .spawn(move || {
            let t = Instant::now();
            let event = match load() {
                Ok(detector) => {
                    log::info!(
                        "✅ 模型加载完成: {} ({:.2}s)",
                        detector.name(),
                        t.elapsed().as_secs_f64()
                    );
                    ModelEvent::Loaded(detector)
                }
                Err(e) => {
                    log::error!("❌ 模型加载失败: {:#}", e);
                    ModelEvent::Failed(MediaError::ModelLoad(format!("{:#}", e)))
                }
            };
            let _ = tx.send(event);
        });

    if let Err(e) = spawned {
        log::error!("❌ 无法创建模型加载线程: {}", e);
    }
    rx
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StubDetector;
    use std::time::Duration;

    #[test]
    fn test_loaded_event() {
        let rx = spawn_with(|| Ok(StubDetector::empty()));
        match rx.recv_timeout(Duration::from_secs(5)).unwrap() {
            ModelEvent::Loaded(detector) => assert_eq!(detector.name(), "stub"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_missing_model_fails() {
        let config = ViewerConfig {
            model_path: "/definitely/not/a/model.onnx".to_string(),
            ..ViewerConfig::default()
        };
        let rx = spawn(config);
        assert!(matches!(
            rx.recv_timeout(Duration::from_secs(30)).unwrap(),
            ModelEvent::Failed(MediaError::ModelLoad(_))
        ));
    }
}
