// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 查看器配置 - 命令行参数 + JSON 配置文件

use std::fs;
use std::time::Duration;

use clap::Parser;
use serde::{Deserialize, Serialize};

use crate::input::MediaSource;
use crate::pipeline::RetryPolicy;

/// 命令行参数 (覆盖 JSON 配置中的同名项)
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "YOLO Vision - 实时目标检测查看器", long_about = None)]
pub struct Args {
    /// JSON 配置文件路径
    #[arg(long, default_value = "viewer.json")]
    pub config: String,

    /// ONNX 检测模型路径
    #[arg(short, long)]
    pub model: Option<String>,

    /// 置信度阈值
    #[arg(long)]
    pub conf: Option<f32>,

    /// NMS IOU 阈值
    #[arg(long)]
    pub iou: Option<f32>,

    /// 启动时打开的图片/视频文件
    #[arg(short, long)]
    pub input: Option<String>,

    /// 启动时打开的摄像头索引
    #[arg(short, long)]
    pub camera: Option<u32>,

    /// 标注字体 (TTF/OTF)
    #[arg(long)]
    pub font: Option<String>,
}

impl Args {
    /// 加载配置文件并叠加命令行覆盖项
    pub fn resolve(&self) -> ViewerConfig {
        let mut config = ViewerConfig::load(&self.config);
        if let Some(model) = &self.model {
            config.model_path = model.clone();
        }
        if let Some(conf) = self.conf {
            config.conf_threshold = conf;
        }
        if let Some(iou) = self.iou {
            config.iou_threshold = iou;
        }
        if let Some(font) = &self.font {
            config.font_path = font.clone();
        }
        if let Some(camera) = self.camera {
            config.camera_index = camera;
        }
        config
    }

    /// 启动时要打开的输入源
    pub fn initial_source(&self) -> Option<MediaSource> {
        if let Some(path) = &self.input {
            return Some(MediaSource::from_path(path));
        }
        self.camera.map(MediaSource::Camera)
    }
}

/// 界面主题
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Theme {
    #[default]
    Dark,
    Light,
    Ocean,
}

impl Theme {
    pub fn next(self) -> Self {
        match self {
            Theme::Dark => Theme::Light,
            Theme::Light => Theme::Ocean,
            Theme::Ocean => Theme::Dark,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Theme::Dark => "Dark",
            Theme::Light => "Light",
            Theme::Ocean => "Ocean",
        }
    }
}

/// 查看器参数配置
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    // === 模型参数 ===
    pub model_path: String,
    pub input_size: u32,
    pub conf_threshold: f32,
    pub iou_threshold: f32,
    pub intra_threads: usize,

    // === 输入源 ===
    pub camera_index: u32,

    // === 工作线程时序 (毫秒) ===
    pub pause_poll_ms: u64,
    pub camera_frame_interval_ms: u64,
    pub reconnect_max_attempts: u32,
    pub reconnect_delay_ms: u64,
    pub stop_timeout_ms: u64,
    pub read_timeout_ms: u64, // 解码管线无帧超时, 超时按读帧失败处理

    // === 界面 ===
    pub theme: Theme,
    pub font_path: String,
    pub playback_speed: f32,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            model_path: "models/yolov8n.onnx".to_string(),
            input_size: 640,
            conf_threshold: 0.25,
            iou_threshold: 0.45,
            intra_threads: 4,

            camera_index: 0,

            pause_poll_ms: 100,
            camera_frame_interval_ms: 10,
            reconnect_max_attempts: 1,
            reconnect_delay_ms: 500,
            stop_timeout_ms: 1500,
            read_timeout_ms: 5000,

            theme: Theme::Dark,
            font_path: "assets/font/DejaVuSans.ttf".to_string(),
            playback_speed: 1.0,
        }
    }
}

impl ViewerConfig {
    /// 从JSON文件加载配置
    pub fn load(path: &str) -> Self {
        match fs::read_to_string(path) {
            Ok(json) => match serde_json::from_str(&json) {
                Ok(config) => {
                    log::info!("✅ 配置已从 {} 加载", path);
                    config
                }
                Err(e) => {
                    log::warn!("⚠️  配置文件解析失败: {}, 使用默认值", e);
                    Self::default()
                }
            },
            Err(_) => {
                log::info!("📝 配置文件不存在,创建默认配置...");
                let config = Self::default();
                config.save(path);
                config
            }
        }
    }

    /// 保存配置到JSON文件
    pub fn save(&self, path: &str) {
        match serde_json::to_string_pretty(self) {
            Ok(json) => {
                if let Err(e) = fs::write(path, json) {
                    log::error!("❌ 保存配置失败: {}", e);
                } else {
                    log::info!("💾 配置已保存到 {}", path);
                }
            }
            Err(e) => log::error!("❌ 序列化配置失败: {}", e),
        }
    }

    pub fn pause_poll(&self) -> Duration {
        Duration::from_millis(self.pause_poll_ms)
    }

    pub fn camera_frame_interval(&self) -> Duration {
        Duration::from_millis(self.camera_frame_interval_ms)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.reconnect_max_attempts,
            Duration::from_millis(self.reconnect_delay_ms),
        )
    }

    /// 打印当前配置
    pub fn print_summary(&self) {
        log::info!("🎛️  当前配置:");
        log::info!("  模型: {} ({}x{})", self.model_path, self.input_size, self.input_size);
        log::info!(
            "  置信度: {:.2} | IOU: {:.2}",
            self.conf_threshold,
            self.iou_threshold
        );
        log::info!(
            "  重连: 最多{}次, 间隔{}ms | 停止超时: {}ms",
            self.reconnect_max_attempts,
            self.reconnect_delay_ms,
            self.stop_timeout_ms
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = ViewerConfig::default();
        assert_eq!(config.input_size, 640);
        assert_eq!(config.reconnect_max_attempts, 1);
        assert_eq!(config.pause_poll(), Duration::from_millis(100));
        assert_eq!(config.theme, Theme::Dark);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: ViewerConfig =
            serde_json::from_str(r#"{ "conf_threshold": 0.5, "theme": "Light" }"#).unwrap();
        assert_eq!(config.conf_threshold, 0.5);
        assert_eq!(config.theme, Theme::Light);
        assert_eq!(config.stop_timeout_ms, 1500);
        assert_eq!(config.read_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_load_missing_file_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("viewer.json");
        let path = path.to_str().unwrap();

        let config = ViewerConfig::load(path);
        assert_eq!(config.model_path, "models/yolov8n.onnx");
        assert!(std::path::Path::new(path).exists());
    }

    #[test]
    fn test_args_override_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("viewer.json");
        let args = Args::parse_from([
            "viewer",
            "--config",
            path.to_str().unwrap(),
            "--model",
            "models/yolov8s.onnx",
            "--conf",
            "0.4",
            "--camera",
            "2",
        ]);

        let config = args.resolve();
        assert_eq!(config.model_path, "models/yolov8s.onnx");
        assert_eq!(config.conf_threshold, 0.4);
        assert_eq!(config.camera_index, 2);
        assert_eq!(args.initial_source(), Some(MediaSource::Camera(2)));
    }

    #[test]
    fn test_theme_cycle() {
        assert_eq!(Theme::Dark.next(), Theme::Light);
        assert_eq!(Theme::Ocean.next(), Theme::Dark);
    }
}
