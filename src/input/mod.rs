// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 视频输入系统 (Video Input System)
///
/// 采集句柄只由工作线程打开/释放:
/// - image:  静态图片 (单帧)
/// - camera: 本地摄像头 (DirectShow/AVFoundation/V4L2)
/// - ffmpeg: 摄像头/视频文件解码 (需要 `ffmpeg` feature)
pub mod camera;
#[cfg(feature = "ffmpeg")]
pub mod decode_filter;
#[cfg(feature = "ffmpeg")]
pub mod ffmpeg;
pub mod image;

use std::path::{Path, PathBuf};
use std::time::Duration;

use ::image::RgbImage;
use crossbeam_channel::{Receiver, RecvTimeoutError};

use crate::config::ViewerConfig;
use crate::error::{MediaError, MediaResult};

pub use self::camera::{format_camera_url, get_camera_devices, VideoDevice};
pub use self::image::ImageCapture;

const IMAGE_EXTENSIONS: [&str; 9] = ["png", "jpg", "jpeg", "bmp", "webp", "gif", "tif", "tiff", "ico"];

/// 输入源描述 (会话开始后不可变)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaSource {
    Camera(u32),
    Video(PathBuf),
    Image(PathBuf),
}

impl MediaSource {
    /// 按扩展名区分图片与视频
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let is_image = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
            .unwrap_or(false);
        if is_image {
            MediaSource::Image(path.to_path_buf())
        } else {
            MediaSource::Video(path.to_path_buf())
        }
    }

    /// 显示名称: 文件名 / 摄像头编号
    pub fn display_name(&self) -> String {
        match self {
            MediaSource::Camera(index) => format!("Webcam #{}", index),
            MediaSource::Video(path) | MediaSource::Image(path) => path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
        }
    }

    pub fn is_camera(&self) -> bool {
        matches!(self, MediaSource::Camera(_))
    }

    pub fn is_video(&self) -> bool {
        matches!(self, MediaSource::Video(_))
    }

    pub fn is_image(&self) -> bool {
        matches!(self, MediaSource::Image(_))
    }

    /// 只有视频文件支持跳转
    pub fn is_seekable(&self) -> bool {
        self.is_video()
    }
}

/// 打开后由采集句柄报告的源信息
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SourceInfo {
    pub width: u32,
    pub height: u32,
    pub frame_count: Option<u64>, // 仅视频
    pub fps: Option<f64>,         // 仅视频
}

impl SourceInfo {
    /// 视频总时长 (秒)
    pub fn duration_secs(&self) -> Option<f64> {
        match (self.frame_count, self.fps) {
            (Some(count), Some(fps)) if fps > 0.0 => Some(count as f64 / fps),
            _ => None,
        }
    }
}

/// 采集句柄; Drop 即释放底层设备/文件
pub trait Capture: Send {
    fn info(&self) -> SourceInfo;

    /// 读取下一帧 (RGB); `Ok(None)` 表示流结束
    fn read(&mut self) -> MediaResult<Option<RgbImage>>;

    /// 读游标: 下一帧的索引
    fn position(&self) -> u64;

    /// 移动读游标 (仅可跳转的源)
    fn seek(&mut self, _frame: u64) -> MediaResult<()> {
        Err(MediaError::NotSeekable)
    }
}

/// 根据输入源打开采集句柄
pub trait CaptureProvider: Send + Sync {
    fn open(&self, source: &MediaSource) -> MediaResult<Box<dyn Capture>>;
}

/// 从解码通道取一帧
///
/// 超过 `timeout` 没有新帧视为读帧失败 (摄像头据此触发重连);
/// 通道断开时文件源为流结束, 实时源为读帧失败。
#[cfg_attr(not(feature = "ffmpeg"), allow(dead_code))]
pub(crate) fn receive_frame(
    rx: &Receiver<RgbImage>,
    timeout: Duration,
    live: bool,
) -> MediaResult<Option<RgbImage>> {
    match rx.recv_timeout(timeout) {
        Ok(frame) => Ok(Some(frame)),
        Err(RecvTimeoutError::Timeout) => Err(MediaError::FrameRead(format!(
            "no frame within {}ms",
            timeout.as_millis()
        ))),
        Err(RecvTimeoutError::Disconnected) if live => Err(MediaError::FrameRead(
            "stream stopped delivering frames".to_string(),
        )),
        Err(RecvTimeoutError::Disconnected) => Ok(None),
    }
}

/// 默认采集提供者: 图片走 image crate, 摄像头/视频走 FFmpeg
#[derive(Debug, Clone)]
pub struct MediaCaptureProvider {
    read_timeout: Duration,
}

impl MediaCaptureProvider {
    pub fn new(read_timeout: Duration) -> Self {
        Self { read_timeout }
    }

    pub fn from_config(config: &ViewerConfig) -> Self {
        Self::new(config.read_timeout())
    }

    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }
}

impl Default for MediaCaptureProvider {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

impl CaptureProvider for MediaCaptureProvider {
    fn open(&self, source: &MediaSource) -> MediaResult<Box<dyn Capture>> {
        match source {
            MediaSource::Image(path) => Ok(Box::new(ImageCapture::open(path)?)),
            #[cfg(feature = "ffmpeg")]
            MediaSource::Video(path) => Ok(Box::new(ffmpeg::FfmpegCapture::open_video(
                path,
                self.read_timeout,
            )?)),
            #[cfg(feature = "ffmpeg")]
            MediaSource::Camera(index) => Ok(Box::new(ffmpeg::FfmpegCapture::open_camera(
                *index,
                self.read_timeout,
            )?)),
            #[cfg(not(feature = "ffmpeg"))]
            other => Err(MediaError::unavailable(
                other.display_name(),
                "built without the `ffmpeg` feature",
            )),
        }
    }
}
