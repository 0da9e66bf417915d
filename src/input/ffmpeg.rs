// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! FFmpeg 采集句柄 - 摄像头与视频文件
//!
//! FFmpeg 调度器在后台线程中推帧, `DecodeFilter` 把帧写入容量为
//! `FRAME_QUEUE` 的通道; `read()` 从通道取帧。释放时置位 `released`
//! 并丢弃接收端, 解码管线在下一帧处退出。

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::Receiver;
use ez_ffmpeg::core::context::null_output::create_null_output;
use ez_ffmpeg::filter::frame_pipeline_builder::FramePipelineBuilder;
use ez_ffmpeg::{AVMediaType, FfmpegContext, Input};
use image::RgbImage;

use super::camera::{camera_input_format, format_camera_url, get_camera_devices};
use super::decode_filter::DecodeFilter;
use super::{receive_frame, Capture, SourceInfo};
use crate::error::{MediaError, MediaResult};

const FRAME_QUEUE: usize = 2;

enum Target {
    Video(PathBuf),
    Camera { url: String, format: &'static str },
}

impl Target {
    fn name(&self) -> String {
        match self {
            Target::Video(path) => path.display().to_string(),
            Target::Camera { url, .. } => url.clone(),
        }
    }
}

/// 运行中的解码管线
struct Pipeline {
    rx: Receiver<RgbImage>,
    released: Arc<AtomicBool>,
    waiter: Option<JoinHandle<()>>,
}

impl Pipeline {
    fn start(target: &Target, start_time_us: Option<i64>) -> MediaResult<Self> {
        let (tx, rx) = crossbeam_channel::bounded(FRAME_QUEUE);
        let released = Arc::new(AtomicBool::new(false));
        let filter = DecodeFilter::new(tx, released.clone());

        // 构建帧处理管线
        let pipe: FramePipelineBuilder = AVMediaType::AVMEDIA_TYPE_VIDEO.into();
        let pipe = pipe.filter("decode", Box::new(filter));
        let out = create_null_output().add_frame_pipeline(pipe);

        let input = match target {
            Target::Video(path) => {
                let input = Input::new(path.to_string_lossy().to_string());
                match start_time_us {
                    Some(us) => input.set_start_time_us(us),
                    None => input,
                }
            }
            Target::Camera { url, format } => Input::new(url.clone())
                .set_format(*format)
                .set_input_opts([("framerate", "30"), ("video_size", "1280x720")].into()),
        };

        // 构建FFmpeg上下文
        let ctx = FfmpegContext::builder()
            .input(input)
            .filter_desc("format=rgb24")
            .output(out)
            .build()
            .map_err(|e| MediaError::unavailable(target.name(), format!("构建失败: {}", e)))?;

        let sch = ctx
            .start()
            .map_err(|e| MediaError::unavailable(target.name(), format!("启动失败: {}", e)))?;

        let waiter = std::thread::Builder::new()
            .name("ffmpeg-decode".to_string())
            .spawn(move || {
                let _ = sch.wait();
            })?;

        Ok(Self {
            rx,
            released,
            waiter: Some(waiter),
        })
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.released.store(true, Ordering::Release);
        // 清空队列, 解除解码线程在 send 上的阻塞
        while self.rx.try_recv().is_ok() {}
        let (_, dead_rx) = crossbeam_channel::bounded(0);
        let rx = std::mem::replace(&mut self.rx, dead_rx);
        drop(rx);
        if let Some(waiter) = self.waiter.take() {
            let _ = waiter.join();
        }
    }
}

/// FFmpeg 采集句柄
pub struct FfmpegCapture {
    target: Target,
    info: SourceInfo,
    pipeline: Option<Pipeline>,
    position: u64,
    read_timeout: Duration,
}

impl FfmpegCapture {
    /// 打开视频文件
    pub fn open_video(path: &Path, read_timeout: Duration) -> MediaResult<Self> {
        let name = path.display().to_string();
        if !path.exists() {
            return Err(MediaError::unavailable(name, "file not found"));
        }

        let info = probe_video(path);
        let target = Target::Video(path.to_path_buf());
        let pipeline = Pipeline::start(&target, None)?;
        log::info!(
            "🎬 视频已打开: {} ({}x{}, {:?}帧, {:?}fps)",
            name,
            info.width,
            info.height,
            info.frame_count,
            info.fps
        );

        Ok(Self {
            target,
            info,
            pipeline: Some(pipeline),
            position: 0,
            read_timeout,
        })
    }

    /// 打开摄像头
    pub fn open_camera(index: u32, read_timeout: Duration) -> MediaResult<Self> {
        let device_name = get_camera_devices()
            .into_iter()
            .find(|d| d.index == index as usize)
            .map(|d| d.name)
            .unwrap_or_default();
        let url = format_camera_url(index, &device_name);
        let format = camera_input_format();
        log::info!("🔍 使用格式: {}, 输入: {}", format, url);

        let target = Target::Camera { url, format };
        let pipeline = Pipeline::start(&target, None)?;
        log::info!("✅ 摄像头连接成功,开始解码!");

        Ok(Self {
            target,
            info: SourceInfo::default(),
            pipeline: Some(pipeline),
            position: 0,
            read_timeout,
        })
    }
}

impl Capture for FfmpegCapture {
    fn info(&self) -> SourceInfo {
        self.info
    }

    fn read(&mut self) -> MediaResult<Option<RgbImage>> {
        let Some(pipeline) = &self.pipeline else {
            return Ok(None);
        };

        let live = matches!(self.target, Target::Camera { .. });
        let frame = receive_frame(&pipeline.rx, self.read_timeout, live)?;
        if let Some(frame) = &frame {
            if self.info.width == 0 {
                self.info.width = frame.width();
                self.info.height = frame.height();
            }
            self.position += 1;
        }
        Ok(frame)
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn seek(&mut self, frame: u64) -> MediaResult<()> {
        if !matches!(self.target, Target::Video(_)) {
            return Err(MediaError::NotSeekable);
        }
        let fps = self.info.fps.filter(|fps| *fps > 0.0).unwrap_or(25.0);
        let start_us = (frame as f64 / fps * 1_000_000.0) as i64;

        // 先释放旧管线再重新打开
        self.pipeline = None;
        self.pipeline = Some(Pipeline::start(&self.target, Some(start_us))?);
        self.position = frame;
        Ok(())
    }
}

/// 读取视频流信息 (帧数/帧率/分辨率)
fn probe_video(path: &Path) -> SourceInfo {
    let path_str = path.to_string_lossy();
    match ez_ffmpeg::stream_info::find_video_stream_info(path_str.as_ref()) {
        Ok(Some(ez_ffmpeg::stream_info::StreamInfo::Video {
            width,
            height,
            nb_frames,
            avg_frame_rate,
            ..
        })) => {
            let fps = if avg_frame_rate.den != 0 {
                Some(avg_frame_rate.num as f64 / avg_frame_rate.den as f64)
            } else {
                None
            };
            SourceInfo {
                width: width as u32,
                height: height as u32,
                frame_count: (nb_frames > 0).then_some(nb_frames as u64),
                fps,
            }
        }
        Ok(_) => SourceInfo::default(),
        Err(e) => {
            log::warn!("⚠️ 读取视频信息失败: {}", e);
            SourceInfo::default()
        }
    }
}
