// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// FFmpeg解码过滤器模块
/// FFmpeg decode filter module
///
/// 解码图中已经追加 `format=rgb24`, 这里只负责按行拷贝成紧凑的 RGB 缓冲区,
/// 送入有界通道。通道满时阻塞解码线程 (即读游标不会超前于消费者)。
use crossbeam_channel::Sender;
use ez_ffmpeg::filter::frame_filter::FrameFilter;
use ez_ffmpeg::filter::frame_filter_context::FrameFilterContext;
use ez_ffmpeg::{AVMediaType, Frame};
use image::RgbImage;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// FFmpeg解码过滤器: 视频帧 → RGB帧
#[derive(Clone)]
pub struct DecodeFilter {
    tx: Sender<RgbImage>,
    released: Arc<AtomicBool>, // 采集句柄已释放, 停止解码
    count: usize,
    last: Instant,
    dropped_frames: usize,
    total_frames: usize,
}

impl DecodeFilter {
    pub fn new(tx: Sender<RgbImage>, released: Arc<AtomicBool>) -> Self {
        Self {
            tx,
            released,
            count: 0,
            last: Instant::now(),
            dropped_frames: 0,
            total_frames: 0,
        }
    }
}

impl FrameFilter for DecodeFilter {
    fn media_type(&self) -> AVMediaType {
        AVMediaType::AVMEDIA_TYPE_VIDEO
    }

    fn init(&mut self, _ctx: &FrameFilterContext) -> Result<(), String> {
        log::debug!("✅ 解码线程启动");
        Ok(())
    }

    fn filter_frame(
        &mut self,
        frame: Frame,
        _ctx: &FrameFilterContext,
    ) -> Result<Option<Frame>, String> {
        if self.released.load(Ordering::Acquire) {
            return Err("capture released".to_string());
        }

        self.total_frames += 1;

        // 基本检查：空帧或损坏帧
        if frame.as_ptr().is_null() || frame.is_empty() || frame.is_corrupt() {
            self.dropped_frames += 1;
            return Ok(None);
        }

        let rgb = unsafe {
            let raw = &*frame.as_ptr();
            let w = raw.width as u32;
            let h = raw.height as u32;
            let stride = raw.linesize[0] as usize;
            let plane = raw.data[0];

            if w == 0 || h == 0 || plane.is_null() || stride < w as usize * 3 {
                self.dropped_frames += 1;
                return Ok(None);
            }

            // rgb24 单平面, 去掉每行的对齐填充
            let row_bytes = w as usize * 3;
            let mut buffer = Vec::with_capacity(row_bytes * h as usize);
            for y in 0..h as usize {
                let row = std::slice::from_raw_parts(plane.add(y * stride), row_bytes);
                buffer.extend_from_slice(row);
            }
            RgbImage::from_raw(w, h, buffer)
        };

        let Some(rgb) = rgb else {
            self.dropped_frames += 1;
            return Ok(None);
        };

        self.count += 1;
        if self.last.elapsed().as_secs_f64() >= 1.0 {
            let elapsed = self.last.elapsed().as_secs_f64();
            log::debug!(
                "📺 解码统计: {:.1}fps | 总帧{} | 丢弃{}",
                self.count as f64 / elapsed,
                self.total_frames,
                self.dropped_frames
            );
            self.last = Instant::now();
            self.count = 0;
        }

        // 接收端已释放 → 结束解码
        self.tx
            .send(rgb)
            .map_err(|_| "capture released".to_string())?;

        Ok(Some(frame))
    }

    fn uninit(&mut self, _ctx: &FrameFilterContext) {
        log::debug!("✅ 解码线程退出");
    }
}
