// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 标注帧导出: 消费工作线程事件, 每帧保存为 PNG

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use crossbeam_channel::Receiver;

use super::worker::WorkerHandle;
use super::{EndReason, RenderedFrame, WorkerEvent, WorkerEventKind};

pub struct FrameExporter {
    output: PathBuf,
    max_frames: Option<u64>,
    saved: u64,
}

impl FrameExporter {
    pub fn new(output: impl Into<PathBuf>, max_frames: Option<u64>) -> Self {
        Self {
            output: output.into(),
            max_frames,
            saved: 0,
        }
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    pub fn saved(&self) -> u64 {
        self.saved
    }

    /// 视频按帧序号命名, 其余按保存顺序
    pub fn frame_path(&self, frame: &RenderedFrame) -> PathBuf {
        let index = frame.frame_index.unwrap_or(self.saved);
        self.output.join(format!("frame_{:06}.png", index))
    }

    /// 消费事件直到 `Finished`
    ///
    /// 保存失败时先停止工作线程并等待其释放采集句柄, 再返回错误。
    pub fn run(
        &mut self,
        events: &Receiver<WorkerEvent>,
        handle: &mut WorkerHandle,
        stop_timeout: Duration,
    ) -> Result<EndReason> {
        for event in events.iter() {
            if event.session != handle.id() {
                continue;
            }
            match event.kind {
                WorkerEventKind::Frame(frame) => {
                    if self.is_full() {
                        continue;
                    }
                    if let Err(e) = self.save(&frame) {
                        if !handle.stop_and_wait(stop_timeout) {
                            log::warn!("⚠️ 工作线程 {} 未在超时内退出", handle.id());
                        }
                        return Err(e);
                    }
                    if self.is_full() {
                        handle.stop();
                    }
                }
                WorkerEventKind::Status(status) => log::info!("ℹ️  {}", status),
                WorkerEventKind::Opened(info) => log::info!(
                    "📐 {}x{}, frames={:?}, fps={:?}",
                    info.width,
                    info.height,
                    info.frame_count,
                    info.fps
                ),
                WorkerEventKind::Finished(reason) => {
                    handle.join();
                    log::info!("🏁 结束: {:?}, 共保存 {} 帧", reason, self.saved);
                    return Ok(reason);
                }
            }
        }
        bail!("worker {} exited without a completion signal", handle.id())
    }

    fn is_full(&self) -> bool {
        self.max_frames.is_some_and(|max| self.saved >= max)
    }

    fn save(&mut self, frame: &RenderedFrame) -> Result<()> {
        let path = self.frame_path(frame);
        frame
            .image
            .save(&path)
            .with_context(|| format!("cannot save {}", path.display()))?;
        log::info!("💾 {} ({} objects)", path.display(), frame.detections.len());
        self.saved += 1;
        Ok(())
    }
}
