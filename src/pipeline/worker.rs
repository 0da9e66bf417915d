// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 采集/推理工作线程 (Capture/Inference Worker)
//! 职责: 打开采集句柄 → 读帧 → 检测 → 标注 → 发布 RenderedFrame
//!
//! 采集句柄只在本线程内存在, 任何退出路径 (包括 panic) 都先释放句柄,
//! 再发送 `Finished`。

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use image::{DynamicImage, RgbImage};

use super::{
    EndReason, RenderedFrame, RetryPolicy, SessionControl, SessionId, Status, WorkerEvent,
    WorkerEventKind,
};
use crate::config::ViewerConfig;
use crate::detection::{Annotator, SharedDetector};
use crate::error::MediaResult;
use crate::input::{Capture, CaptureProvider, MediaSource, SourceInfo};

/// 工作线程时序参数
#[derive(Debug, Clone, Copy)]
pub struct WorkerSettings {
    pub pause_poll: Duration,
    pub camera_frame_interval: Duration,
    pub retry: RetryPolicy,
    pub speed: f32,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self::from_config(&ViewerConfig::default())
    }
}

impl WorkerSettings {
    pub fn from_config(config: &ViewerConfig) -> Self {
        Self {
            pause_poll: config.pause_poll(),
            camera_frame_interval: config.camera_frame_interval(),
            retry: config.retry_policy(),
            speed: config.playback_speed,
        }
    }
}

pub struct Worker {
    id: SessionId,
    source: MediaSource,
    provider: Arc<dyn CaptureProvider>,
    detector: SharedDetector,
    annotator: Arc<Annotator>,
    settings: WorkerSettings,
    control: Arc<SessionControl>,
    events: Sender<WorkerEvent>,
}

impl Worker {
    pub fn new(
        id: SessionId,
        source: MediaSource,
        provider: Arc<dyn CaptureProvider>,
        detector: SharedDetector,
        events: Sender<WorkerEvent>,
    ) -> Self {
        let settings = WorkerSettings::default();
        Self {
            id,
            source,
            provider,
            detector,
            annotator: Arc::new(Annotator::boxes_only()),
            control: Arc::new(SessionControl::new(settings.speed)),
            settings,
            events,
        }
    }

    pub fn with_annotator(mut self, annotator: Arc<Annotator>) -> Self {
        self.annotator = annotator;
        self
    }

    pub fn with_settings(mut self, settings: WorkerSettings) -> Self {
        self.control.set_speed(settings.speed);
        self.settings = settings;
        self
    }

    /// 启动工作线程
    pub fn spawn(self) -> MediaResult<WorkerHandle> {
        let id = self.id;
        let control = self.control.clone();
        let (done_tx, done_rx) = crossbeam_channel::bounded::<()>(0);

        let thread = std::thread::Builder::new()
            .name(format!("worker-{}", id.0))
            .spawn(move || self.run(done_tx))?;

        Ok(WorkerHandle {
            id,
            control,
            done: done_rx,
            thread: Some(thread),
        })
    }

    fn run(self, done: Sender<()>) {
        log::info!("🎬 工作线程启动 {}: {}", self.id, self.source.display_name());
        let guard = FinishGuard {
            id: self.id,
            events: self.events.clone(),
            finished: false,
            _done: done,
        };

        // 采集句柄在 run_session 内部创建和释放
        let reason = self.run_session();

        if let Some(status) = reason.status() {
            self.emit(status);
        }
        log::info!("🏁 工作线程结束 {}: {:?}", self.id, reason);
        guard.finish(reason);
    }

    fn run_session(&self) -> EndReason {
        let capture = match self.provider.open(&self.source) {
            Ok(capture) => capture,
            Err(e) => {
                log::error!("❌ 打开输入源失败: {}", e);
                self.emit(Status::SourceUnavailable(e.to_string()));
                return EndReason::SourceUnavailable;
            }
        };

        let info = capture.info();
        self.publish(WorkerEventKind::Opened(info));

        match &self.source {
            MediaSource::Image(_) => self.run_image(capture),
            MediaSource::Camera(index) => {
                self.emit(Status::CameraStarted(*index));
                self.run_stream(capture, info)
            }
            MediaSource::Video(_) => {
                self.emit(Status::VideoStarted {
                    name: self.source.display_name(),
                    frames: info.frame_count,
                });
                self.run_stream(capture, info)
            }
        }
    }

    /// 图片: 单次 解码-检测-标注-发布
    fn run_image(&self, mut capture: Box<dyn Capture>) -> EndReason {
        match capture.read() {
            Ok(Some(frame)) => {
                let rendered = self.process(frame, None);
                let objects = rendered.detections.len();
                self.publish(WorkerEventKind::Frame(rendered));
                self.emit(Status::ImageProcessed { objects });
                EndReason::Completed
            }
            Ok(None) => {
                let reason = "image contained no frame".to_string();
                self.emit(Status::ReadFailed(reason.clone()));
                EndReason::Failed(reason)
            }
            Err(e) => {
                self.emit(Status::ReadFailed(e.to_string()));
                EndReason::Failed(e.to_string())
            }
        }
    }

    /// 摄像头/视频主循环
    fn run_stream(&self, capture: Box<dyn Capture>, info: SourceInfo) -> EndReason {
        let is_video = self.source.is_video();
        let retry = self.settings.retry;
        let mut slot = Some(capture);
        let mut attempts = 0u32;
        let mut was_paused = false;

        loop {
            // 1. 停止信号
            if self.control.is_stop_requested() {
                return EndReason::Stopped;
            }

            let Some(capture) = slot.as_mut() else {
                return EndReason::ReconnectFailed;
            };

            // 2. 跳转
            let mut show_seeked = false;
            if let Some(target) = self.control.take_seek() {
                show_seeked = self.apply_seek(capture.as_mut(), target, &info);
            }

            // 3. 暂停: 不读帧, 读游标不动
            if self.control.is_paused() {
                if !was_paused {
                    was_paused = true;
                    log::info!("⏸️ 暂停 {}", self.id);
                    self.emit(Status::Paused);
                }
                let step = self.control.take_step();
                if !(show_seeked || step) {
                    std::thread::sleep(self.settings.pause_poll);
                    continue;
                }
            } else if was_paused {
                was_paused = false;
                log::info!("▶️ 继续 {}", self.id);
                self.emit(Status::Resumed);
            }

            // 4. 读帧
            let started = Instant::now();
            let failure = match capture.read() {
                Ok(Some(frame)) => {
                    attempts = 0;
                    let position = capture.position();
                    self.control.set_current_frame(position);
                    let index = is_video.then(|| position.saturating_sub(1));
                    let rendered = self.process(frame, index);
                    self.publish(WorkerEventKind::Frame(rendered));
                    self.pace(started, &info);
                    continue;
                }
                Ok(None) if is_video => return EndReason::StreamEnded,
                Err(e) if is_video => {
                    log::warn!("⚠️ 视频读帧失败, 按播放结束处理: {}", e);
                    self.emit(Status::ReadFailed(e.to_string()));
                    return EndReason::StreamEnded;
                }
                Ok(None) => "camera returned no frame".to_string(),
                Err(e) => e.to_string(),
            };

            // 5. 摄像头读帧失败 → 按策略重连
            log::warn!("⚠️ 摄像头读帧失败: {}", failure);
            if !retry.allows(attempts) {
                log::error!("❌ 重连次数已用完 ({})", retry.max_attempts());
                return EndReason::ReconnectFailed;
            }
            attempts += 1;
            self.emit(Status::Reconnecting {
                attempt: attempts,
                max_attempts: retry.max_attempts(),
            });

            // 先关闭再重新打开
            slot = None;
            std::thread::sleep(retry.delay());
            if self.control.is_stop_requested() {
                return EndReason::Stopped;
            }
            match self.provider.open(&self.source) {
                Ok(capture) => {
                    log::info!("✅ 摄像头重连成功 ({}/{})", attempts, retry.max_attempts());
                    slot = Some(capture);
                }
                Err(e) => {
                    log::error!("❌ 摄像头重连失败: {}", e);
                    return EndReason::ReconnectFailed;
                }
            }
        }
    }

    /// 返回是否需要在暂停状态下显示跳转后的帧
    fn apply_seek(&self, capture: &mut dyn Capture, target: u64, info: &SourceInfo) -> bool {
        if !self.source.is_seekable() {
            self.emit(Status::SeekRejected);
            return false;
        }

        // 越界的目标钳制到 [0, frame_count-1]
        let frame = match info.frame_count {
            Some(count) if count > 0 => target.min(count - 1),
            _ => target,
        };
        match capture.seek(frame) {
            Ok(()) => {
                self.control.set_current_frame(capture.position());
                log::debug!("⏩ 跳转到第 {} 帧", frame);
                self.emit(Status::Seeked { frame });
                true
            }
            Err(e) => {
                log::warn!("⚠️ 跳转失败: {}", e);
                self.emit(Status::SeekRejected);
                false
            }
        }
    }

    /// 检测 + 标注 + 转为显示格式 (RGBA)
    ///
    /// 检测失败只影响当前帧: 发出 DetectionFailed, 帧照常发布 (无标注)。
    fn process(&self, frame: RgbImage, frame_index: Option<u64>) -> RenderedFrame {
        let t_detect = Instant::now();
        let detections = match self.detector.detect(&frame) {
            Ok(detections) => detections,
            Err(e) => {
                log::warn!("⚠️ 检测失败 ({}): {}", self.detector.name(), e);
                self.emit(Status::DetectionFailed(e.to_string()));
                Vec::new()
            }
        };
        let detect_ms = t_detect.elapsed().as_secs_f64() * 1000.0;

        let mut canvas = frame;
        self.annotator.annotate(&mut canvas, &detections);
        let image = DynamicImage::ImageRgb8(canvas).to_rgba8();

        log::debug!(
            "🔍 帧 {:?}: {} 个目标, 检测 {:.1}ms",
            frame_index,
            detections.len(),
            detect_ms
        );

        RenderedFrame {
            image,
            detections,
            frame_index,
        }
    }

    /// 摄像头固定间隔; 视频按 fps × 倍速
    fn pace(&self, started: Instant, info: &SourceInfo) {
        let interval = if self.source.is_camera() {
            self.settings.camera_frame_interval
        } else {
            match info.fps {
                Some(fps) if fps > 0.0 => {
                    let frame_time = 1.0 / (fps * self.control.speed() as f64);
                    Duration::from_secs_f64(frame_time).saturating_sub(started.elapsed())
                }
                _ => Duration::ZERO,
            }
        };
        if !interval.is_zero() {
            std::thread::sleep(interval);
        }
    }

    fn emit(&self, status: Status) {
        self.publish(WorkerEventKind::Status(status));
    }

    fn publish(&self, kind: WorkerEventKind) {
        // 控制器已退出时丢弃
        let _ = self.events.send(WorkerEvent {
            session: self.id,
            kind,
        });
    }
}

/// 完成信号守卫: 线程 panic 时补发 `Finished(Failed)`; 随后断开 done 通道
struct FinishGuard {
    id: SessionId,
    events: Sender<WorkerEvent>,
    finished: bool,
    _done: Sender<()>,
}

impl FinishGuard {
    fn finish(mut self, reason: EndReason) {
        self.send(reason);
    }

    fn send(&mut self, reason: EndReason) {
        self.finished = true;
        let _ = self.events.send(WorkerEvent {
            session: self.id,
            kind: WorkerEventKind::Finished(reason),
        });
    }
}

impl Drop for FinishGuard {
    fn drop(&mut self) {
        if !self.finished {
            log::error!("❌ 工作线程 {} 异常退出", self.id);
            self.send(EndReason::Failed("worker thread panicked".to_string()));
        }
    }
}

/// 控制器持有的工作线程句柄
pub struct WorkerHandle {
    id: SessionId,
    control: Arc<SessionControl>,
    done: Receiver<()>,
    thread: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn control(&self) -> &SessionControl {
        &self.control
    }

    pub fn stop(&self) {
        self.control.request_stop();
    }

    pub fn pause(&self) {
        self.control.set_paused(true);
    }

    pub fn resume(&self) {
        self.control.set_paused(false);
    }

    pub fn seek(&self, frame: u64) {
        self.control.request_seek(frame);
    }

    pub fn step(&self) {
        self.control.request_step();
    }

    pub fn set_speed(&self, speed: f32) -> f32 {
        self.control.set_speed(speed)
    }

    /// 采集句柄已释放且完成信号已发出
    pub fn is_finished(&self) -> bool {
        matches!(
            self.done.try_recv(),
            Err(crossbeam_channel::TryRecvError::Disconnected)
        )
    }

    /// 请求停止并在 `timeout` 内等待完成; 超时返回 false
    pub fn stop_and_wait(&mut self, timeout: Duration) -> bool {
        self.stop();
        match self.done.recv_timeout(timeout) {
            Err(RecvTimeoutError::Timeout) => false,
            _ => {
                self.join();
                true
            }
        }
    }

    /// 等待线程退出 (完成信号之后调用, 不会长时间阻塞)
    pub fn join(&mut self) {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::warn!("⚠️ 工作线程 {} panic 退出", self.id);
            }
        }
    }

    /// 强制终止: Rust 线程无法被杀死, 只能放弃等待;
    /// 该线程之后产生的事件由控制器按会话编号丢弃
    pub fn detach(mut self) {
        self.control.request_stop();
        if self.thread.take().is_some() {
            log::warn!("⚠️ 工作线程 {} 未在超时内退出, 已分离", self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeProvider, FakeScript, StubDetector};
    use std::path::PathBuf;

    fn fast_settings() -> WorkerSettings {
        WorkerSettings {
            pause_poll: Duration::from_millis(2),
            camera_frame_interval: Duration::ZERO,
            retry: RetryPolicy::new(1, Duration::from_millis(1)),
            speed: 1.0,
        }
    }

    fn start(
        source: MediaSource,
        provider: Arc<FakeProvider>,
        detector: SharedDetector,
    ) -> (WorkerHandle, Receiver<WorkerEvent>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        let handle = Worker::new(SessionId(1), source, provider, detector, tx)
            .with_settings(fast_settings())
            .spawn()
            .unwrap();
        (handle, rx)
    }

    /// 收集事件直到 Finished
    fn collect_until_finished(rx: &Receiver<WorkerEvent>) -> Vec<WorkerEventKind> {
        let mut events = Vec::new();
        loop {
            let event = rx
                .recv_timeout(Duration::from_secs(5))
                .expect("worker did not finish in time");
            assert_eq!(event.session, SessionId(1));
            let finished = matches!(event.kind, WorkerEventKind::Finished(_));
            events.push(event.kind);
            if finished {
                return events;
            }
        }
    }

    fn frames(events: &[WorkerEventKind]) -> Vec<&RenderedFrame> {
        events
            .iter()
            .filter_map(|e| match e {
                WorkerEventKind::Frame(frame) => Some(frame),
                _ => None,
            })
            .collect()
    }

    fn statuses(events: &[WorkerEventKind]) -> Vec<&Status> {
        events
            .iter()
            .filter_map(|e| match e {
                WorkerEventKind::Status(status) => Some(status),
                _ => None,
            })
            .collect()
    }

    fn end_reason(events: &[WorkerEventKind]) -> &EndReason {
        match events.last() {
            Some(WorkerEventKind::Finished(reason)) => reason,
            other => panic!("last event is not Finished: {:?}", other),
        }
    }

    fn video() -> MediaSource {
        MediaSource::Video(PathBuf::from("synthetic.mp4"))
    }

    #[test]
    fn test_ten_frame_video_publishes_every_frame() {
        let provider = FakeProvider::new(FakeScript::video(10));
        let (mut handle, rx) = start(video(), provider.clone(), StubDetector::empty());

        let events = collect_until_finished(&rx);
        let published = frames(&events);
        assert_eq!(published.len(), 10);
        assert!(published.iter().all(|f| f.detections.is_empty()));
        let indices: Vec<_> = published.iter().map(|f| f.frame_index).collect();
        assert_eq!(indices, (0..10).map(Some).collect::<Vec<_>>());

        assert_eq!(statuses(&events).last(), Some(&&Status::StreamEnded));
        assert_eq!(end_reason(&events), &EndReason::StreamEnded);
        assert_eq!(provider.active(), 0);
        handle.join();
    }

    #[test]
    fn test_empty_overlay_leaves_pixels_untouched() {
        let provider = FakeProvider::new(FakeScript::video(1));
        let (_handle, rx) = start(video(), provider, StubDetector::empty());
        let events = collect_until_finished(&rx);
        let frame = frames(&events)[0];
        assert_eq!((frame.width(), frame.height()), (16, 12));
        assert!(frame.image.pixels().all(|p| p.0 == [0, 0, 0, 255]));
    }

    #[test]
    fn test_open_failure_publishes_nothing() {
        let provider = FakeProvider::new(FakeScript::failing_open());
        let (_handle, rx) = start(video(), provider.clone(), StubDetector::empty());

        let events = collect_until_finished(&rx);
        assert!(frames(&events).is_empty());
        assert!(matches!(
            statuses(&events).as_slice(),
            [Status::SourceUnavailable(_)]
        ));
        assert_eq!(end_reason(&events), &EndReason::SourceUnavailable);
        assert_eq!(provider.active(), 0);
    }

    #[test]
    fn test_start_then_stop_releases_before_finished() {
        let sources = [
            MediaSource::Camera(0),
            video(),
            MediaSource::Image(PathBuf::from("still.png")),
        ];
        for source in sources {
            let provider =
                FakeProvider::new(FakeScript::endless().with_read_delay(Duration::from_millis(1)));
            let (mut handle, rx) = start(source.clone(), provider.clone(), StubDetector::empty());
            handle.stop();

            let events = collect_until_finished(&rx);
            // Finished 到达时句柄必须已释放
            assert_eq!(provider.active(), 0, "{:?}", source);
            assert_eq!(provider.opens(), 1, "{:?}", source);
            assert_eq!(provider.releases(), provider.opens(), "{:?}", source);
            let reason = end_reason(&events);
            if source.is_image() {
                // 单帧图片可能在停止信号前就已处理完
                assert!(
                    matches!(reason, EndReason::Stopped | EndReason::Completed),
                    "{:?}",
                    reason
                );
            } else {
                assert_eq!(reason, &EndReason::Stopped, "{:?}", source);
            }
            handle.join();
        }
    }

    #[test]
    fn test_camera_reconnects_once_and_resumes() {
        let provider = FakeProvider::new(FakeScript::endless().fail_read(3));
        let (mut handle, rx) = start(MediaSource::Camera(0), provider.clone(), StubDetector::empty());

        // 等待重连之后的两帧
        let mut published = 0;
        let mut before_stop = Vec::new();
        while published < 4 {
            let event = rx.recv_timeout(Duration::from_secs(5)).unwrap();
            if matches!(event.kind, WorkerEventKind::Frame(_)) {
                published += 1;
            }
            before_stop.push(event.kind);
        }
        assert!(handle.stop_and_wait(Duration::from_secs(5)));
        let mut events = before_stop;
        events.extend(collect_until_finished(&rx));

        let reconnects = statuses(&events)
            .into_iter()
            .filter(|s| matches!(s, Status::Reconnecting { .. }))
            .count();
        assert_eq!(reconnects, 1);
        assert_eq!(provider.opens(), 2);
        assert_eq!(provider.max_active(), 1);
        assert_eq!(end_reason(&events), &EndReason::Stopped);
        // 前两次读成功, 第3次失败, 第4次起恢复
        assert!(provider.read_calls() >= 5);
    }

    #[test]
    fn test_camera_reconnect_failure_ends_session() {
        let provider = FakeProvider::new(FakeScript::endless().fail_read(2).with_failing_reopen());
        let (_handle, rx) = start(MediaSource::Camera(0), provider.clone(), StubDetector::empty());

        let events = collect_until_finished(&rx);
        assert_eq!(frames(&events).len(), 1);
        assert!(statuses(&events).contains(&&Status::ReconnectFailed));
        assert_eq!(end_reason(&events), &EndReason::ReconnectFailed);
        assert_eq!(provider.active(), 0);
    }

    #[test]
    fn test_camera_second_failure_exhausts_policy() {
        let provider = FakeProvider::new(FakeScript::endless().fail_read(2).fail_read(3));
        let (_handle, rx) = start(MediaSource::Camera(0), provider.clone(), StubDetector::empty());

        let events = collect_until_finished(&rx);
        let reconnects = statuses(&events)
            .into_iter()
            .filter(|s| matches!(s, Status::Reconnecting { .. }))
            .count();
        assert_eq!(reconnects, 1);
        assert_eq!(end_reason(&events), &EndReason::ReconnectFailed);
        assert_eq!(provider.active(), 0);
    }

    #[test]
    fn test_pause_does_not_advance_cursor() {
        let provider =
            FakeProvider::new(FakeScript::video(10_000).with_read_delay(Duration::from_millis(1)));
        let (mut handle, rx) = start(video(), provider, StubDetector::empty());

        // 先读几帧
        let mut seen = 0;
        while seen < 3 {
            if let WorkerEventKind::Frame(_) = rx.recv_timeout(Duration::from_secs(5)).unwrap().kind {
                seen += 1;
            }
        }

        handle.pause();
        loop {
            let event = rx.recv_timeout(Duration::from_secs(5)).unwrap();
            if matches!(event.kind, WorkerEventKind::Status(Status::Paused)) {
                break;
            }
        }
        let before = handle.control().current_frame();
        std::thread::sleep(Duration::from_millis(30)); // 多个暂停轮询周期
        assert_eq!(handle.control().current_frame(), before);
        assert!(rx.try_iter().all(|e| !matches!(e.kind, WorkerEventKind::Frame(_))));

        handle.resume();
        loop {
            let event = rx.recv_timeout(Duration::from_secs(5)).unwrap();
            if let WorkerEventKind::Frame(frame) = event.kind {
                assert_eq!(frame.frame_index, Some(before));
                break;
            }
        }
        assert!(handle.stop_and_wait(Duration::from_secs(5)));
    }

    #[test]
    fn test_seek_out_of_range_is_clamped() {
        let provider = FakeProvider::new(FakeScript::video(10));
        let (tx, rx) = crossbeam_channel::unbounded();
        let worker = Worker::new(SessionId(1), video(), provider, StubDetector::empty(), tx)
            .with_settings(fast_settings());
        worker.control.set_paused(true);
        worker.control.request_seek(50);
        let mut handle = worker.spawn().unwrap();

        let mut seeked = None;
        let mut frame_index = None;
        while seeked.is_none() || frame_index.is_none() {
            match rx.recv_timeout(Duration::from_secs(5)).unwrap().kind {
                WorkerEventKind::Status(Status::Seeked { frame }) => seeked = Some(frame),
                WorkerEventKind::Frame(frame) => frame_index = frame.frame_index,
                _ => {}
            }
        }
        assert_eq!(seeked, Some(9));
        assert_eq!(frame_index, Some(9));
        assert_eq!(handle.control().current_frame(), 10);
        assert!(handle.stop_and_wait(Duration::from_secs(5)));
    }

    #[test]
    fn test_step_reads_exactly_one_frame() {
        let provider = FakeProvider::new(FakeScript::video(10));
        let (tx, rx) = crossbeam_channel::unbounded();
        let worker = Worker::new(SessionId(1), video(), provider, StubDetector::empty(), tx)
            .with_settings(fast_settings());
        worker.control.set_paused(true);
        let mut handle = worker.spawn().unwrap();

        handle.step();
        let frame = loop {
            if let WorkerEventKind::Frame(frame) = rx.recv_timeout(Duration::from_secs(5)).unwrap().kind {
                break frame;
            }
        };
        assert_eq!(frame.frame_index, Some(0));
        std::thread::sleep(Duration::from_millis(20));
        assert!(rx.try_iter().all(|e| !matches!(e.kind, WorkerEventKind::Frame(_))));
        assert_eq!(handle.control().current_frame(), 1);
        assert!(handle.stop_and_wait(Duration::from_secs(5)));
    }

    #[test]
    fn test_seek_rejected_on_camera() {
        let provider =
            FakeProvider::new(FakeScript::endless().with_read_delay(Duration::from_millis(1)));
        let (mut handle, rx) = start(MediaSource::Camera(0), provider, StubDetector::empty());
        handle.seek(5);
        loop {
            let event = rx.recv_timeout(Duration::from_secs(5)).unwrap();
            if matches!(event.kind, WorkerEventKind::Status(Status::SeekRejected)) {
                break;
            }
        }
        assert!(handle.stop_and_wait(Duration::from_secs(5)));
    }

    #[test]
    fn test_detection_failure_keeps_running() {
        let provider = FakeProvider::new(FakeScript::video(3));
        let (_handle, rx) = start(video(), provider, StubDetector::failing());

        let events = collect_until_finished(&rx);
        assert_eq!(frames(&events).len(), 3);
        let failures = statuses(&events)
            .into_iter()
            .filter(|s| matches!(s, Status::DetectionFailed(_)))
            .count();
        assert_eq!(failures, 3);
        assert_eq!(end_reason(&events), &EndReason::StreamEnded);
    }

    #[test]
    fn test_image_single_cycle() {
        let provider = FakeProvider::new(FakeScript::video(1));
        let (_handle, rx) = start(
            MediaSource::Image(PathBuf::from("still.png")),
            provider.clone(),
            StubDetector::one_person(),
        );

        let events = collect_until_finished(&rx);
        let published = frames(&events);
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].frame_index, None);
        assert_eq!(published[0].detections.len(), 1);
        assert!(statuses(&events).contains(&&Status::ImageProcessed { objects: 1 }));
        assert_eq!(end_reason(&events), &EndReason::Completed);
        assert_eq!(provider.read_calls(), 1);
        assert_eq!(provider.active(), 0);
    }

    #[test]
    fn test_panic_releases_capture_and_reports_failure() {
        let provider = FakeProvider::new(FakeScript::video(5));
        let (mut handle, rx) = start(video(), provider.clone(), StubDetector::panicking());

        let events = collect_until_finished(&rx);
        assert!(matches!(end_reason(&events), EndReason::Failed(_)));
        assert_eq!(provider.active(), 0);
        handle.join();
        assert!(handle.is_finished());
    }
}
