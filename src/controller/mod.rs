// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 展示控制器 (Presentation Controller)
//!
//! 在 UI 线程上运行, 拥有唯一的 `Session`; 不直接接触采集句柄或检测器。
//! 状态机: Idle → Starting → Running ⇄ Paused → Stopping → Idle
//! 所有转移由工作线程事件驱动, 每个 UI 帧调用一次 `pump()` 取出排队的事件。

use std::path::PathBuf;
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, TryRecvError};

use crate::config::ViewerConfig;
use crate::detection::{Annotator, SharedDetector};
use crate::error::{MediaError, MediaResult};
use crate::input::{CaptureProvider, MediaSource, SourceInfo};
use crate::models::ModelEvent;
use crate::pipeline::control::clamp_speed;
use crate::pipeline::{
    EndReason, RenderedFrame, SessionId, Status, Worker, WorkerEvent, WorkerEventKind,
    WorkerHandle, WorkerSettings,
};

/// 显示区域内边距 (像素)
const DISPLAY_PADDING: f32 = 10.0;

#[derive(Debug, Clone, PartialEq)]
pub enum ModelState {
    Loading,
    Ready,
    /// 进程生命周期内不可恢复
    Failed(String),
}

/// 控制器视角的会话状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Starting,
    Running,
    Paused,
    Stopping,
}

impl SessionState {
    pub fn is_active(&self) -> bool {
        !matches!(self, SessionState::Idle)
    }
}

/// 当前会话 (最多一个)
pub struct Session {
    pub id: SessionId,
    pub source: MediaSource,
    pub info: Option<SourceInfo>,
    pub state: SessionState,
    pub speed: f32,
    handle: WorkerHandle,
}

impl Session {
    /// 视频读游标 (下一帧索引)
    pub fn current_frame(&self) -> u64 {
        self.handle.control().current_frame()
    }

    pub fn is_paused(&self) -> bool {
        self.handle.control().is_paused()
    }
}

/// 界面控件可用状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Controls {
    pub open_image: bool,
    pub open_video: bool,
    pub start_camera: bool,
    pub pause: bool,
    pub stop: bool,
    pub seek: bool,
    pub step: bool,
    pub speed: bool,
    pub pause_label: &'static str,
}

pub struct Controller {
    provider: Arc<dyn CaptureProvider>,
    config: ViewerConfig,
    annotator: Arc<Annotator>,

    detector: Option<SharedDetector>,
    model_state: ModelState,
    model_rx: Option<Receiver<ModelEvent>>,

    events_tx: Sender<WorkerEvent>,
    events_rx: Receiver<WorkerEvent>,
    last_id: SessionId,
    session: Option<Session>,
    // 超时未退出的旧工作线程, 释放采集句柄前不允许开启新会话
    releasing: Vec<WorkerHandle>,

    frame: Option<RenderedFrame>,
    frame_serial: u64,
    last_source: Option<(MediaSource, Option<SourceInfo>)>,
    status: Status,
    alert: Option<String>,
    display_area: (f32, f32),
    speed: f32,
}

impl Controller {
    /// 模型在后台加载, 加载完成前禁止打开输入源
    pub fn new(
        provider: Arc<dyn CaptureProvider>,
        config: ViewerConfig,
        annotator: Arc<Annotator>,
        model_rx: Receiver<ModelEvent>,
    ) -> Self {
        let mut controller = Self::build(provider, config, annotator);
        controller.model_rx = Some(model_rx);
        controller
    }

    /// 使用已加载的检测器
    pub fn with_detector(
        provider: Arc<dyn CaptureProvider>,
        config: ViewerConfig,
        annotator: Arc<Annotator>,
        detector: SharedDetector,
    ) -> Self {
        let mut controller = Self::build(provider, config, annotator);
        controller.detector = Some(detector);
        controller.model_state = ModelState::Ready;
        controller.status = Status::ModelReady;
        controller
    }

    fn build(
        provider: Arc<dyn CaptureProvider>,
        config: ViewerConfig,
        annotator: Arc<Annotator>,
    ) -> Self {
        let (events_tx, events_rx) = crossbeam_channel::unbounded();
        let speed = clamp_speed(config.playback_speed);
        Self {
            provider,
            config,
            annotator,
            detector: None,
            model_state: ModelState::Loading,
            model_rx: None,
            events_tx,
            events_rx,
            last_id: SessionId::default(),
            session: None,
            releasing: Vec::new(),
            frame: None,
            frame_serial: 0,
            last_source: None,
            status: Status::ModelLoading,
            alert: None,
            display_area: (0.0, 0.0),
            speed,
        }
    }

    // ========== 用户命令 ==========

    pub fn select_image(&mut self, path: impl Into<PathBuf>) -> MediaResult<SessionId> {
        self.open_source(MediaSource::Image(path.into()))
    }

    pub fn select_video(&mut self, path: impl Into<PathBuf>) -> MediaResult<SessionId> {
        self.open_source(MediaSource::Video(path.into()))
    }

    pub fn start_camera(&mut self, index: u32) -> MediaResult<SessionId> {
        self.open_source(MediaSource::Camera(index))
    }

    /// 先完全停止旧会话 (释放采集句柄), 再启动新会话
    pub fn open_source(&mut self, source: MediaSource) -> MediaResult<SessionId> {
        let detector = match (&self.model_state, &self.detector) {
            (ModelState::Ready, Some(detector)) => detector.clone(),
            _ => return Err(MediaError::ModelNotReady),
        };

        self.teardown();
        self.reap_released();
        if !self.releasing.is_empty() {
            let reason = "previous session is still releasing its capture";
            log::warn!("⚠️ {} 暂不可打开: 旧会话尚未释放采集句柄", source.display_name());
            self.status = Status::SourceUnavailable(reason.to_string());
            return Err(MediaError::unavailable(source.display_name(), reason));
        }

        let id = self.last_id.next();
        self.last_id = id;
        let settings = WorkerSettings {
            speed: self.speed,
            ..WorkerSettings::from_config(&self.config)
        };
        let handle = Worker::new(
            id,
            source.clone(),
            self.provider.clone(),
            detector,
            self.events_tx.clone(),
        )
        .with_annotator(self.annotator.clone())
        .with_settings(settings)
        .spawn()?;

        log::info!("🚀 会话 {} 启动: {}", id, source.display_name());
        self.frame = None;
        self.last_source = None;
        self.session = Some(Session {
            id,
            source,
            info: None,
            state: SessionState::Starting,
            speed: self.speed,
            handle,
        });
        Ok(id)
    }

    /// 有界等待旧工作线程退出; 超时则转入 `releasing`,
    /// 其事件按会话编号丢弃, 直到它释放采集句柄
    fn teardown(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        let mut handle = session.handle;
        let timeout = self.config.stop_timeout();
        if handle.stop_and_wait(timeout) {
            log::info!("⏹️ 会话 {} 已停止", session.id);
        } else {
            log::warn!(
                "⚠️ 会话 {} 未在 {}ms 内停止, 等待其释放采集句柄",
                session.id,
                timeout.as_millis()
            );
            self.releasing.push(handle);
        }
    }

    /// 回收已释放采集句柄的旧工作线程
    fn reap_released(&mut self) {
        self.releasing.retain_mut(|handle| {
            if handle.is_finished() {
                handle.join();
                log::info!("♻️ 会话 {} 已释放采集句柄", handle.id());
                false
            } else {
                true
            }
        });
    }

    /// 暂停/继续, 返回请求后的暂停状态
    pub fn toggle_pause(&mut self) -> bool {
        let Some(session) = &mut self.session else {
            return false;
        };
        if !matches!(
            session.state,
            SessionState::Starting | SessionState::Running | SessionState::Paused
        ) {
            return session.is_paused();
        }
        let paused = !session.is_paused();
        if paused {
            session.handle.pause();
        } else {
            session.handle.resume();
        }
        paused
    }

    pub fn stop_current(&mut self) {
        match &mut self.session {
            Some(session) if session.state != SessionState::Stopping => {
                log::info!("⏹️ 请求停止会话 {}", session.id);
                session.state = SessionState::Stopping;
                session.handle.stop();
                self.status = Status::Stopping;
            }
            Some(_) => {}
            None => {
                self.status = Status::NoActiveSession;
                self.frame = None;
                self.last_source = None;
            }
        }
    }

    /// 跳转 (仅视频)
    pub fn seek(&mut self, frame: u64) -> MediaResult<()> {
        let Some(session) = &self.session else {
            return Ok(());
        };
        if !session.source.is_seekable() {
            self.status = Status::SeekRejected;
            return Err(MediaError::NotSeekable);
        }
        session.handle.seek(frame);
        Ok(())
    }

    /// 暂停时前进一帧
    pub fn step_forward(&mut self) {
        if let Some(session) = self.paused_video() {
            session.handle.step();
        }
    }

    /// 暂停时后退一帧: 游标指向下一帧, 上一帧为 current-2
    pub fn step_backward(&mut self) {
        if let Some(session) = self.paused_video() {
            let target = session.current_frame().saturating_sub(2);
            session.handle.seek(target);
        }
    }

    fn paused_video(&self) -> Option<&Session> {
        self.session
            .as_ref()
            .filter(|s| s.source.is_video() && s.is_paused())
    }

    /// 设置播放倍速, 返回钳制后的值
    pub fn set_speed(&mut self, speed: f32) -> f32 {
        let speed = clamp_speed(speed);
        self.speed = speed;
        if let Some(session) = &mut self.session {
            session.speed = session.handle.set_speed(speed);
        }
        self.status = Status::SpeedChanged(speed);
        speed
    }

    // ========== 事件处理 ==========

    /// 取出所有排队事件并应用 (不阻塞), 返回处理的事件数
    pub fn pump(&mut self) -> usize {
        self.reap_released();
        let mut handled = self.pump_model();

        loop {
            let event = match self.events_rx.try_recv() {
                Ok(event) => event,
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            };
            let current = self.session.as_ref().map(|s| s.id);
            if current != Some(event.session) {
                log::trace!("丢弃过期会话 {} 的事件", event.session);
                continue;
            }
            handled += 1;
            self.apply(event.kind);
        }
        handled
    }

    fn pump_model(&mut self) -> usize {
        let Some(rx) = &self.model_rx else {
            return 0;
        };
        let event = match rx.try_recv() {
            Ok(event) => event,
            Err(TryRecvError::Empty) => return 0,
            Err(TryRecvError::Disconnected) => {
                ModelEvent::Failed(MediaError::ModelLoad(
                    "model loader exited unexpectedly".to_string(),
                ))
            }
        };
        self.model_rx = None;

        match event {
            ModelEvent::Loaded(detector) => {
                self.detector = Some(detector);
                self.model_state = ModelState::Ready;
                self.status = Status::ModelReady;
            }
            ModelEvent::Failed(e) => {
                let reason = match e {
                    MediaError::ModelLoad(reason) => reason,
                    other => other.to_string(),
                };
                self.model_state = ModelState::Failed(reason.clone());
                self.alert = Some(format!("Failed to load the detection model:\n{}", reason));
                self.status = Status::ModelLoadFailed(reason);
            }
        }
        1
    }

    fn apply(&mut self, kind: WorkerEventKind) {
        let Some(session) = &mut self.session else {
            return;
        };

        match kind {
            WorkerEventKind::Opened(info) => {
                session.info = Some(info);
            }
            WorkerEventKind::Frame(frame) => {
                if session.state == SessionState::Starting {
                    session.state = SessionState::Running;
                }
                self.frame = Some(frame);
                self.frame_serial += 1;
            }
            WorkerEventKind::Status(status) => {
                match (&status, session.state) {
                    (Status::Paused, SessionState::Running | SessionState::Starting) => {
                        session.state = SessionState::Paused;
                    }
                    (Status::Resumed, SessionState::Paused) => {
                        session.state = SessionState::Running;
                    }
                    _ => {}
                }
                // 停止过程中保持 "Stopping..." 直到完成
                if session.state != SessionState::Stopping || status == Status::Stopped {
                    self.status = status;
                }
            }
            WorkerEventKind::Finished(reason) => self.finish(reason),
        }
    }

    fn finish(&mut self, reason: EndReason) {
        let Some(mut session) = self.session.take() else {
            return;
        };
        session.handle.join();
        log::info!("🏁 会话 {} 结束: {:?}", session.id, reason);

        match &reason {
            EndReason::Stopped => {
                self.frame = None;
                self.last_source = None;
            }
            EndReason::Failed(e) => {
                self.alert = Some(format!("Processing stopped unexpectedly:\n{}", e));
                self.last_source = Some((session.source, session.info));
            }
            _ => {
                // 播放结束保留最后一帧
                self.last_source = Some((session.source, session.info));
            }
        }
    }

    /// 关闭程序前停止当前会话; 仍未退出的线程最后再等一次, 然后分离
    pub fn shutdown(&mut self) {
        self.teardown();
        let timeout = self.config.stop_timeout();
        for mut handle in self.releasing.drain(..) {
            if !handle.stop_and_wait(timeout) {
                handle.detach();
            }
        }
    }

    // ========== 查询 ==========

    pub fn state(&self) -> SessionState {
        self.session
            .as_ref()
            .map(|s| s.state)
            .unwrap_or(SessionState::Idle)
    }

    /// 是否有超时未退出的旧工作线程
    pub fn is_releasing(&self) -> bool {
        !self.releasing.is_empty()
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn model_state(&self) -> &ModelState {
        &self.model_state
    }

    pub fn status(&self) -> &Status {
        &self.status
    }

    pub fn frame(&self) -> Option<&RenderedFrame> {
        self.frame.as_ref()
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    /// 每收到一帧加一, 渲染端据此判断是否需要更新纹理
    pub fn frame_serial(&self) -> u64 {
        self.frame_serial
    }

    /// 模态提示 (模型加载失败等), 取出后清空
    pub fn take_alert(&mut self) -> Option<String> {
        self.alert.take()
    }

    pub fn controls(&self) -> Controls {
        let can_capture = self.model_state == ModelState::Ready && self.releasing.is_empty();
        let state = self.state();
        let active = matches!(
            state,
            SessionState::Starting | SessionState::Running | SessionState::Paused
        );
        let video = self
            .session
            .as_ref()
            .map(|s| s.source.is_video())
            .unwrap_or(false);
        let paused = self.session.as_ref().map(|s| s.is_paused()).unwrap_or(false);

        Controls {
            open_image: can_capture,
            open_video: can_capture,
            start_camera: can_capture,
            pause: active,
            stop: state.is_active(),
            seek: active && video,
            step: active && video && paused,
            speed: active && video,
            pause_label: if paused { "Resume" } else { "Pause" },
        }
    }

    pub fn set_display_area(&mut self, width: f32, height: f32) {
        self.display_area = (width.max(0.0), height.max(0.0));
    }

    /// 当前帧在显示区域内的尺寸 (保持宽高比)
    pub fn display_size(&self) -> Option<(f32, f32)> {
        let frame = self.frame.as_ref()?;
        Some(fit_within(
            (frame.width() as f32, frame.height() as f32),
            self.display_area,
        ))
    }

    /// 信息栏: 源名称 | 分辨率 | 视频时间
    pub fn info_text(&self) -> String {
        let (source, info, current) = match (&self.session, &self.last_source) {
            (Some(session), _) => (&session.source, session.info, Some(session.current_frame())),
            (None, Some((source, info))) => (source, *info, info.and_then(|i| i.frame_count)),
            (None, None) => return "No source".to_string(),
        };

        let mut text = source.display_name();
        if let Some(frame) = &self.frame {
            text.push_str(&format!(" | {}x{}", frame.width(), frame.height()));
        } else if let Some(info) = info.filter(|i| i.width > 0) {
            text.push_str(&format!(" | {}x{}", info.width, info.height));
        }

        if source.is_video() {
            if let Some(info) = info {
                if let (Some(total), Some(fps)) = (info.duration_secs(), info.fps) {
                    let elapsed = current.unwrap_or(0) as f64 / fps;
                    text.push_str(&format!(
                        " | {} / {}",
                        format_clock(elapsed.min(total)),
                        format_clock(total)
                    ));
                }
            }
        }
        text
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// 按宽高比缩放到区域内 (含内边距)
pub fn fit_within((width, height): (f32, f32), (area_w, area_h): (f32, f32)) -> (f32, f32) {
    let avail_w = (area_w - 2.0 * DISPLAY_PADDING).max(0.0);
    let avail_h = (area_h - 2.0 * DISPLAY_PADDING).max(0.0);
    if width <= 0.0 || height <= 0.0 || avail_w <= 0.0 || avail_h <= 0.0 {
        return (0.0, 0.0);
    }
    let scale = (avail_w / width).min(avail_h / height);
    (width * scale, height * scale)
}

/// 秒 → mm:ss
pub fn format_clock(secs: f64) -> String {
    let total = secs.max(0.0) as u64;
    format!("{:02}:{:02}", total / 60, total % 60)
}
