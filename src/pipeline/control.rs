// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 会话控制信号
//!
//! 控制器写, 工作线程在每轮循环开头读。工作线程只回写 `current_frame`。

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

const NO_SEEK: u64 = u64::MAX;

pub const MIN_SPEED: f32 = 0.25;
pub const MAX_SPEED: f32 = 4.0;

#[derive(Debug)]
pub struct SessionControl {
    stop: AtomicBool,
    paused: AtomicBool,
    step: AtomicBool,
    seek: AtomicU64,
    speed: AtomicU32, // f32 bits
    current_frame: AtomicU64,
}

impl Default for SessionControl {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl SessionControl {
    pub fn new(speed: f32) -> Self {
        Self {
            stop: AtomicBool::new(false),
            paused: AtomicBool::new(false),
            step: AtomicBool::new(false),
            seek: AtomicU64::new(NO_SEEK),
            speed: AtomicU32::new(clamp_speed(speed).to_bits()),
            current_frame: AtomicU64::new(0),
        }
    }

    // === 停止 ===

    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    // === 暂停 ===

    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::Release);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    /// 暂停时读取并发布一帧
    pub fn request_step(&self) {
        self.step.store(true, Ordering::Release);
    }

    pub fn take_step(&self) -> bool {
        self.step.swap(false, Ordering::AcqRel)
    }

    // === 跳转 ===

    /// 后一次请求覆盖前一次
    pub fn request_seek(&self, frame: u64) {
        self.seek.store(frame.min(NO_SEEK - 1), Ordering::Release);
    }

    pub fn take_seek(&self) -> Option<u64> {
        match self.seek.swap(NO_SEEK, Ordering::AcqRel) {
            NO_SEEK => None,
            frame => Some(frame),
        }
    }

    // === 倍速 ===

    /// 返回钳制后的实际倍速
    pub fn set_speed(&self, speed: f32) -> f32 {
        let speed = clamp_speed(speed);
        self.speed.store(speed.to_bits(), Ordering::Release);
        speed
    }

    pub fn speed(&self) -> f32 {
        f32::from_bits(self.speed.load(Ordering::Acquire))
    }

    // === 读游标 ===

    /// 下一帧的索引
    pub fn current_frame(&self) -> u64 {
        self.current_frame.load(Ordering::Acquire)
    }

    pub(crate) fn set_current_frame(&self, frame: u64) {
        self.current_frame.store(frame, Ordering::Release);
    }
}

pub fn clamp_speed(speed: f32) -> f32 {
    if speed.is_nan() {
        1.0
    } else {
        speed.clamp(MIN_SPEED, MAX_SPEED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seek_is_taken_once() {
        let control = SessionControl::default();
        assert_eq!(control.take_seek(), None);
        control.request_seek(10);
        control.request_seek(42);
        assert_eq!(control.take_seek(), Some(42));
        assert_eq!(control.take_seek(), None);
    }

    #[test]
    fn test_step_is_taken_once() {
        let control = SessionControl::default();
        control.request_step();
        assert!(control.take_step());
        assert!(!control.take_step());
    }

    #[test]
    fn test_speed_clamped() {
        let control = SessionControl::new(10.0);
        assert_eq!(control.speed(), MAX_SPEED);
        assert_eq!(control.set_speed(0.1), MIN_SPEED);
        assert_eq!(control.set_speed(f32::NAN), 1.0);
        assert_eq!(control.set_speed(2.0), 2.0);
    }

    #[test]
    fn test_stop_and_pause_flags() {
        let control = SessionControl::default();
        assert!(!control.is_stop_requested());
        control.set_paused(true);
        assert!(control.is_paused());
        control.request_stop();
        assert!(control.is_stop_requested());
    }
}
