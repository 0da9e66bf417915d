// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 测试用采集源与检测器

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use image::{Rgb, RgbImage};

use crate::detection::{BBox, Detection, Detector, SharedDetector};
use crate::error::{MediaError, MediaResult};
use crate::input::{Capture, CaptureProvider, MediaSource, SourceInfo};

/// 采集源剧本
#[derive(Debug, Clone)]
pub(crate) struct FakeScript {
    pub frames: Option<u64>, // None: 无限帧
    pub fail_reads: HashSet<u64>, // 第 n 次 read 调用失败 (从 1 开始, 跨重连累计)
    pub fail_open: bool,
    pub fail_reopen: bool,
    pub read_delay: Duration,
    pub fps: Option<f64>,
}

impl FakeScript {
    pub fn video(frames: u64) -> Self {
        Self {
            frames: Some(frames),
            fail_reads: HashSet::new(),
            fail_open: false,
            fail_reopen: false,
            read_delay: Duration::ZERO,
            fps: None,
        }
    }

    pub fn endless() -> Self {
        Self {
            frames: None,
            ..Self::video(0)
        }
    }

    pub fn failing_open() -> Self {
        Self {
            fail_open: true,
            ..Self::video(0)
        }
    }

    pub fn fail_read(mut self, call: u64) -> Self {
        self.fail_reads.insert(call);
        self
    }

    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = delay;
        self
    }

    pub fn with_failing_reopen(mut self) -> Self {
        self.fail_reopen = true;
        self
    }
}

#[derive(Debug, Default)]
struct Counters {
    opens: AtomicUsize,
    active: AtomicUsize,
    max_active: AtomicUsize,
    releases: AtomicUsize,
    read_calls: AtomicU64,
}

/// 记录打开/释放次数的假采集提供者
pub(crate) struct FakeProvider {
    script: FakeScript,
    counters: Arc<Counters>,
}

impl FakeProvider {
    pub fn new(script: FakeScript) -> Arc<Self> {
        Arc::new(Self {
            script,
            counters: Arc::default(),
        })
    }

    pub fn opens(&self) -> usize {
        self.counters.opens.load(Ordering::SeqCst)
    }

    /// 当前未释放的采集句柄数
    pub fn active(&self) -> usize {
        self.counters.active.load(Ordering::SeqCst)
    }

    pub fn max_active(&self) -> usize {
        self.counters.max_active.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.counters.releases.load(Ordering::SeqCst)
    }

    pub fn read_calls(&self) -> u64 {
        self.counters.read_calls.load(Ordering::SeqCst)
    }
}

impl CaptureProvider for FakeProvider {
    fn open(&self, source: &MediaSource) -> MediaResult<Box<dyn Capture>> {
        let n = self.counters.opens.fetch_add(1, Ordering::SeqCst) + 1;
        if self.script.fail_open || (n > 1 && self.script.fail_reopen) {
            return Err(MediaError::unavailable(source.display_name(), "scripted open failure"));
        }

        let active = self.counters.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.max_active.fetch_max(active, Ordering::SeqCst);

        Ok(Box::new(FakeCapture {
            script: self.script.clone(),
            counters: self.counters.clone(),
            seekable: source.is_seekable(),
            position: 0,
        }))
    }
}

struct FakeCapture {
    script: FakeScript,
    counters: Arc<Counters>,
    seekable: bool,
    position: u64,
}

impl Capture for FakeCapture {
    fn info(&self) -> SourceInfo {
        SourceInfo {
            width: 16,
            height: 12,
            frame_count: self.script.frames,
            fps: self.script.fps,
        }
    }

    fn read(&mut self) -> MediaResult<Option<RgbImage>> {
        if !self.script.read_delay.is_zero() {
            std::thread::sleep(self.script.read_delay);
        }
        let call = self.counters.read_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.script.fail_reads.contains(&call) {
            return Err(MediaError::FrameRead(format!("scripted failure on read {}", call)));
        }
        if let Some(total) = self.script.frames {
            if self.position >= total {
                return Ok(None);
            }
        }
        let shade = (self.position % 256) as u8;
        self.position += 1;
        Ok(Some(RgbImage::from_pixel(16, 12, Rgb([shade, 0, 0]))))
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn seek(&mut self, frame: u64) -> MediaResult<()> {
        if !self.seekable {
            return Err(MediaError::NotSeekable);
        }
        self.position = frame;
        Ok(())
    }
}

impl Drop for FakeCapture {
    fn drop(&mut self) {
        self.counters.active.fetch_sub(1, Ordering::SeqCst);
        self.counters.releases.fetch_add(1, Ordering::SeqCst);
    }
}

enum StubMode {
    Returning(Vec<Detection>),
    Failing,
    Panicking,
}

/// 固定结果的检测器
pub(crate) struct StubDetector {
    mode: StubMode,
}

impl StubDetector {
    pub fn empty() -> SharedDetector {
        Self::returning(Vec::new())
    }

    pub fn returning(detections: Vec<Detection>) -> SharedDetector {
        Arc::new(Self {
            mode: StubMode::Returning(detections),
        })
    }

    pub fn one_person() -> SharedDetector {
        Self::returning(vec![Detection::new(
            0,
            "person",
            0.9,
            BBox::new(2.0, 2.0, 10.0, 9.0),
        )])
    }

    pub fn failing() -> SharedDetector {
        Arc::new(Self {
            mode: StubMode::Failing,
        })
    }

    pub fn panicking() -> SharedDetector {
        Arc::new(Self {
            mode: StubMode::Panicking,
        })
    }
}

impl Detector for StubDetector {
    fn detect(&self, _image: &RgbImage) -> Result<Vec<Detection>> {
        match &self.mode {
            StubMode::Returning(detections) => Ok(detections.clone()),
            StubMode::Failing => anyhow::bail!("stub inference error"),
            StubMode::Panicking => panic!("stub detector panicked"),
        }
    }

    fn name(&self) -> &str {
        "stub"
    }
}
