// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 摄像头重连策略: 固定次数, 固定间隔, 无指数退避

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(1, Duration::from_millis(500))
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// 关闭与重新打开之间的等待
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// 已重试 `attempts` 次后是否还能再试
    pub fn allows(&self, attempts: u32) -> bool {
        attempts < self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_single_attempt() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts(), 1);
        assert!(policy.allows(0));
        assert!(!policy.allows(1));
    }
}
