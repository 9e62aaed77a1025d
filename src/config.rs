use std::time::Duration;

use crate::error::{RelaxError, Result};
use crate::grid::{BoundaryTemps, DEFAULT_SIZE, MIN_SIZE};

pub const ERROR_THRESHOLD: f64 = 5.0; // 収束判定値（絶対誤差の総和）
pub const POLL_INTERVAL: Duration = Duration::from_millis(5); // 監視ループの最大待ち時間

/// 1回の実行パラメータ
#[derive(Clone, Debug, PartialEq)]
pub struct RunConfig {
    pub size: usize,
    pub threshold: f64,
    pub poll_interval: Duration,
    pub boundary: BoundaryTemps,
    /// 監視の打ち切り時間（None なら無制限）
    pub max_duration: Option<Duration>,
    /// シングルスレッド版の反復上限（None なら無制限）
    pub max_iterations: Option<u64>,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            size: DEFAULT_SIZE,
            threshold: ERROR_THRESHOLD,
            poll_interval: POLL_INTERVAL,
            boundary: BoundaryTemps::default(),
            max_duration: None,
            max_iterations: None,
        }
    }
}

impl RunConfig {
    pub fn with_size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_boundary(mut self, boundary: BoundaryTemps) -> Self {
        self.boundary = boundary;
        self
    }

    pub fn with_max_duration(mut self, limit: Duration) -> Self {
        self.max_duration = Some(limit);
        self
    }

    pub fn with_max_iterations(mut self, limit: u64) -> Self {
        self.max_iterations = Some(limit);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.size < MIN_SIZE {
            return Err(RelaxError::InvalidGridSize { size: self.size });
        }
        if !self.threshold.is_finite() || self.threshold <= 0.0 {
            return Err(RelaxError::InvalidThreshold(self.threshold));
        }
        Ok(())
    }
}
