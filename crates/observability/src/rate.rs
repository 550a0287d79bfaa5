//! 帧率测量
//!
//! 每 `window` 帧计算一次瞬时帧率，同时维护自开始以来的平均帧率。

use std::time::Instant;

/// 默认测量窗口（帧数）
pub const DEFAULT_RATE_WINDOW: u64 = 20;

/// 帧率计
#[derive(Debug, Clone)]
pub struct RateMeter {
    window: u64,
    started_at: Option<Instant>,
    window_started_at: Option<Instant>,
    window_count: u64,
    total: u64,
    current: f64,
    last_at: Option<Instant>,
}

impl Default for RateMeter {
    fn default() -> Self {
        Self::new(DEFAULT_RATE_WINDOW)
    }
}

impl RateMeter {
    pub fn new(window: u64) -> Self {
        Self {
            window: window.max(1),
            started_at: None,
            window_started_at: None,
            window_count: 0,
            total: 0,
            current: 0.0,
            last_at: None,
        }
    }

    /// 记录一帧
    ///
    /// 窗口结束时返回新的帧率。
    pub fn tick(&mut self) -> Option<f64> {
        self.tick_at(Instant::now())
    }

    /// 在指定时刻记录一帧
    pub fn tick_at(&mut self, now: Instant) -> Option<f64> {
        let started = *self.started_at.get_or_insert(now);
        let window_start = *self.window_started_at.get_or_insert(started);
        self.total += 1;
        self.window_count += 1;
        self.last_at = Some(now);

        if self.window_count < self.window {
            return None;
        }

        let elapsed = now.duration_since(window_start).as_secs_f64();
        if elapsed > 0.0 {
            self.current = self.window_count as f64 / elapsed;
        }
        self.window_count = 0;
        self.window_started_at = Some(now);
        Some(self.current)
    }

    /// 最近一个完整窗口的帧率
    pub fn current(&self) -> f64 {
        self.current
    }

    /// 平均帧率
    pub fn average(&self) -> f64 {
        match (self.started_at, self.last_at) {
            (Some(start), Some(last)) => {
                let elapsed = last.duration_since(start).as_secs_f64();
                if elapsed > 0.0 {
                    (self.total - 1) as f64 / elapsed
                } else {
                    0.0
                }
            }
            _ => 0.0,
        }
    }

    /// 已记录帧数
    pub fn count(&self) -> u64 {
        self.total
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.window);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_rate_reported_once_per_window() {
        let mut meter = RateMeter::new(5);
        let t0 = Instant::now();
        let mut reports = Vec::new();
        for i in 0..10u64 {
            if let Some(fps) = meter.tick_at(t0 + Duration::from_millis(40 * i)) {
                reports.push(fps);
            }
        }
        assert_eq!(reports.len(), 2);
        // second window: 5 frames over 200ms
        assert!((reports[1] - 25.0).abs() < 1e-6);
        assert_eq!(meter.count(), 10);
    }

    #[test]
    fn test_average_over_whole_run() {
        let mut meter = RateMeter::new(20);
        let t0 = Instant::now();
        for i in 0..11u64 {
            meter.tick_at(t0 + Duration::from_millis(100 * i));
        }
        assert!((meter.average() - 10.0).abs() < 1e-6);
        assert_eq!(meter.current(), 0.0);
    }

    #[test]
    fn test_empty_meter() {
        let meter = RateMeter::default();
        assert_eq!(meter.average(), 0.0);
        assert_eq!(meter.count(), 0);
    }
}
