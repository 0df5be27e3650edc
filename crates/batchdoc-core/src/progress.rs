//! Progress reporting for batch runs

use serde::Serialize;
use std::collections::VecDeque;

/// Speed samples kept for smoothing
const SPEED_WINDOW: usize = 5;

/// Elapsed/remaining estimate for a run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Timing {
    pub elapsed: String,
    pub remaining: String,
    /// Items per second, smoothed
    pub speed: f64,
    pub percent: f64,
}

/// Rolling estimate over the last few speed samples
#[derive(Debug, Clone)]
pub struct ProgressTimer {
    started_ms: u64,
    total: usize,
    speeds: VecDeque<f64>,
}

impl ProgressTimer {
    pub fn start(total: usize, now_ms: u64) -> Self {
        Self {
            started_ms: now_ms,
            total,
            speeds: VecDeque::with_capacity(SPEED_WINDOW),
        }
    }

    pub fn elapsed_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.started_ms)
    }

    /// Record `processed` items done; `None` until something has finished
    pub fn update(&mut self, processed: usize, now_ms: u64) -> Option<Timing> {
        if processed == 0 || self.total == 0 {
            return None;
        }
        let elapsed_secs = (self.elapsed_ms(now_ms).max(1)) as f64 / 1000.0;

        self.speeds.push_back(processed as f64 / elapsed_secs);
        if self.speeds.len() > SPEED_WINDOW {
            self.speeds.pop_front();
        }
        let speed = self.speeds.iter().sum::<f64>() / self.speeds.len() as f64;

        let remaining = self.total.saturating_sub(processed) as f64;
        Some(Timing {
            elapsed: format_duration(elapsed_secs),
            remaining: format_duration(remaining / speed),
            speed,
            percent: processed as f64 / self.total as f64 * 100.0,
        })
    }
}

/// `42s`, `3m 5s`, `1h 2m`
pub fn format_duration(seconds: f64) -> String {
    let total = if seconds.is_finite() {
        seconds.max(0.0).round() as u64
    } else {
        0
    };
    if total < 60 {
        format!("{}s", total)
    } else if total < 3600 {
        format!("{}m {}s", total / 60, total % 60)
    } else {
        format!("{}h {}m", total / 3600, (total % 3600) / 60)
    }
}

/// One progress report from a run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressUpdate {
    pub processed: usize,
    pub total: usize,
    pub label: String,
    pub timing: Option<Timing>,
}

/// Host-side receiver of progress; also the yield and cancel point
pub trait ProgressSink {
    fn report(&mut self, update: &ProgressUpdate);

    /// Hand control back to the host between batches
    fn yield_now(&mut self) {}

    /// Polled at every yield point
    fn cancel_requested(&self) -> bool {
        false
    }
}

/// Sink that drops every report
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn report(&mut self, _update: &ProgressUpdate) {}
}

/// Sink that records reports, handy for hosts that poll
#[derive(Debug, Default, Clone)]
pub struct RecordingProgress {
    pub updates: Vec<ProgressUpdate>,
    pub yields: usize,
    pub cancel_after_yields: Option<usize>,
}

impl ProgressSink for RecordingProgress {
    fn report(&mut self, update: &ProgressUpdate) {
        self.updates.push(update.clone());
    }

    fn yield_now(&mut self) {
        self.yields += 1;
    }

    fn cancel_requested(&self) -> bool {
        self.cancel_after_yields.is_some_and(|n| self.yields >= n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(42.4), "42s");
        assert_eq!(format_duration(185.0), "3m 5s");
        assert_eq!(format_duration(3720.0), "1h 2m");
        assert_eq!(format_duration(f64::INFINITY), "0s");
    }

    #[test]
    fn test_timer_needs_progress() {
        let mut timer = ProgressTimer::start(10, 0);
        assert!(timer.update(0, 500).is_none());
    }

    #[test]
    fn test_timer_estimates_remaining() {
        let mut timer = ProgressTimer::start(10, 0);
        let timing = timer.update(5, 5_000).unwrap();
        assert_eq!(timing.elapsed, "5s");
        assert_eq!(timing.remaining, "5s");
        assert_eq!(timing.percent, 50.0);
        assert!((timing.speed - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_speed_window_is_bounded() {
        let mut timer = ProgressTimer::start(100, 0);
        for i in 1..=8 {
            timer.update(i, i as u64 * 1_000);
        }
        assert_eq!(timer.speeds.len(), SPEED_WINDOW);
    }
}
