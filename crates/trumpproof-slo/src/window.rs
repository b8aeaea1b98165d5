//! Rolling latency windows

use std::collections::VecDeque;
use std::time::Duration;

/// Bounded window of the most recent latency samples for one op kind
#[derive(Debug, Clone)]
pub struct SloWindow {
    samples: VecDeque<Duration>,
    capacity: usize,
    recorded: u64,
    breaches: u64,
}

impl SloWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
            recorded: 0,
            breaches: 0,
        }
    }

    /// Record a sample, evicting the oldest once full
    pub fn record(&mut self, elapsed: Duration, breached: bool) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(elapsed);
        self.recorded += 1;
        if breached {
            self.breaches += 1;
        }
    }

    /// Nearest-rank percentile over the current window
    pub fn percentile(&self, pct: f64) -> Option<Duration> {
        if self.samples.is_empty() {
            return None;
        }
        let mut sorted: Vec<Duration> = self.samples.iter().copied().collect();
        sorted.sort_unstable();
        let rank = (pct * sorted.len() as f64 / 100.0).ceil() as usize;
        let index = rank.clamp(1, sorted.len()) - 1;
        Some(sorted[index])
    }

    pub fn p95(&self) -> Option<Duration> {
        self.percentile(95.0)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Samples recorded over the window's lifetime
    pub fn recorded(&self) -> u64 {
        self.recorded
    }

    /// Breaches recorded over the window's lifetime
    pub fn breaches(&self) -> u64 {
        self.breaches
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_p95_nearest_rank() {
        let mut window = SloWindow::new(1_000);
        for i in 1..=100 {
            window.record(ms(i), false);
        }
        assert_eq!(window.p95(), Some(ms(95)));
        assert_eq!(window.percentile(100.0), Some(ms(100)));
        assert_eq!(window.percentile(0.0), Some(ms(1)));
    }

    #[test]
    fn test_empty_window() {
        assert_eq!(SloWindow::new(10).p95(), None);
    }

    #[test]
    fn test_window_bounded() {
        let mut window = SloWindow::new(3);
        for i in [500, 1, 2, 3] {
            window.record(ms(i), i > 100);
        }
        assert_eq!(window.len(), 3);
        assert_eq!(window.p95(), Some(ms(3)));
        assert_eq!(window.recorded(), 4);
        assert_eq!(window.breaches(), 1);
    }
}
