use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::{sleep_until, Instant};

/// Sliding-window rate limiter: at most `limit` events in any trailing
/// `window`.
///
/// [`ready`](Self::ready) only waits; the caller calls
/// [`record`](Self::record) once the guarded operation actually happened, so
/// failed attempts do not consume budget.
#[derive(Debug)]
pub struct SlidingWindow {
    limit: usize,
    window: Duration,
    history: VecDeque<Instant>,
}

impl SlidingWindow {
    /// A `limit` of zero is treated as one.
    pub fn new(limit: usize, window: Duration) -> Self {
        let limit = limit.max(1);
        Self {
            limit,
            window,
            history: VecDeque::with_capacity(limit),
        }
    }

    /// Wait until another event fits in the window. Cancel safe.
    pub async fn ready(&mut self) {
        loop {
            self.prune(Instant::now());
            match self.history.front() {
                Some(&oldest) if self.history.len() >= self.limit => {
                    sleep_until(oldest + self.window).await;
                }
                _ => return,
            }
        }
    }

    /// Record an event at the current instant.
    pub fn record(&mut self) {
        self.history.push_back(Instant::now());
    }

    /// Events that could happen right now without waiting.
    pub fn available(&mut self) -> usize {
        self.prune(Instant::now());
        self.limit - self.history.len().min(self.limit)
    }

    fn prune(&mut self, now: Instant) {
        while let Some(&oldest) = self.history.front() {
            if now.duration_since(oldest) >= self.window {
                self.history.pop_front();
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_ready_is_immediate_under_limit() {
        let mut window = SlidingWindow::new(3, Duration::from_secs(10));
        let start = Instant::now();
        for _ in 0..3 {
            window.ready().await;
            window.record();
        }
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(window.available(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_waits_for_oldest_to_expire() {
        let mut window = SlidingWindow::new(2, Duration::from_secs(10));
        let start = Instant::now();

        window.record();
        tokio::time::advance(Duration::from_secs(4)).await;
        window.record();

        window.ready().await;
        assert_eq!(start.elapsed(), Duration::from_secs(10));
        assert_eq!(window.available(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unrecorded_attempts_do_not_count() {
        let mut window = SlidingWindow::new(1, Duration::from_secs(30));
        let start = Instant::now();
        window.ready().await;
        window.ready().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_zero_limit_is_one() {
        let mut window = SlidingWindow::new(0, Duration::from_secs(1));
        assert_eq!(window.available(), 1);
    }
}
