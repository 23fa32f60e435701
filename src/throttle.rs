use crate::error::{DispatchError, Result};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Fixed-window dispatch throttle.
///
/// Allows at most `max_per_window` acquisitions per window. The window opens
/// on the first acquisition after the previous one has run out, and a caller
/// that finds the window full sleeps for whatever is left of it before a new
/// window is opened.
#[derive(Debug)]
pub struct Throttle {
    max_per_window: u32,
    window: Duration,
    counter: u32,
    window_start: Option<Instant>,
}

impl Throttle {
    #[must_use]
    pub fn new(max_per_window: u32, window_ms: u64) -> Self {
        Self {
            max_per_window: max_per_window.max(1),
            window: Duration::from_millis(window_ms),
            counter: 0,
            window_start: None,
        }
    }

    /// Time left in a window of `window_ms` after `elapsed_ms`, never negative
    #[must_use]
    pub const fn remaining_wait(window_ms: u64, elapsed_ms: u64) -> Duration {
        Duration::from_millis(window_ms.saturating_sub(elapsed_ms))
    }

    #[allow(clippy::cast_possible_truncation)]
    fn millis(duration: Duration) -> u64 {
        // u64 milliseconds covers ~584 million years
        duration.as_millis() as u64
    }

    fn start_window(&mut self, now: Instant) {
        self.counter = 0;
        self.window_start = Some(now);
    }

    /// Dispatches counted in the current window
    #[must_use]
    pub const fn count(&self) -> u32 {
        self.counter
    }

    /// Milliseconds since the current window opened, or zero when idle
    #[must_use]
    pub fn elapsed_ms(&self) -> u64 {
        self.window_start
            .map_or(0, |start| Self::millis(start.elapsed()))
    }

    /// Reserve a slot for one dispatch
    ///
    /// Returns how long the caller was held back, if at all.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Canceled`] if `cancel` fires while waiting for
    /// the window to run out.
    pub async fn acquire(&mut self, cancel: &CancellationToken) -> Result<Option<Duration>> {
        let now = Instant::now();
        match self.window_start {
            Some(start) if now.duration_since(start) < self.window => {}
            _ => self.start_window(now),
        }

        let mut waited = None;
        if self.counter >= self.max_per_window {
            let window_ms = Self::millis(self.window);
            let wait = Self::remaining_wait(window_ms, self.elapsed_ms());
            if !wait.is_zero() {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => return Err(DispatchError::Canceled),
                    () = tokio::time::sleep(wait) => {}
                }
                waited = Some(wait);
            }
            self.start_window(Instant::now());
        }

        self.counter += 1;
        Ok(waited)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remaining_wait() {
        assert_eq!(Throttle::remaining_wait(1000, 0), Duration::from_millis(1000));
        assert_eq!(Throttle::remaining_wait(1000, 400), Duration::from_millis(600));
        assert_eq!(Throttle::remaining_wait(1000, 1000), Duration::ZERO);
        assert_eq!(Throttle::remaining_wait(1000, 5000), Duration::ZERO);
    }

    #[test]
    fn test_zero_max_is_clamped() {
        let throttle = Throttle::new(0, 1000);
        assert_eq!(throttle.max_per_window, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fills_window_without_waiting() {
        let cancel = CancellationToken::new();
        let mut throttle = Throttle::new(3, 1000);

        for expected in 1..=3 {
            assert_eq!(throttle.acquire(&cancel).await.unwrap(), None);
            assert_eq!(throttle.count(), expected);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_window_waits_out_remainder() {
        let cancel = CancellationToken::new();
        let mut throttle = Throttle::new(2, 1000);
        let start = Instant::now();

        throttle.acquire(&cancel).await.unwrap();
        tokio::time::advance(Duration::from_millis(250)).await;
        throttle.acquire(&cancel).await.unwrap();

        let waited = throttle.acquire(&cancel).await.unwrap();
        assert_eq!(waited, Some(Duration::from_millis(750)));
        assert_eq!(start.elapsed(), Duration::from_millis(1000));
        assert_eq!(throttle.count(), 1);
        assert_eq!(throttle.elapsed_ms(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_gap_resets_window() {
        let cancel = CancellationToken::new();
        let mut throttle = Throttle::new(2, 1000);

        throttle.acquire(&cancel).await.unwrap();
        throttle.acquire(&cancel).await.unwrap();
        assert_eq!(throttle.count(), 2);

        tokio::time::advance(Duration::from_secs(30)).await;

        assert_eq!(throttle.acquire(&cancel).await.unwrap(), None);
        assert_eq!(throttle.count(), 1);
        assert_eq!(throttle.acquire(&cancel).await.unwrap(), None);
        assert_eq!(throttle.count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_wait() {
        let cancel = CancellationToken::new();
        let mut throttle = Throttle::new(1, 60_000);
        throttle.acquire(&cancel).await.unwrap();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });

        let start = Instant::now();
        let result = throttle.acquire(&cancel).await;
        assert!(matches!(result, Err(DispatchError::Canceled)));
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
