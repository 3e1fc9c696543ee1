// SPDX-License-Identifier: GPL-3.0-only

//! Clocks and rate limiting for the cooperative loops
//!
//! The preview tick, the heart-rate measurement and the exposure loop all
//! suspend through a [`Clock`]. Production code uses [`TokioClock`]; tests use
//! [`VirtualClock`], whose sleeps advance virtual time and return immediately.

use futures::future::{self, BoxFuture};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

/// Time source for the timed loops
pub trait Clock: Send + Sync {
    /// Time elapsed since the clock's origin
    fn now(&self) -> Duration;

    /// Suspend for `duration`
    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()>;
}

/// Wall clock backed by the tokio timer
#[derive(Debug, Clone)]
pub struct TokioClock {
    origin: tokio::time::Instant,
}

impl TokioClock {
    pub fn new() -> Self {
        Self {
            origin: tokio::time::Instant::now(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TokioClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()> {
        Box::pin(tokio::time::sleep(duration))
    }
}

/// Deterministic clock for tests and offline rendering
///
/// Clones share the same time line.
#[derive(Debug, Clone, Default)]
pub struct VirtualClock {
    nanos: Arc<AtomicU64>,
}

impl VirtualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move time forward without sleeping
    pub fn advance(&self, duration: Duration) {
        self.nanos
            .fetch_add(duration.as_nanos() as u64, Ordering::SeqCst);
    }
}

impl Clock for VirtualClock {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::SeqCst))
    }

    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()> {
        self.advance(duration);
        Box::pin(future::ready(()))
    }
}

/// Skips work until a minimum interval has passed since the last accepted tick
///
/// Used to throttle display-refresh ticks down to a render rate.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    interval: Duration,
    last: Option<Duration>,
}

impl RateLimiter {
    /// Limiter accepting at most `rate` ticks per second
    pub fn per_second(rate: u32) -> Self {
        Self {
            interval: Duration::from_secs_f64(1.0 / rate.max(1) as f64),
            last: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Returns true (and records the tick) when enough time has elapsed
    pub fn ready(&mut self, now: Duration) -> bool {
        match self.last {
            Some(last) if now.saturating_sub(last) < self.interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }

    /// Forget the last tick so the next one renders immediately
    pub fn reset(&mut self) {
        self.last = None;
    }
}

/// Shared cancellation signal for in-flight measurements and captures
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::timing::{DISPLAY_REFRESH, PREVIEW_FPS};

    #[tokio::test]
    async fn test_virtual_clock_sleep_advances_time() {
        let clock = VirtualClock::new();
        clock.sleep(Duration::from_millis(25)).await;
        clock.sleep(Duration::from_millis(25)).await;
        assert_eq!(clock.now(), Duration::from_millis(50));

        let shared = clock.clone();
        shared.advance(Duration::from_millis(10));
        assert_eq!(clock.now(), Duration::from_millis(60));
    }

    #[test]
    fn test_rate_limiter_throttles_display_ticks() {
        let mut limiter = RateLimiter::per_second(PREVIEW_FPS);
        let mut rendered = 0;
        let mut now = Duration::ZERO;
        while now < Duration::from_secs(1) {
            if limiter.ready(now) {
                rendered += 1;
            }
            now += DISPLAY_REFRESH;
        }
        assert!((13..=16).contains(&rendered), "rendered {}", rendered);
    }

    #[test]
    fn test_rate_limiter_first_tick_and_reset() {
        let mut limiter = RateLimiter::per_second(10);
        assert!(limiter.ready(Duration::from_millis(5)));
        assert!(!limiter.ready(Duration::from_millis(50)));
        limiter.reset();
        assert!(limiter.ready(Duration::from_millis(51)));
    }

    #[test]
    fn test_cancel_flag_is_shared() {
        let flag = CancelFlag::new();
        let other = flag.clone();
        assert!(!other.is_cancelled());
        flag.cancel();
        assert!(other.is_cancelled());
    }
}
