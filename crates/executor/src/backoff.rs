//! Backoff sleeping.
//!
//! The executor never calls `std::thread::sleep` directly; it goes through a
//! [`Sleeper`] so tests can record the delay sequence instead of waiting.

use std::time::Duration;

/// Blocks the calling thread between attempts.
pub trait Sleeper {
    /// Wait for `delay`
    fn sleep(&mut self, delay: Duration);
}

/// Sleeps the current thread. The default for real executors.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&mut self, delay: Duration) {
        std::thread::sleep(delay);
    }
}

impl<S: Sleeper + ?Sized> Sleeper for &mut S {
    fn sleep(&mut self, delay: Duration) {
        (**self).sleep(delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_thread_sleeper_blocks() {
        let start = Instant::now();
        ThreadSleeper.sleep(Duration::from_millis(5));
        assert!(start.elapsed() >= Duration::from_millis(5));
    }
}
