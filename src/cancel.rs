use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

#[derive(Debug, Default)]
struct Shared {
    cancelled: AtomicBool,
    lock: Mutex<()>,
    signal: Condvar,
}

/// A token for cooperative cancellation of a background reader.
///
/// Cloning a CancelToken creates a new handle to the same underlying
/// cancellation state. When any handle calls `cancel()`, all handles
/// observe `is_cancelled() == true` and every thread parked in
/// `wait_timeout` wakes up.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    shared: Arc<Shared>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Non-blocking; the worker must check
    /// `is_cancelled()` at its poll boundaries and stop.
    pub fn cancel(&self) {
        let _guard = self.shared.lock.lock();
        self.shared.cancelled.store(true, Ordering::SeqCst);
        self.shared.signal.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared.cancelled.load(Ordering::SeqCst)
    }

    /// Sleep for up to `timeout`, returning early once cancelled.
    /// Returns `true` if cancellation was requested.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let mut guard = self.shared.lock.lock();
        if self.is_cancelled() {
            return true;
        }
        self.shared.signal.wait_for(&mut guard, timeout);
        self.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_new_token_not_cancelled() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
    }

    #[test]
    fn test_clone_shares_state() {
        let token1 = CancelToken::new();
        let token2 = token1.clone();

        token2.cancel();

        assert!(token1.is_cancelled());
        assert!(token2.is_cancelled());
    }

    #[test]
    fn test_wait_timeout_elapses_without_cancel() {
        let token = CancelToken::new();
        let start = Instant::now();
        assert!(!token.wait_timeout(Duration::from_millis(20)));
        assert!(start.elapsed() >= Duration::from_millis(15));
    }

    #[test]
    fn test_wait_timeout_returns_immediately_when_cancelled() {
        let token = CancelToken::new();
        token.cancel();
        let start = Instant::now();
        assert!(token.wait_timeout(Duration::from_secs(10)));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_cancel_wakes_waiter() {
        let token = CancelToken::new();
        let waiter = token.clone();

        let handle = thread::spawn(move || {
            let start = Instant::now();
            let cancelled = waiter.wait_timeout(Duration::from_secs(10));
            (cancelled, start.elapsed())
        });

        thread::sleep(Duration::from_millis(20));
        token.cancel();

        let (cancelled, elapsed) = handle.join().unwrap();
        assert!(cancelled);
        assert!(elapsed < Duration::from_secs(5), "took {:?}", elapsed);
    }
}
