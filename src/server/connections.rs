//! Live connection tracking
//!
//! Every accepted connection holds a `ConnectionGuard`; the count drops
//! when the guard does, whichever way the session ends.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Clone, Debug, Default)]
pub struct ConnectionCounter {
    live: Arc<AtomicUsize>,
}

impl ConnectionCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one more live connection.
    pub fn acquire(&self) -> ConnectionGuard {
        let live = self.live.fetch_add(1, Ordering::SeqCst) + 1;
        ConnectionGuard {
            live: Arc::clone(&self.live),
            count_at_accept: live,
        }
    }

    pub fn current(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
pub struct ConnectionGuard {
    live: Arc<AtomicUsize>,
    count_at_accept: usize,
}

impl ConnectionGuard {
    /// Live connections right after this one was counted.
    pub fn count_at_accept(&self) -> usize {
        self.count_at_accept
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_counts_once() {
        let counter = ConnectionCounter::new();
        let first = counter.acquire();
        let second = counter.acquire();
        assert_eq!(first.count_at_accept(), 1);
        assert_eq!(second.count_at_accept(), 2);
        assert_eq!(counter.current(), 2);

        drop(first);
        assert_eq!(counter.current(), 1);
        drop(second);
        assert_eq!(counter.current(), 0);
    }

    #[test]
    fn test_concurrent_acquire_release() {
        let counter = ConnectionCounter::new();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let counter = counter.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        let _guard = counter.acquire();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(counter.current(), 0);
    }
}
