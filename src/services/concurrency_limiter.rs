//! Concurrency limiter (C5): a global in-flight cap with fail-fast
//! rejection. Release is guaranteed on every exit path, success, error,
//! or cancellation, by an RAII guard rather than a manual decrement,
//! the idiomatic Rust strengthening of the Python implementation's
//! `try/finally`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub struct ConcurrencyLimiter {
    in_flight: AtomicUsize,
    max_concurrent: usize,
}

/// Held for the lifetime of one admitted request; decrements `in_flight`
/// when dropped, however the request ends (including a dropped future on
/// client disconnect).
pub struct InFlightGuard {
    limiter: Arc<ConcurrencyLimiter>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.limiter.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}

impl ConcurrencyLimiter {
    pub fn new(max_concurrent: usize) -> Arc<Self> {
        Arc::new(ConcurrencyLimiter {
            in_flight: AtomicUsize::new(0),
            max_concurrent,
        })
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Attempts to admit one request. Returns a guard on success; the
    /// caller must hold it for the request's full lifetime. The
    /// check-then-increment happens in a single compare-exchange loop so
    /// concurrent admissions never push `in_flight` past `max_concurrent`.
    pub fn try_admit(self: &Arc<Self>) -> Option<InFlightGuard> {
        let mut current = self.in_flight.load(Ordering::Acquire);
        loop {
            if current >= self.max_concurrent {
                return None;
            }
            match self.in_flight.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    return Some(InFlightGuard {
                        limiter: Arc::clone(self),
                    })
                }
                Err(observed) => current = observed,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_up_to_max_then_sheds() {
        let limiter = ConcurrencyLimiter::new(2);
        let g1 = limiter.try_admit().expect("first admitted");
        let g2 = limiter.try_admit().expect("second admitted");
        assert!(limiter.try_admit().is_none());
        assert_eq!(limiter.in_flight(), 2);

        drop(g1);
        assert_eq!(limiter.in_flight(), 1);
        let g3 = limiter.try_admit().expect("slot freed after drop");
        drop(g2);
        drop(g3);
        assert_eq!(limiter.in_flight(), 0);
    }

    #[test]
    fn never_goes_negative() {
        let limiter = ConcurrencyLimiter::new(1);
        let guard = limiter.try_admit().unwrap();
        drop(guard);
        assert_eq!(limiter.in_flight(), 0);
    }
}
