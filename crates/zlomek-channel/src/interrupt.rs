use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Stand-in for `signal_pending(current)`. The original kernel module could
/// observe a POSIX signal arriving on the calling thread mid-wait; a
/// portable library cannot hook that, so callers raise this flag explicitly
/// from whatever their own cancellation source is (a signal handler, a
/// cooperative cancellation token, a test harness).
#[derive(Debug, Default)]
pub struct Interrupt(AtomicBool);

impl Interrupt {
    pub fn new() -> Arc<Self> {
        Arc::new(Self(AtomicBool::new(false)))
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}
