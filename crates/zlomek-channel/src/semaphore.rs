use crate::interrupt::Interrupt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::Duration;

/// Result of a blocking acquisition that can also observe disconnection or
/// an interrupt: `read-next-request`'s suspension point needs to wake on
/// any of the three, not just a filled queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    Acquired,
    Disconnected,
    Interrupted,
}

/// A counting semaphore built on `Mutex`/`Condvar`, with no parking_lot or
/// crossbeam in the dependency stack to reach for instead. Its value equals
/// the depth of the pending queue it guards; one `release` wakes exactly one
/// blocked `acquire`.
pub struct Semaphore {
    count: Mutex<usize>,
    cond: Condvar,
}

impl Semaphore {
    pub fn new(initial: usize) -> Self {
        Self {
            count: Mutex::new(initial),
            cond: Condvar::new(),
        }
    }

    pub fn release(&self) {
        let mut count = self.count.lock().expect("semaphore mutex poisoned");
        *count += 1;
        self.cond.notify_one();
    }

    /// Non-blocking acquire, used by the reader to put a token back without
    /// waiting when it must retry after losing a try-lock race.
    pub fn try_acquire(&self) -> bool {
        let mut count = self.count.lock().expect("semaphore mutex poisoned");
        if *count > 0 {
            *count -= 1;
            true
        } else {
            false
        }
    }

    /// Blocks until a token is available, the channel is reported
    /// disconnected, or an interrupt is raised. Polls in short slices since
    /// neither condition has its own condvar to notify on here; `close` and
    /// callers raising an interrupt are expected to also `release` a spare
    /// token so a blocked reader wakes promptly on either event in practice.
    pub fn acquire_until(&self, connected: &AtomicBool, interrupt: &Interrupt) -> AcquireOutcome {
        let mut count = self.count.lock().expect("semaphore mutex poisoned");
        loop {
            if *count > 0 {
                *count -= 1;
                return AcquireOutcome::Acquired;
            }
            if !connected.load(Ordering::SeqCst) {
                return AcquireOutcome::Disconnected;
            }
            if interrupt.is_raised() {
                return AcquireOutcome::Interrupted;
            }
            let (guard, _) = self
                .cond
                .wait_timeout(count, Duration::from_millis(25))
                .expect("semaphore mutex poisoned");
            count = guard;
        }
    }

    pub fn wake_all(&self) {
        self.cond.notify_all();
    }
}
