use crate::interrupt::Interrupt;
use std::sync::{Condvar, Mutex, TryLockError};
use std::time::{Duration, Instant};
use zlomek_protocol::MessageBuffer;

/// Observable lifecycle of a Request. A `Dequeued` state is deliberately
/// absent: it is the instant a reader holds the request mutex having
/// removed the Request from its container but not yet written `Processing`,
/// and is never exposed past that mutex.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Pending,
    Processing,
    Replied,
}

/// Outcome of blocking on a Request's wait point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    Replied,
    Timeout,
    Interrupted,
    Disconnected,
}

struct Inner {
    state: RequestState,
    /// Holds the encoded request body from creation until the reader
    /// reclaims it in `read_next_request`, then `None` until
    /// `deliver_reply_or_oneway` transfers the reply buffer in.
    reply: Option<MessageBuffer>,
    disconnected: bool,
}

/// One in-flight K→D call: its id, state, owned buffer, and the wait point
/// the caller blocks on. Shared between the caller (which holds an `Arc`)
/// and whichever channel container currently references it.
pub struct Request {
    pub id: u32,
    inner: Mutex<Inner>,
    cond: Condvar,
}

impl Request {
    pub fn new(id: u32) -> Self {
        Self {
            id,
            inner: Mutex::new(Inner {
                state: RequestState::Pending,
                reply: None,
                disconnected: false,
            }),
            cond: Condvar::new(),
        }
    }

    pub fn state(&self) -> RequestState {
        self.inner.lock().expect("request mutex poisoned").state
    }

    /// Attempts to acquire the per-request mutex without blocking. Used
    /// exclusively by the reader in `read_next_request`: on contention it
    /// must give up this request, return the pending-count token, and retry
    /// with the next one rather than block on a caller that is reclaiming
    /// the same request.
    pub fn try_mark_processing(&self) -> bool {
        match self.inner.try_lock() {
            Ok(mut guard) => {
                guard.state = RequestState::Processing;
                true
            }
            Err(TryLockError::WouldBlock) => false,
            Err(TryLockError::Poisoned(_)) => panic!("request mutex poisoned"),
        }
    }

    /// Parks the encoded request body on a freshly created, still-`Pending`
    /// Request. Reused for the outbound body the same way `deliver_reply`
    /// is reused for the inbound one: exactly one of the two is ever live on
    /// this field at a time.
    pub fn set_body(&self, buf: MessageBuffer) {
        let mut guard = self.inner.lock().expect("request mutex poisoned");
        debug_assert_eq!(guard.state, RequestState::Pending);
        guard.reply = Some(buf);
    }

    /// Transfers ownership of the reply buffer to this Request and
    /// transitions it to `Replied`, waking its caller.
    pub fn deliver_reply(&self, buf: MessageBuffer) {
        let mut guard = self.inner.lock().expect("request mutex poisoned");
        guard.reply = Some(buf);
        guard.state = RequestState::Replied;
        drop(guard);
        self.cond.notify_all();
    }

    /// Reverts a `Processing` request back to `Pending`, restoring its body
    /// buffer. The one permitted backward transition: a reader successfully
    /// claimed the request but then failed to copy its body into the
    /// caller's sink (`Fault`, `spec.md` §4.4), so the attempt never
    /// actually completed and the request is eligible to be read again.
    pub fn revert_to_pending(&self, buf: MessageBuffer) {
        let mut guard = self.inner.lock().expect("request mutex poisoned");
        debug_assert_eq!(guard.state, RequestState::Processing);
        guard.state = RequestState::Pending;
        guard.reply = Some(buf);
    }

    /// Marks this Request as observing channel disconnection, waking its
    /// caller. Idempotent.
    pub fn mark_disconnected(&self) {
        let mut guard = self.inner.lock().expect("request mutex poisoned");
        guard.disconnected = true;
        drop(guard);
        self.cond.notify_all();
    }

    /// Takes ownership of the reply buffer, if one has arrived.
    pub fn take_reply(&self) -> Option<MessageBuffer> {
        self.inner.lock().expect("request mutex poisoned").reply.take()
    }

    /// Blocks the caller until a reply arrives, the deadline passes, the
    /// channel disconnects, or `interrupt` is raised. Polls in short slices
    /// so a concurrently raised interrupt or disconnect is observed
    /// promptly without a dedicated external wakeup source.
    pub fn wait(&self, timeout: Duration, interrupt: &Interrupt) -> Wake {
        let deadline = Instant::now() + timeout;
        let mut guard = self.inner.lock().expect("request mutex poisoned");
        loop {
            if guard.state == RequestState::Replied {
                return Wake::Replied;
            }
            if guard.disconnected {
                return Wake::Disconnected;
            }
            if interrupt.is_raised() {
                return Wake::Interrupted;
            }
            let now = Instant::now();
            if now >= deadline {
                return Wake::Timeout;
            }
            let slice = (deadline - now).min(Duration::from_millis(25));
            let (g, _) = self
                .cond
                .wait_timeout(guard, slice)
                .expect("request mutex poisoned");
            guard = g;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_deliver_reply_wakes_waiter() {
        let req = Arc::new(Request::new(1));
        let req2 = req.clone();
        let handle = thread::spawn(move || req2.wait(Duration::from_secs(5), &Interrupt::new()));

        thread::sleep(Duration::from_millis(20));
        req.deliver_reply(MessageBuffer { bytes: Default::default() });

        assert_eq!(handle.join().unwrap(), Wake::Replied);
        assert_eq!(req.state(), RequestState::Replied);
    }

    #[test]
    fn test_wait_times_out() {
        let req = Request::new(1);
        let wake = req.wait(Duration::from_millis(30), &Interrupt::new());
        assert_eq!(wake, Wake::Timeout);
    }

    #[test]
    fn test_interrupt_wakes_waiter() {
        let interrupt = Interrupt::new();
        let req = Request::new(1);
        interrupt.raise();
        assert_eq!(req.wait(Duration::from_secs(5), &interrupt), Wake::Interrupted);
    }

    #[test]
    fn test_try_mark_processing_fails_while_caller_holds_lock() {
        let req = Request::new(1);
        let guard = req.inner.lock().unwrap();
        assert!(!req.try_mark_processing());
        drop(guard);
        assert!(req.try_mark_processing());
        assert_eq!(req.state(), RequestState::Processing);
    }
}
