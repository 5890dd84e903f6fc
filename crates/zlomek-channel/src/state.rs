use crate::interrupt::Interrupt;
use crate::request::Request;
use crate::semaphore::Semaphore;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use zlomek_protocol::{BufferPool, Config, ErrorKind, MessageBuffer};

struct Inner {
    pending: VecDeque<Arc<Request>>,
    processing: Vec<Vec<Arc<Request>>>,
}

impl Inner {
    fn new(buckets: u32) -> Self {
        Self {
            pending: VecDeque::new(),
            processing: (0..buckets).map(|_| Vec::new()).collect(),
        }
    }

    fn bucket(&mut self, id: u32, buckets: u32) -> &mut Vec<Arc<Request>> {
        &mut self.processing[(id % buckets) as usize]
    }
}

/// The shared structure a session's caller, reader and writer threads all
/// operate on: the connection flag, the request-id generator, the pending
/// queue, the processing table, and the synchronisation primitives guarding
/// them. Not a process-wide global here, but `zlomek-chardev`'s daemon pump
/// loops are expected to hold exactly one for the lifetime of a session.
pub struct ChannelState {
    pub config: Config,
    pub pool: BufferPool,
    connected: AtomicBool,
    next_id: AtomicU32,
    pending_sem: Semaphore,
    buckets: u32,
    inner: Mutex<Inner>,
}

impl ChannelState {
    pub fn new(config: Config) -> Arc<Self> {
        let buckets = config.processing_buckets;
        let pool_capacity = config.pool_capacity;
        Arc::new(Self {
            config,
            pool: BufferPool::new(pool_capacity),
            connected: AtomicBool::new(false),
            next_id: AtomicU32::new(1),
            pending_sem: Semaphore::new(0),
            buckets,
            inner: Mutex::new(Inner::new(buckets)),
        })
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Transitions disconnected→connected. Fails with `Busy` if already
    /// connected; a session may only have one daemon attached at a time.
    pub fn open(&self) -> Result<(), ErrorKind> {
        let mut inner = self.inner.lock().expect("channel mutex poisoned");
        if self.connected.swap(true, Ordering::SeqCst) {
            return Err(ErrorKind::Busy);
        }
        inner.pending.clear();
        for bucket in inner.processing.iter_mut() {
            bucket.clear();
        }
        self.next_id.store(1, Ordering::SeqCst);
        Ok(())
    }

    /// Tears the session down: marks disconnected and wakes every blocked
    /// reader and every Request still referenced by the pending queue or
    /// the processing table. Does not drain the buffer pool itself — a
    /// woken Request still owns its body buffer until its caller reclaims
    /// it via [`Self::release_buffer`], and `spec.md` §4.4 requires close to
    /// leave those buffers alone until the last one lets go. Drains
    /// immediately only in the (common) case where nothing was outstanding
    /// to begin with. A no-op if already disconnected.
    pub fn close(&self) {
        if !self.connected.swap(false, Ordering::SeqCst) {
            return;
        }
        let mut inner = self.inner.lock().expect("channel mutex poisoned");
        for req in inner.pending.drain(..) {
            req.mark_disconnected();
        }
        for bucket in inner.processing.iter_mut() {
            for req in bucket.drain(..) {
                req.mark_disconnected();
            }
        }
        drop(inner);
        self.pending_sem.wake_all();
        self.maybe_drain_pool();
    }

    /// Releases a buffer back through the pool exactly like
    /// `self.pool.release`, except once the channel is disconnected this
    /// also drains the pool the instant nothing is outstanding any longer.
    /// Every buffer release on a path that might run after `close` (a
    /// reclaimed call, an orphaned reply, a one-way message) goes through
    /// this rather than `pool.release` directly, so the pool is never torn
    /// down while a live Request still references one of its buffers.
    pub fn release_buffer(&self, buf: Option<MessageBuffer>, drop_content: bool) {
        self.pool.release(buf, drop_content);
        self.maybe_drain_pool();
    }

    fn maybe_drain_pool(&self) {
        if !self.is_connected() && self.pool.outstanding() == 0 {
            self.pool.destroy_all();
        }
    }

    /// Reserves the next request id. Monotonic modulo 2^32; wraparound is
    /// tolerated since a live request set never approaches 2^32 entries.
    pub fn next_request_id(&self) -> u32 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Appends `req` to the pending queue and wakes one reader. Returns
    /// `IoError` if the channel is no longer connected (checked again under
    /// the channel mutex, matching the call path's second `connected`
    /// check).
    pub fn enqueue_pending(&self, req: Arc<Request>) -> Result<(), ErrorKind> {
        let mut inner = self.inner.lock().expect("channel mutex poisoned");
        if !self.is_connected() {
            return Err(ErrorKind::IoError);
        }
        inner.pending.push_back(req);
        drop(inner);
        self.pending_sem.release();
        Ok(())
    }

    /// Removes `req` from the pending queue, if it is still there. Used by a
    /// caller reclaiming its Request after a timeout, signal, or disconnect
    /// observed while the request was still `Pending`.
    pub fn remove_pending(&self, id: u32) {
        let mut inner = self.inner.lock().expect("channel mutex poisoned");
        inner.pending.retain(|r| r.id != id);
    }

    /// Removes `req` from its processing bucket, if it is still there. Used
    /// by a caller reclaiming its Request after a timeout, signal, or
    /// disconnect observed after a reader had already moved it to
    /// processing.
    pub fn remove_processing(&self, id: u32) {
        let mut inner = self.inner.lock().expect("channel mutex poisoned");
        let bucket = inner.bucket(id, self.buckets);
        bucket.retain(|r| r.id != id);
    }

    /// Dequeues the head of the pending queue under the channel mutex,
    /// applying the try-lock discipline: if the request's owner is
    /// concurrently reclaiming it, the token is put back and `None` is
    /// returned so the caller retries with the next request rather than
    /// block. Requests the reader successfully claims are moved to their
    /// processing bucket and left `Processing`.
    pub fn dequeue_for_reader(&self) -> Option<Arc<Request>> {
        let mut inner = self.inner.lock().expect("channel mutex poisoned");
        let req = inner.pending.pop_front()?;
        if !req.try_mark_processing() {
            inner.pending.push_back(req);
            drop(inner);
            self.pending_sem.release();
            return None;
        }
        let bucket = inner.bucket(req.id, self.buckets);
        bucket.push(req.clone());
        Some(req)
    }

    /// Puts a request back at the head of the pending queue, restoring its
    /// body buffer and reverting it from `Processing` to `Pending`. Used
    /// when the reader successfully claimed it but then failed to copy its
    /// body into the caller-provided sink (`Fault`) — the sole permitted
    /// backward state transition, since the copy never actually completed.
    pub fn requeue_at_head(&self, req: Arc<Request>, buf: MessageBuffer) {
        req.revert_to_pending(buf);
        let mut inner = self.inner.lock().expect("channel mutex poisoned");
        let bucket = inner.bucket(req.id, self.buckets);
        bucket.retain(|r| r.id != req.id);
        inner.pending.push_front(req);
        drop(inner);
        self.pending_sem.release();
    }

    /// Looks a request up by id in its processing bucket, removing it on a
    /// match. Used by `deliver_reply_or_oneway` to find the Request a Reply
    /// belongs to.
    pub fn take_processing(&self, id: u32) -> Option<Arc<Request>> {
        let mut inner = self.inner.lock().expect("channel mutex poisoned");
        let bucket = inner.bucket(id, self.buckets);
        let pos = bucket.iter().position(|r| r.id == id)?;
        Some(bucket.remove(pos))
    }

    /// Blocks until at least one request is pending, the channel
    /// disconnects, or `interrupt` fires.
    pub fn wait_for_pending(&self, interrupt: &Interrupt) -> crate::semaphore::AcquireOutcome {
        self.pending_sem.acquire_until(&self.connected, interrupt)
    }

    /// Returns the id at the head of the pending queue without removing it.
    /// Used by a zero-length read, which reports what *would* be read next
    /// without dequeuing anything.
    pub fn peek_pending_id(&self) -> Option<u32> {
        let inner = self.inner.lock().expect("channel mutex poisoned");
        inner.pending.front().map(|r| r.id)
    }

    /// Hands back a pending-count token without consuming a request. Used
    /// after `wait_for_pending` succeeds for a zero-length read, which must
    /// not actually dequeue.
    pub fn release_pending_token(&self) {
        self.pending_sem.release();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use zlomek_protocol::Config;

    #[test]
    fn test_open_twice_is_busy() {
        let state = ChannelState::new(Config::default());
        state.open().unwrap();
        assert!(matches!(state.open(), Err(ErrorKind::Busy)));
    }

    #[test]
    fn test_close_is_idempotent() {
        let state = ChannelState::new(Config::default());
        state.open().unwrap();
        state.close();
        state.close();
        assert!(!state.is_connected());
    }

    #[test]
    fn test_enqueue_and_dequeue_fifo() {
        let state = ChannelState::new(Config::default());
        state.open().unwrap();
        let r1 = Arc::new(Request::new(1));
        let r2 = Arc::new(Request::new(2));
        state.enqueue_pending(r1.clone()).unwrap();
        state.enqueue_pending(r2.clone()).unwrap();

        let first = state.dequeue_for_reader().unwrap();
        let second = state.dequeue_for_reader().unwrap();
        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
    }
}
