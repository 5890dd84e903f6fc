use crate::error::ErrorKind;
use crate::wire::DEFAULT_MAX_MESSAGE;
use bytes::BytesMut;
use std::sync::Mutex;

/// A buffer acquired from a [`BufferPool`]. Holds exactly one encoded
/// message body between acquisition and `release`.
pub struct MessageBuffer {
    pub bytes: BytesMut,
}

impl MessageBuffer {
    fn new(capacity: usize) -> Self {
        Self {
            bytes: BytesMut::with_capacity(capacity),
        }
    }
}

struct Inner {
    free: Vec<MessageBuffer>,
    /// Buffers either free or currently checked out; bounded by `capacity`.
    allocated: usize,
}

/// Fixed-capacity pool of [`MessageBuffer`]s, each with capacity at least
/// `buffer_size`. Mirrors a kernel-resident fixed slab: exhaustion is a
/// reportable error (`OutOfMemory`), not an unbounded allocation.
pub struct BufferPool {
    buffer_size: usize,
    capacity: usize,
    inner: Mutex<Inner>,
}

impl BufferPool {
    pub fn new(capacity: usize) -> Self {
        Self::with_buffer_size(capacity, DEFAULT_MAX_MESSAGE)
    }

    pub fn with_buffer_size(capacity: usize, buffer_size: usize) -> Self {
        Self {
            buffer_size,
            capacity,
            inner: Mutex::new(Inner {
                free: Vec::new(),
                allocated: 0,
            }),
        }
    }

    pub fn acquire(&self) -> Result<MessageBuffer, ErrorKind> {
        let mut inner = self.inner.lock().expect("buffer pool mutex poisoned");
        if let Some(mut buf) = inner.free.pop() {
            buf.bytes.clear();
            return Ok(buf);
        }
        if inner.allocated >= self.capacity {
            return Err(ErrorKind::OutOfMemory);
        }
        inner.allocated += 1;
        Ok(MessageBuffer::new(self.buffer_size))
    }

    /// Returns `buf` to the pool. `drop_content` discards the buffer itself
    /// (freeing its capacity slot for reallocation) rather than returning it
    /// to the free list — used on the channel-close path where buffers are
    /// being torn down rather than recycled. A no-op on a `None` handle, so
    /// callers can release unconditionally without a prior check.
    pub fn release(&self, buf: Option<MessageBuffer>, drop_content: bool) {
        let Some(buf) = buf else { return };
        let mut inner = self.inner.lock().expect("buffer pool mutex poisoned");
        if drop_content {
            inner.allocated -= 1;
        } else {
            inner.free.push(buf);
        }
    }

    /// Tears the pool down. Must only be invoked once every outstanding
    /// buffer has been released back to it.
    pub fn destroy_all(&self) {
        let mut inner = self.inner.lock().expect("buffer pool mutex poisoned");
        inner.free.clear();
        inner.allocated = 0;
    }

    /// Number of buffers currently checked out. Used by tests to assert a
    /// zero leaked-buffer count after a channel is fully drained.
    pub fn outstanding(&self) -> usize {
        let inner = self.inner.lock().expect("buffer pool mutex poisoned");
        inner.allocated - inner.free.len()
    }
}
