//! Fixed-size buffer pool.
//!
//! A [`BufferPool`] is constructed by whoever starts transfers and handed to
//! each fan-out buffer, so buffer sizing and limits are per instance rather
//! than process-wide.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use tracing::trace;

use crate::config::PoolOptions;
use crate::{Result, StreamError};

struct PoolInner {
    options:     PoolOptions,
    idle:        Mutex<Vec<Box<[u8]>>>,
    outstanding: AtomicUsize,
}

impl PoolInner {
    fn release(&self, buffer: Box<[u8]>) {
        let outstanding = self.outstanding.fetch_sub(1, Ordering::AcqRel) - 1;
        let mut idle = self.idle.lock();
        if idle.len() < self.options.get_max_idle() && buffer.len() == self.options.get_buffer_size() {
            idle.push(buffer);
        }
        trace!(outstanding, idle = idle.len(), "buffer returned to pool");
    }
}

#[derive(Clone)]
pub struct BufferPool {
    inner: Arc<PoolInner>,
}

impl std::fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferPool")
            .field("options", &self.inner.options)
            .field("available", &self.available())
            .field("outstanding", &self.outstanding())
            .finish()
    }
}

impl BufferPool {
    pub fn new(options: PoolOptions) -> Result<Self> {
        if options.get_buffer_size() == 0 {
            return Err(StreamError::invalid("pool buffer size must be positive"));
        }
        if options.get_max_outstanding() == Some(0) {
            return Err(StreamError::invalid("pool max_outstanding must be positive"));
        }
        Ok(Self {
            inner: Arc::new(PoolInner {
                options,
                idle: Mutex::new(Vec::new()),
                outstanding: AtomicUsize::new(0),
            }),
        })
    }

    /// Hands out a buffer of `buffer_size` bytes, reusing an idle one if any. Fails
    /// with [`StreamError::PoolExhausted`] when `max_outstanding` buffers are
    /// already in use.
    pub fn acquire(&self) -> Result<PooledBuffer> {
        let reserved = match self.inner.options.get_max_outstanding() {
            Some(max) => self
                .inner
                .outstanding
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| (n < max).then_some(n + 1))
                .map_err(|outstanding| StreamError::PoolExhausted { outstanding })?,
            None => self.inner.outstanding.fetch_add(1, Ordering::AcqRel),
        };
        let buffer = self
            .inner
            .idle
            .lock()
            .pop()
            .unwrap_or_else(|| vec![0u8; self.inner.options.get_buffer_size()].into_boxed_slice());
        trace!(outstanding = reserved + 1, "buffer acquired from pool");
        Ok(PooledBuffer {
            buffer,
            pool: Arc::clone(&self.inner),
        })
    }

    pub fn buffer_size(&self) -> usize { self.inner.options.get_buffer_size() }

    /// Idle buffers ready for reuse.
    pub fn available(&self) -> usize { self.inner.idle.lock().len() }

    /// Buffers currently handed out.
    pub fn outstanding(&self) -> usize { self.inner.outstanding.load(Ordering::Acquire) }
}

/// A buffer on loan from a [`BufferPool`]; returned when dropped.
pub struct PooledBuffer {
    buffer: Box<[u8]>,
    pool:   Arc<PoolInner>,
}

impl Deref for PooledBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] { &self.buffer }
}

impl DerefMut for PooledBuffer {
    fn deref_mut(&mut self) -> &mut [u8] { &mut self.buffer }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) { self.pool.release(std::mem::take(&mut self.buffer)); }
}
