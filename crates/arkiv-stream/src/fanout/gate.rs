use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Condvar, Mutex};

struct GateState {
    write_capacity: usize,
    read_capacity:  usize,
    closed:         bool,
}

/// What a reader may do after waiting on its gate.
pub(crate) enum Readable {
    Bytes(usize),
    Eof,
    Broken,
}

/// Per-reader flow control: `write_capacity + read_capacity` always equals the
/// buffer capacity. The producer draws on the write side, the reader on the
/// read side. A closed gate no longer constrains the producer.
pub(crate) struct Gate {
    state: Mutex<GateState>,
    cond:  Condvar,
}

impl Gate {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(GateState {
                write_capacity: capacity,
                read_capacity:  0,
                closed:         false,
            }),
            cond:  Condvar::new(),
        }
    }

    /// Blocks until `len` bytes fit on the write side. Returns `false` if the
    /// gate is, or becomes, closed.
    pub(crate) fn await_write_capacity(&self, len: usize) -> bool {
        let mut state = self.state.lock();
        while !state.closed && state.write_capacity < len {
            self.cond.wait(&mut state);
        }
        !state.closed
    }

    /// Moves `len` bytes from the write side to the read side. Returns `false`
    /// if the gate closed since the producer waited on it.
    pub(crate) fn publish(&self, len: usize) -> bool {
        let mut state = self.state.lock();
        if state.closed {
            return false;
        }
        state.write_capacity -= len;
        state.read_capacity += len;
        self.cond.notify_all();
        true
    }

    /// Blocks until bytes are readable, the stream ended, or the gate closed
    /// without an end of stream. Buffered bytes always win over EOF/closure.
    pub(crate) fn await_readable(&self, eof: &AtomicBool) -> Readable {
        let mut state = self.state.lock();
        loop {
            if state.read_capacity > 0 {
                return Readable::Bytes(state.read_capacity);
            }
            if eof.load(Ordering::Acquire) {
                return Readable::Eof;
            }
            if state.closed {
                return Readable::Broken;
            }
            self.cond.wait(&mut state);
        }
    }

    /// Hands `len` consumed bytes back to the write side.
    pub(crate) fn consume(&self, len: usize) {
        let mut state = self.state.lock();
        state.read_capacity -= len;
        state.write_capacity += len;
        self.cond.notify_all();
    }

    pub(crate) fn read_capacity(&self) -> usize { self.state.lock().read_capacity }

    /// Returns whether this call closed the gate.
    pub(crate) fn close(&self) -> bool {
        let mut state = self.state.lock();
        let was_open = !state.closed;
        state.closed = true;
        self.cond.notify_all();
        was_open
    }

    pub(crate) fn is_closed(&self) -> bool { self.state.lock().closed }

    /// Wakes waiters after a change made outside the gate's lock, such as the
    /// end-of-stream flag.
    pub(crate) fn wake(&self) {
        let _state = self.state.lock();
        self.cond.notify_all();
    }
}
