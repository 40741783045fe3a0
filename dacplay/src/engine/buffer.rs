//! Ping-pong sample buffers shared between the producer and the sample clock.
//!
//! The producer only writes a buffer whose Ready flag is clear, and the
//! consumer only reads a buffer whose Ready flag is set. Contents are
//! published by a Release store of the flag and observed by an Acquire load,
//! so neither side ever sees a partially written buffer.

use std::sync::atomic::{AtomicBool, AtomicI16, AtomicUsize, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferState {
    Empty,
    Ready,
}

#[derive(Debug)]
pub struct StreamBuffer {
    samples: Box<[AtomicI16]>,
    len: AtomicUsize,
    ready: AtomicBool,
}

impl StreamBuffer {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            samples: (0..capacity).map(|_| AtomicI16::new(0)).collect(),
            len: AtomicUsize::new(0),
            ready: AtomicBool::new(false),
        }
    }

    pub fn capacity(&self) -> usize {
        self.samples.len()
    }

    pub fn state(&self) -> BufferState {
        if self.ready.load(Ordering::Acquire) {
            BufferState::Ready
        } else {
            BufferState::Empty
        }
    }

    /// Sample count of the last publish.
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.state() == BufferState::Empty
    }
}

/// Two stream buffers plus the consumer's `active` index and read cursor.
#[derive(Debug)]
pub struct BufferPool {
    buffers: [StreamBuffer; 2],
    active: AtomicUsize,
    position: AtomicUsize,
    stride: usize,
}

impl BufferPool {
    /// Allocates both buffers; `capacity` is in samples and `stride` is the
    /// number of interleaved channels per frame.
    pub fn new(capacity: usize, stride: usize) -> Self {
        let stride = stride.max(1);
        let capacity = capacity / stride * stride;
        Self {
            buffers: [
                StreamBuffer::with_capacity(capacity),
                StreamBuffer::with_capacity(capacity),
            ],
            active: AtomicUsize::new(0),
            position: AtomicUsize::new(0),
            stride,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buffers[0].capacity()
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn buffer(&self, index: usize) -> &StreamBuffer {
        &self.buffers[index & 1]
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    pub fn position(&self) -> usize {
        self.position.load(Ordering::Acquire)
    }

    pub fn all_empty(&self) -> bool {
        self.buffers.iter().all(StreamBuffer::is_empty)
    }

    /// Buffer the producer should fill next, if any.
    ///
    /// The active buffer takes precedence when it is Empty: the consumer has
    /// swapped onto it during an underrun and is not reading from it.
    pub fn fill_target(&self) -> Option<usize> {
        let active = self.active();
        [active, active ^ 1]
            .into_iter()
            .find(|&index| self.buffers[index].is_empty())
    }

    /// Copies `samples` into an Empty buffer and marks it Ready.
    ///
    /// Producer side only. Returns the number of samples published, which is
    /// `samples.len()` truncated to capacity and to whole frames; nothing is
    /// published when that is zero or the buffer is still Ready.
    pub fn publish(&self, index: usize, samples: &[i16]) -> usize {
        let buffer = &self.buffers[index & 1];
        if !buffer.is_empty() {
            return 0;
        }
        let n = samples.len().min(buffer.capacity()) / self.stride * self.stride;
        if n == 0 {
            return 0;
        }
        for (slot, &sample) in buffer.samples.iter().zip(&samples[..n]) {
            slot.store(sample, Ordering::Relaxed);
        }
        buffer.len.store(n, Ordering::Relaxed);
        buffer.ready.store(true, Ordering::Release);
        n
    }

    /// Returns both buffers to Empty and rewinds the cursor to buffer 0.
    ///
    /// Must only be called while the consumer is stopped.
    pub fn reset(&self) {
        for buffer in &self.buffers {
            buffer.ready.store(false, Ordering::Release);
            buffer.len.store(0, Ordering::Relaxed);
        }
        self.position.store(0, Ordering::Relaxed);
        self.active.store(0, Ordering::Release);
    }

    /// Consumer side: takes the first-channel sample at the cursor.
    ///
    /// Returns `None` on underrun without touching any pointer. Draining the
    /// last frame of the active buffer marks it Empty and swaps to the other.
    #[inline]
    pub fn next_frame(&self) -> Option<i16> {
        let active = self.active.load(Ordering::Acquire);
        let buffer = &self.buffers[active];
        if !buffer.ready.load(Ordering::Acquire) {
            return None;
        }

        let len = buffer.len.load(Ordering::Relaxed);
        let position = self.position.load(Ordering::Relaxed);
        let sample = buffer.samples.get(position)?.load(Ordering::Relaxed);

        let next = position + self.stride;
        if next >= len {
            self.position.store(0, Ordering::Relaxed);
            buffer.ready.store(false, Ordering::Release);
            self.active.store(active ^ 1, Ordering::Release);
        } else {
            self.position.store(next, Ordering::Relaxed);
        }
        Some(sample)
    }
}
