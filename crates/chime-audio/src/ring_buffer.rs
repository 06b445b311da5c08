//! Lock-free single-producer single-consumer ring buffer of stereo frames.
//!
//! Each hardware voice queues submitted frames here. The feeder thread is the
//! producer and the mixer render path is the consumer. No mutexes, only
//! acquire/release on the two positions.

use chime_core::WaveSample;
use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A SPSC ring buffer for stereo sample frames.
pub struct RingBuffer {
    buffer: Box<[UnsafeCell<WaveSample>]>,
    capacity: usize,
    read_pos: AtomicUsize,
    write_pos: AtomicUsize,
}

// SAFETY: The ring buffer is designed for SPSC use. The read_pos and write_pos
// are accessed via atomics, and the buffer segments accessed by reader and
// writer never overlap (guaranteed by available_read/available_write).
unsafe impl Send for RingBuffer {}
unsafe impl Sync for RingBuffer {}

impl RingBuffer {
    /// Create a new ring buffer holding up to `capacity` frames.
    pub fn new(capacity: usize) -> Self {
        // One spare slot distinguishes full from empty.
        let actual_cap = capacity + 1;
        Self {
            buffer: (0..actual_cap)
                .map(|_| UnsafeCell::new(WaveSample::ZERO))
                .collect(),
            capacity: actual_cap,
            read_pos: AtomicUsize::new(0),
            write_pos: AtomicUsize::new(0),
        }
    }

    /// Maximum number of frames the buffer can hold.
    pub fn capacity(&self) -> usize {
        self.capacity - 1
    }

    /// Number of frames available for reading.
    pub fn available_read(&self) -> usize {
        let w = self.write_pos.load(Ordering::Acquire);
        let r = self.read_pos.load(Ordering::Acquire);
        if w >= r {
            w - r
        } else {
            self.capacity - r + w
        }
    }

    /// Number of frames that can be written.
    pub fn available_write(&self) -> usize {
        self.capacity - 1 - self.available_read()
    }

    #[inline]
    fn slots(&self) -> *mut WaveSample {
        // UnsafeCell<T> has the same layout as T.
        self.buffer.as_ptr() as *mut WaveSample
    }

    /// Write frames into the buffer. Returns number actually written.
    pub fn write(&self, data: &[WaveSample]) -> usize {
        let count = data.len().min(self.available_write());
        if count == 0 {
            return 0;
        }

        let w = self.write_pos.load(Ordering::Relaxed);
        let first_chunk = (self.capacity - w).min(count);
        let second_chunk = count - first_chunk;

        // SAFETY: We only write to positions between write_pos and read_pos
        // (the "free" region), and the reader only reads from the other region.
        unsafe {
            let slots = self.slots();
            std::ptr::copy_nonoverlapping(data.as_ptr(), slots.add(w), first_chunk);
            if second_chunk > 0 {
                std::ptr::copy_nonoverlapping(data[first_chunk..].as_ptr(), slots, second_chunk);
            }
        }

        self.write_pos
            .store((w + count) % self.capacity, Ordering::Release);
        count
    }

    /// Read frames from the buffer. Returns number actually read.
    pub fn read(&self, output: &mut [WaveSample]) -> usize {
        let count = output.len().min(self.available_read());
        if count == 0 {
            return 0;
        }

        let r = self.read_pos.load(Ordering::Relaxed);
        let first_chunk = (self.capacity - r).min(count);
        let second_chunk = count - first_chunk;

        // SAFETY: The region between read_pos and write_pos was published by
        // the writer's release store and is not touched by it until we advance.
        unsafe {
            let slots = self.slots();
            std::ptr::copy_nonoverlapping(slots.add(r), output.as_mut_ptr(), first_chunk);
            if second_chunk > 0 {
                std::ptr::copy_nonoverlapping(
                    slots,
                    output[first_chunk..].as_mut_ptr(),
                    second_chunk,
                );
            }
        }

        self.read_pos
            .store((r + count) % self.capacity, Ordering::Release);
        count
    }

    /// Take the next frame, if any.
    pub fn pop(&self) -> Option<WaveSample> {
        let mut frame = [WaveSample::ZERO];
        (self.read(&mut frame) == 1).then_some(frame[0])
    }

    /// Discard everything queued.
    ///
    /// This moves the read position, so it must only run while the consumer
    /// is excluded (the mixer holds the voice's render lock around reads).
    pub fn clear(&self) {
        self.read_pos
            .store(self.write_pos.load(Ordering::Acquire), Ordering::Release);
    }
}
