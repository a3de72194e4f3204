use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

/// Wait-free single-producer single-consumer float ring.
///
/// One producer thread advances `write_pos`, one consumer thread advances
/// `read_pos`; each publishes its index with a release store and observes the
/// other's with an acquire load. One cell is kept empty so a full ring is
/// distinguishable from an empty one. Partial transfers are reported, never
/// silently truncated.
///
/// Samples are stored as `f32` bit patterns in `AtomicU32` cells so the ring
/// can be shared by reference across threads; relaxed per-cell accesses
/// compile to plain moves, and the index handshake provides the ordering.
#[derive(Debug)]
pub struct SpscRing {
    buf: Box<[AtomicU32]>,
    read_pos: AtomicUsize,
    write_pos: AtomicUsize,
}

/// Raw view of a ring for zero-copy sharing with an external process. The
/// buffer holds `f32` bit patterns; the positions are plain machine words.
#[derive(Debug, Clone, Copy)]
pub struct RingRawParts {
    pub buffer: *mut f32,
    pub read_pos: *mut usize,
    pub write_pos: *mut usize,
    pub capacity: usize,
}

impl SpscRing {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(2);
        let buf = (0..capacity).map(|_| AtomicU32::new(0)).collect();
        Self {
            buf,
            read_pos: AtomicUsize::new(0),
            write_pos: AtomicUsize::new(0),
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    pub fn available_to_read(&self) -> usize {
        let w = self.write_pos.load(Ordering::Acquire);
        let r = self.read_pos.load(Ordering::Relaxed);
        if w >= r {
            w - r
        } else {
            w + self.capacity() - r
        }
    }

    pub fn available_to_write(&self) -> usize {
        let w = self.write_pos.load(Ordering::Relaxed);
        let r = self.read_pos.load(Ordering::Acquire);
        if r > w {
            r - w - 1
        } else {
            r + self.capacity() - w - 1
        }
    }

    /// Writes up to `data.len()` samples, returning how many were accepted.
    pub fn write(&self, data: &[f32]) -> usize {
        let count = data.len().min(self.available_to_write());
        let capacity = self.capacity();
        let mut w = self.write_pos.load(Ordering::Relaxed);
        for &sample in &data[..count] {
            self.buf[w].store(sample.to_bits(), Ordering::Relaxed);
            w = (w + 1) % capacity;
        }
        self.write_pos.store(w, Ordering::Release);
        count
    }

    /// Reads up to `out.len()` samples, returning how many were produced.
    pub fn read(&self, out: &mut [f32]) -> usize {
        let count = out.len().min(self.available_to_read());
        let capacity = self.capacity();
        let mut r = self.read_pos.load(Ordering::Relaxed);
        for slot in &mut out[..count] {
            *slot = f32::from_bits(self.buf[r].load(Ordering::Relaxed));
            r = (r + 1) % capacity;
        }
        self.read_pos.store(r, Ordering::Release);
        count
    }

    /// Resets both positions and zeroes the storage. Not safe to call while
    /// a producer or consumer is active; intended for prepare-time use.
    pub fn clear(&self) {
        self.read_pos.store(0, Ordering::Release);
        self.write_pos.store(0, Ordering::Release);
        for cell in self.buf.iter() {
            cell.store(0, Ordering::Relaxed);
        }
    }

    pub fn read_pos(&self) -> usize {
        self.read_pos.load(Ordering::Acquire)
    }

    pub fn write_pos(&self) -> usize {
        self.write_pos.load(Ordering::Acquire)
    }

    pub fn set_read_pos(&self, pos: usize) {
        self.read_pos.store(pos % self.capacity(), Ordering::Release);
    }

    pub fn set_write_pos(&self, pos: usize) {
        self.write_pos.store(pos % self.capacity(), Ordering::Release);
    }

    /// Raw pointers for an external producer/consumer. `AtomicU32` cells and
    /// `AtomicUsize` have the layout of their plain counterparts, so the
    /// pointers alias the live storage.
    pub fn raw_parts(&self) -> RingRawParts {
        RingRawParts {
            buffer: self.buf.as_ptr() as *mut f32,
            read_pos: self.read_pos.as_ptr(),
            write_pos: self.write_pos.as_ptr(),
            capacity: self.capacity(),
        }
    }
}

/// One independent [`SpscRing`] per channel; channels advance independently.
#[derive(Debug)]
pub struct MultiChannelRing {
    channels: Vec<SpscRing>,
}

impl MultiChannelRing {
    pub fn new(channels: usize, capacity_per_channel: usize) -> Self {
        Self {
            channels: (0..channels)
                .map(|_| SpscRing::new(capacity_per_channel))
                .collect(),
        }
    }

    pub fn channel(&self, index: usize) -> Option<&SpscRing> {
        self.channels.get(index)
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn clear(&self) {
        for ring in &self.channels {
            ring.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;
    use std::sync::Arc;

    #[test]
    fn round_trip_preserves_order() {
        let ring = SpscRing::new(16);
        assert_eq!(ring.write(&[1.0, 2.0, 3.0]), 3);
        let mut out = [0.0; 3];
        assert_eq!(ring.read(&mut out), 3);
        assert_eq!(out, [1.0, 2.0, 3.0]);
    }

    #[test]
    fn one_cell_stays_empty() {
        let ring = SpscRing::new(8);
        let data = [0.5; 16];
        assert_eq!(ring.write(&data), 7);
        assert_eq!(ring.available_to_read(), 7);
        assert_eq!(ring.available_to_write(), 0);
    }

    #[test]
    fn accounting_invariant_holds_across_wrap() {
        let ring = SpscRing::new(8);
        let mut out = [0.0; 8];
        for step in 0..100 {
            let wrote = ring.write(&[step as f32; 3]);
            assert!(wrote <= 3);
            let read = ring.read(&mut out[..2]);
            assert!(read <= 2);
            assert_eq!(
                ring.available_to_read() + ring.available_to_write(),
                ring.capacity() - 1
            );
        }
    }

    #[test]
    fn partial_write_is_reported() {
        let ring = SpscRing::new(4);
        assert_eq!(ring.write(&[1.0, 2.0, 3.0, 4.0, 5.0]), 3);
        let mut out = [0.0; 2];
        assert_eq!(ring.read(&mut out), 2);
        assert_eq!(out, [1.0, 2.0]);
        assert_eq!(ring.write(&[6.0, 7.0, 8.0]), 2);
    }

    #[test]
    fn position_setters_wrap() {
        let ring = SpscRing::new(8);
        ring.set_write_pos(13);
        assert_eq!(ring.write_pos(), 5);
        ring.set_read_pos(8);
        assert_eq!(ring.read_pos(), 0);
    }

    #[test]
    fn concurrent_producer_consumer_sees_every_sample_in_order() {
        const TOTAL: usize = 50_000;
        let ring = Arc::new(SpscRing::new(64));

        let producer = {
            let ring = Arc::clone(&ring);
            std::thread::spawn(move || {
                let mut rng = rand::thread_rng();
                let mut next = 0usize;
                while next < TOTAL {
                    let chunk: Vec<f32> = (next..TOTAL.min(next + rng.gen_range(1..17)))
                        .map(|v| v as f32)
                        .collect();
                    next += ring.write(&chunk);
                }
            })
        };

        let mut seen = Vec::with_capacity(TOTAL);
        let mut scratch = [0.0f32; 24];
        while seen.len() < TOTAL {
            let n = ring.read(&mut scratch);
            seen.extend_from_slice(&scratch[..n]);
        }
        producer.join().unwrap();

        for (index, value) in seen.iter().enumerate() {
            assert_eq!(*value, index as f32);
        }
    }
}
