//! Output disciplines for the formatting engine.
//!
//! All sinks count every pushed byte in `wanted`, whether or not they store
//! it. That count is the value the C entry points return.

use crate::error::FormatError;
use crate::metrics::{RuntimeMetrics, metrics};

/// Destination for rendered bytes.
pub trait Sink {
    /// What `finish` hands back on success.
    type Output;

    /// Accept `bytes`. Storage may be partial; `wanted` always grows by
    /// `bytes.len()`.
    fn push(&mut self, bytes: &[u8]);

    /// Total bytes pushed so far.
    fn wanted(&self) -> usize;

    /// Terminate the output and report the final state.
    fn finish(self) -> Result<Self::Output, FormatError>;

    /// Push `count` copies of `byte`.
    fn push_repeat(&mut self, byte: u8, count: usize) {
        let chunk = [byte; 64];
        let mut left = count;
        while left > 0 {
            let n = left.min(chunk.len());
            self.push(&chunk[..n]);
            left -= n;
        }
    }
}

/// Final state of an unbounded or bounded sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkSummary {
    pub wanted: usize,
    /// Bytes actually stored, excluding the terminator.
    pub stored: usize,
    pub truncated: bool,
}

/// Byte channel behind an [`UnboundedSink`], e.g. a serial or console driver.
pub trait OutputChannel {
    fn write_bytes(&mut self, bytes: &[u8]);
}

impl OutputChannel for Vec<u8> {
    fn write_bytes(&mut self, bytes: &[u8]) {
        self.extend_from_slice(bytes);
    }
}

impl<C: OutputChannel + ?Sized> OutputChannel for &mut C {
    fn write_bytes(&mut self, bytes: &[u8]) {
        (**self).write_bytes(bytes);
    }
}

// ---------------------------------------------------------------------------
// Unbounded (printf)
// ---------------------------------------------------------------------------

/// Bytes an [`UnboundedSink`] collects before handing them to its channel.
pub const STAGING_BYTES: usize = 128;

/// Writes every byte through to an output channel. Never truncates.
///
/// Pushes are staged and reach the channel in batches of up to
/// [`STAGING_BYTES`]; pushes at least that long bypass the stage. `finish`,
/// `flush` and `into_channel` drain whatever is staged.
#[derive(Debug)]
pub struct UnboundedSink<C: OutputChannel> {
    channel: C,
    stage: [u8; STAGING_BYTES],
    staged: usize,
    wanted: usize,
}

impl<C: OutputChannel> UnboundedSink<C> {
    pub fn new(channel: C) -> Self {
        Self {
            channel,
            stage: [0; STAGING_BYTES],
            staged: 0,
            wanted: 0,
        }
    }

    /// Hand staged bytes to the channel.
    pub fn flush(&mut self) {
        if self.staged > 0 {
            self.channel.write_bytes(&self.stage[..self.staged]);
            self.staged = 0;
        }
    }

    pub fn into_channel(mut self) -> C {
        self.flush();
        self.channel
    }
}

impl<C: OutputChannel> Sink for UnboundedSink<C> {
    type Output = SinkSummary;

    fn push(&mut self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        self.wanted = self.wanted.saturating_add(bytes.len());
        if bytes.len() > STAGING_BYTES - self.staged {
            self.flush();
            if bytes.len() >= STAGING_BYTES {
                self.channel.write_bytes(bytes);
                return;
            }
        }
        self.stage[self.staged..self.staged + bytes.len()].copy_from_slice(bytes);
        self.staged += bytes.len();
    }

    fn wanted(&self) -> usize {
        self.wanted
    }

    fn finish(mut self) -> Result<SinkSummary, FormatError> {
        self.flush();
        Ok(SinkSummary {
            wanted: self.wanted,
            stored: self.wanted,
            truncated: false,
        })
    }
}

// ---------------------------------------------------------------------------
// Bounded (snprintf)
// ---------------------------------------------------------------------------

/// Stores at most `capacity - 1` bytes into a caller buffer and terminates it
/// on `finish`. A zero-capacity buffer is never written.
#[derive(Debug)]
pub struct BoundedSink<'a> {
    buf: &'a mut [u8],
    stored: usize,
    wanted: usize,
}

impl<'a> BoundedSink<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self {
            buf,
            stored: 0,
            wanted: 0,
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }
}

impl Sink for BoundedSink<'_> {
    type Output = SinkSummary;

    fn push(&mut self, bytes: &[u8]) {
        let room = self.buf.len().saturating_sub(1).saturating_sub(self.stored);
        let n = room.min(bytes.len());
        self.buf[self.stored..self.stored + n].copy_from_slice(&bytes[..n]);
        self.stored += n;
        self.wanted = self.wanted.saturating_add(bytes.len());
    }

    fn wanted(&self) -> usize {
        self.wanted
    }

    fn finish(self) -> Result<SinkSummary, FormatError> {
        if let Some(terminator) = self.buf.get_mut(self.stored) {
            *terminator = 0;
        }
        let truncated = self.wanted > self.stored;
        if truncated {
            RuntimeMetrics::inc(&metrics().truncations);
        }
        Ok(SinkSummary {
            wanted: self.wanted,
            stored: self.stored,
            truncated,
        })
    }
}

// ---------------------------------------------------------------------------
// Growable (asprintf)
// ---------------------------------------------------------------------------

/// Smallest allocation the growable sink makes.
pub const MIN_GROWTH: usize = 32;

/// Memory behind a [`GrowableSink`].
///
/// `Vec<u8>` is the default; the C entry points supply a `malloc`-family
/// store so the finished buffer can be handed to the caller as is.
pub trait GrowStore {
    /// Bytes held.
    fn filled(&self) -> usize;

    /// Bytes the store can hold without growing.
    fn capacity(&self) -> usize;

    /// Grow the capacity to at least `capacity` bytes. Returns `false` on
    /// allocation failure, leaving the store as it was.
    fn try_grow(&mut self, capacity: usize) -> bool;

    /// Append `bytes`. The sink has already grown the store to fit them.
    fn append(&mut self, bytes: &[u8]);

    /// Drop the contents and give the memory back.
    fn release(&mut self);
}

impl GrowStore for Vec<u8> {
    fn filled(&self) -> usize {
        self.len()
    }

    fn capacity(&self) -> usize {
        Vec::capacity(self)
    }

    fn try_grow(&mut self, capacity: usize) -> bool {
        capacity <= Vec::capacity(self) || self.try_reserve_exact(capacity - self.len()).is_ok()
    }

    fn append(&mut self, bytes: &[u8]) {
        self.extend_from_slice(bytes);
    }

    fn release(&mut self) {
        *self = Vec::new();
    }
}

/// Heap buffer that grows to fit the whole output plus a terminator.
///
/// Capacity doubles (or jumps straight to the exact need) on overflow. An
/// optional ceiling caps the capacity so allocation failure can be provoked
/// deterministically. After a failure the buffer is released immediately and
/// the sink keeps counting so `wanted` stays exact.
#[derive(Debug)]
pub struct GrowableSink<B: GrowStore = Vec<u8>> {
    buf: B,
    wanted: usize,
    ceiling: Option<usize>,
    failed: Option<usize>,
}

/// Successful output of a [`GrowableSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrownBuffer<B = Vec<u8>> {
    /// Output followed by a single NUL.
    pub bytes: B,
    /// Output length, excluding the NUL.
    pub len: usize,
}

impl GrownBuffer {
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    /// Output without the terminator.
    #[must_use]
    pub fn into_vec(mut self) -> Vec<u8> {
        self.bytes.truncate(self.len);
        self.bytes
    }
}

impl GrowableSink {
    #[must_use]
    pub fn new() -> Self {
        Self::with_store(Vec::new(), None)
    }

    /// A sink whose buffer may never exceed `ceiling` bytes, terminator
    /// included.
    #[must_use]
    pub fn with_ceiling(ceiling: usize) -> Self {
        Self::with_store(Vec::new(), Some(ceiling))
    }
}

impl Default for GrowableSink {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: GrowStore> GrowableSink<B> {
    /// A sink over `store`, which must be empty.
    pub fn with_store(store: B, ceiling: Option<usize>) -> Self {
        Self {
            buf: store,
            wanted: 0,
            ceiling,
            failed: None,
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.buf.capacity()
    }

    #[must_use]
    pub fn has_failed(&self) -> bool {
        self.failed.is_some()
    }

    fn grow_to(&mut self, need: usize) -> bool {
        let capacity = self.buf.capacity();
        if need <= capacity {
            return true;
        }
        let mut target = need.max(capacity.saturating_mul(2)).max(MIN_GROWTH);
        if let Some(ceiling) = self.ceiling {
            if need > ceiling {
                return false;
            }
            target = target.min(ceiling);
        }
        self.buf.try_grow(target)
    }
}

impl<B: GrowStore> Sink for GrowableSink<B> {
    type Output = GrownBuffer<B>;

    fn push(&mut self, bytes: &[u8]) {
        let need = self.wanted.saturating_add(bytes.len()).saturating_add(1);
        self.wanted = self.wanted.saturating_add(bytes.len());
        if self.failed.is_some() {
            return;
        }
        if self.grow_to(need) {
            self.buf.append(bytes);
        } else {
            self.failed = Some(need);
            self.buf.release();
        }
    }

    fn wanted(&self) -> usize {
        self.wanted
    }

    fn finish(mut self) -> Result<GrownBuffer<B>, FormatError> {
        if let Some(requested) = self.failed {
            RuntimeMetrics::inc(&metrics().alloc_failures);
            return Err(FormatError::AllocationFailed { requested });
        }
        let requested = self.wanted.saturating_add(1);
        if !self.grow_to(requested) {
            self.buf.release();
            RuntimeMetrics::inc(&metrics().alloc_failures);
            return Err(FormatError::AllocationFailed { requested });
        }
        self.buf.append(&[0]);
        debug_assert_eq!(self.buf.filled(), requested);
        Ok(GrownBuffer {
            bytes: self.buf,
            len: self.wanted,
        })
    }
}

// ---------------------------------------------------------------------------
// Vec (renderer tests, Rust callers)
// ---------------------------------------------------------------------------

impl Sink for Vec<u8> {
    type Output = Vec<u8>;

    fn push(&mut self, bytes: &[u8]) {
        self.extend_from_slice(bytes);
    }

    fn wanted(&self) -> usize {
        self.len()
    }

    fn finish(self) -> Result<Vec<u8>, FormatError> {
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbounded_writes_everything() {
        let mut out: Vec<u8> = Vec::new();
        let mut sink = UnboundedSink::new(&mut out);
        sink.push(b"hello ");
        sink.push(b"world");
        let summary = sink.finish().unwrap();
        assert_eq!(summary.wanted, 11);
        assert_eq!(summary.stored, 11);
        assert!(!summary.truncated);
        assert_eq!(out, b"hello world");
    }

    struct CountingChannel {
        out: Vec<u8>,
        writes: usize,
    }

    impl OutputChannel for CountingChannel {
        fn write_bytes(&mut self, bytes: &[u8]) {
            self.out.extend_from_slice(bytes);
            self.writes += 1;
        }
    }

    #[test]
    fn unbounded_batches_small_pushes() {
        let mut sink = UnboundedSink::new(CountingChannel {
            out: Vec::new(),
            writes: 0,
        });
        for _ in 0..100 {
            sink.push(b"ab");
        }
        sink.push_repeat(b' ', 300);
        assert_eq!(sink.wanted(), 500);
        let channel = sink.into_channel();
        assert_eq!(channel.out.len(), 500);
        assert!(channel.out.starts_with(b"abab"));
        assert!(channel.writes <= 500usize.div_ceil(STAGING_BYTES) + 1);
    }

    #[test]
    fn unbounded_large_push_bypasses_stage_in_order() {
        let mut sink = UnboundedSink::new(CountingChannel {
            out: Vec::new(),
            writes: 0,
        });
        sink.push(b"head ");
        sink.push(&[b'x'; STAGING_BYTES * 2]);
        sink.push(b" tail");
        let channel = sink.into_channel();
        assert_eq!(channel.writes, 3);
        assert_eq!(&channel.out[..5], b"head ");
        assert_eq!(&channel.out[channel.out.len() - 5..], b" tail");
    }

    #[test]
    fn unbounded_flush_drains_stage() {
        let mut out: Vec<u8> = Vec::new();
        let mut sink = UnboundedSink::new(&mut out);
        sink.push(b"partial");
        sink.flush();
        drop(sink);
        assert_eq!(out, b"partial");
    }

    #[test]
    fn bounded_truncates_and_terminates() {
        let mut buf = [0xAAu8; 6];
        let mut sink = BoundedSink::new(&mut buf);
        sink.push(b"abc");
        sink.push(b"defgh");
        let summary = sink.finish().unwrap();
        assert_eq!(summary.wanted, 8);
        assert_eq!(summary.stored, 5);
        assert!(summary.truncated);
        assert_eq!(&buf, b"abcde\0");
    }

    #[test]
    fn bounded_short_output_terminates_after_content() {
        let mut buf = [0xAAu8; 8];
        let mut sink = BoundedSink::new(&mut buf);
        sink.push(b"hi");
        let summary = sink.finish().unwrap();
        assert_eq!(summary.wanted, 2);
        assert!(!summary.truncated);
        assert_eq!(&buf[..3], b"hi\0");
        assert_eq!(buf[3], 0xAA);
    }

    #[test]
    fn bounded_zero_capacity_counts_only() {
        let mut buf: [u8; 0] = [];
        let mut sink = BoundedSink::new(&mut buf);
        sink.push(b"abc");
        let summary = sink.finish().unwrap();
        assert_eq!(summary.wanted, 3);
        assert_eq!(summary.stored, 0);
    }

    #[test]
    fn bounded_capacity_one_holds_only_terminator() {
        let mut buf = [0xAAu8; 1];
        let mut sink = BoundedSink::new(&mut buf);
        sink.push(b"xyz");
        assert_eq!(sink.finish().unwrap().stored, 0);
        assert_eq!(buf, [0]);
    }

    #[test]
    fn growable_doubles_from_minimum() {
        let mut sink = GrowableSink::new();
        sink.push(b"a");
        assert!(sink.capacity() >= MIN_GROWTH);
        sink.push(&[b'b'; 40]);
        assert!(sink.capacity() >= 42);
        let out = sink.finish().unwrap();
        assert_eq!(out.len, 41);
        assert_eq!(out.bytes.len(), 42);
        assert_eq!(out.bytes.last(), Some(&0));
        assert_eq!(out.as_bytes()[0], b'a');
    }

    #[test]
    fn growable_failure_releases_and_keeps_counting() {
        let mut sink = GrowableSink::with_ceiling(8);
        sink.push(b"1234");
        sink.push(b"5678");
        assert!(sink.has_failed());
        assert_eq!(sink.capacity(), 0);
        sink.push(b"9");
        assert_eq!(sink.wanted(), 9);
        assert_eq!(
            sink.finish(),
            Err(FormatError::AllocationFailed { requested: 9 })
        );
    }

    #[test]
    fn growable_exact_fit_under_ceiling() {
        let mut sink = GrowableSink::with_ceiling(8);
        sink.push(b"1234567");
        let out = sink.finish().unwrap();
        assert_eq!(out.into_vec(), b"1234567");
    }

    #[test]
    fn empty_growable_output_is_just_terminator() {
        let out = GrowableSink::new().finish().unwrap();
        assert_eq!(out.len, 0);
        assert_eq!(out.bytes, vec![0]);
    }

    /// Store that refuses to grow past a fixed size, recording releases.
    #[derive(Default)]
    struct CappedStore {
        bytes: Vec<u8>,
        cap: usize,
        limit: usize,
        releases: usize,
    }

    impl GrowStore for CappedStore {
        fn filled(&self) -> usize {
            self.bytes.len()
        }

        fn capacity(&self) -> usize {
            self.cap
        }

        fn try_grow(&mut self, capacity: usize) -> bool {
            if capacity > self.limit {
                return false;
            }
            self.cap = self.cap.max(capacity);
            true
        }

        fn append(&mut self, bytes: &[u8]) {
            assert!(self.bytes.len() + bytes.len() <= self.cap);
            self.bytes.extend_from_slice(bytes);
        }

        fn release(&mut self) {
            self.bytes.clear();
            self.cap = 0;
            self.releases += 1;
        }
    }

    #[test]
    fn growable_over_custom_store() {
        let store = CappedStore {
            limit: 64,
            ..CappedStore::default()
        };
        let mut sink = GrowableSink::with_store(store, None);
        sink.push(b"hello");
        assert_eq!(sink.capacity(), MIN_GROWTH);
        sink.push(&[b'.'; 30]);
        assert_eq!(sink.capacity(), 64);
        let out = sink.finish().unwrap();
        assert_eq!(out.len, 35);
        assert_eq!(out.bytes.bytes.len(), 36);
        assert_eq!(out.bytes.bytes.last(), Some(&0));
        assert_eq!(out.bytes.releases, 0);
    }

    #[test]
    fn growable_store_failure_keeps_counting() {
        let store = CappedStore {
            limit: 40,
            ..CappedStore::default()
        };
        let mut sink = GrowableSink::with_store(store, None);
        sink.push(&[b'a'; 20]);
        sink.push(&[b'b'; 30]);
        assert!(sink.has_failed());
        sink.push(b"c");
        assert_eq!(sink.wanted(), 51);
        assert_eq!(
            sink.finish().map(|out| out.len),
            Err(FormatError::AllocationFailed { requested: 51 })
        );
    }

    #[test]
    fn push_repeat_spans_chunks() {
        let mut sink: Vec<u8> = Vec::new();
        sink.push_repeat(b'.', 150);
        assert_eq!(sink.len(), 150);
        assert!(sink.iter().all(|&b| b == b'.'));
    }
}
