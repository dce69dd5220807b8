//! Read-ahead buffering over a [`RangeSource`].
//!
//! Index walks issue many small reads clustered around the same file
//! region. [`BufferedRangeSource`] turns each cache miss into one
//! `capacity`-sized fetch and serves subsequent hits from memory. A miss
//! near the end of the resource would over-request, so an out-of-range
//! response is retried exactly once without an upper bound; every other
//! error surfaces unchanged.
//!
//! In streaming mode the wrapper instead keeps one open byte stream:
//! a read that cannot be satisfied from buffered bytes discards the
//! stream, opens a new one at the requested offset, and appends arriving
//! chunks until the required end is covered. After delivering, the
//! buffer's head is trimmed so only the undelivered tail is retained.

use bytes::Bytes;

use super::{ByteStream, RangeSource};
use crate::error::{Result, TrackError};

/// Default read-ahead window (512 KiB).
pub const DEFAULT_BUFFER_SIZE: u64 = 512 * 1024;

/// Buffered wrapper over a [`RangeSource`].
pub struct BufferedRangeSource {
    inner: Box<dyn RangeSource>,
    capacity: u64,
    buf: Vec<u8>,
    buf_start: u64,
    streaming: bool,
    stream: Option<ByteStream>,
}

impl BufferedRangeSource {
    /// Wrap `inner` with the default window size.
    pub fn new(inner: impl RangeSource + 'static) -> Self {
        Self::with_capacity(inner, DEFAULT_BUFFER_SIZE)
    }

    /// Wrap `inner` with an explicit window size.
    pub fn with_capacity(inner: impl RangeSource + 'static, capacity: u64) -> Self {
        BufferedRangeSource {
            inner: Box::new(inner),
            capacity: capacity.max(1),
            buf: Vec::new(),
            buf_start: 0,
            streaming: false,
            stream: None,
        }
    }

    /// Wrap `inner` in streaming mode: reads are resolved as bytes arrive
    /// on a single underlying stream instead of independent range fetches.
    /// Suited to forward scans over large spans.
    pub fn streaming(inner: impl RangeSource + 'static, capacity: u64) -> Self {
        let mut s = Self::with_capacity(inner, capacity);
        s.streaming = true;
        s
    }

    fn buf_end(&self) -> u64 {
        self.buf_start + self.buf.len() as u64
    }

    fn hit(&self, offset: u64, size: u64) -> bool {
        offset >= self.buf_start && offset + size <= self.buf_end()
    }

    fn slice(&self, offset: u64, size: u64) -> Bytes {
        let from = (offset - self.buf_start) as usize;
        Bytes::copy_from_slice(&self.buf[from..from + size as usize])
    }

    fn fill(&mut self, offset: u64, size: u64) -> Result<()> {
        let want = size.max(self.capacity);
        let bytes = match self.inner.read(offset, Some(want)) {
            Ok(b) => b,
            // The window ran past the end of the resource; ask again for
            // whatever tail exists.
            Err(e) if e.is_out_of_range() => self.inner.read(offset, None)?,
            Err(e) => return Err(e),
        };
        self.buf_start = offset;
        self.buf = bytes.to_vec();
        Ok(())
    }

    fn read_buffered(&mut self, offset: u64, size: u64) -> Result<Bytes> {
        if !self.hit(offset, size) {
            self.fill(offset, size)?;
            if (self.buf.len() as u64) < size {
                return Err(TrackError::OutOfRange {
                    offset,
                    requested: Some(size),
                    length: Some(self.buf_end()),
                });
            }
        }
        Ok(self.slice(offset, size))
    }

    fn read_streamed(&mut self, offset: u64, size: u64) -> Result<Bytes> {
        if !self.hit(offset, size) {
            if offset < self.buf_start || offset > self.buf_end() || self.stream.is_none() {
                // Re-seek: dispose the active stream and start at offset.
                self.stream = Some(self.inner.stream(offset, None)?);
                self.buf_start = offset;
                self.buf.clear();
            }
            let required_end = offset + size;
            while self.buf_end() < required_end {
                match self.stream.as_mut().and_then(|s| s.next()) {
                    Some(Ok(chunk)) => self.buf.extend_from_slice(&chunk),
                    Some(Err(e)) => return Err(e),
                    None => {
                        return Err(TrackError::Io(std::io::Error::new(
                            std::io::ErrorKind::UnexpectedEof,
                            format!(
                                "stream ended at {} before required end {}",
                                self.buf_end(),
                                required_end
                            ),
                        )))
                    }
                }
            }
        }
        let out = self.slice(offset, size);
        // Keep only the tail beyond what was just delivered.
        let consumed = (offset + size - self.buf_start) as usize;
        self.buf.drain(..consumed);
        self.buf_start = offset + size;
        Ok(out)
    }
}

impl RangeSource for BufferedRangeSource {
    fn read(&mut self, offset: u64, size: Option<u64>) -> Result<Bytes> {
        match size {
            // Unbounded tails bypass the window.
            None => self.inner.read(offset, None),
            Some(0) => Ok(Bytes::new()),
            Some(size) if self.streaming => self.read_streamed(offset, size),
            Some(size) => self.read_buffered(offset, size),
        }
    }

    fn stream(&mut self, offset: u64, size: Option<u64>) -> Result<ByteStream> {
        self.inner.stream(offset, size)
    }
}
