//! Byte-range transports.
//!
//! Every reader in this crate pulls bytes through the [`RangeSource`]
//! trait: one operation that returns exactly the requested span of a
//! resource, plus an optional streaming variant for large reads. Local
//! files and HTTP are provided; anything else (object stores, test
//! doubles) just implements the trait.

mod buffered;
mod file;
#[cfg(feature = "network")]
mod http;

pub use buffered::BufferedRangeSource;
pub use file::FileRangeSource;
#[cfg(feature = "network")]
pub use http::HttpRangeSource;

use bytes::Bytes;

use crate::error::Result;

/// A pull stream of byte chunks, as produced by [`RangeSource::stream`].
pub type ByteStream = Box<dyn Iterator<Item = Result<Bytes>> + Send>;

/// Abstract byte-range fetcher.
///
/// `read(offset, Some(size))` yields exactly `size` bytes starting at
/// `offset`; `read(offset, None)` yields everything from `offset` to the
/// end of the resource. A request past the end must fail with
/// [`TrackError::OutOfRange`](crate::TrackError::OutOfRange) so the
/// buffered loader can retry without an upper bound.
pub trait RangeSource: Send {
    /// Fetch one byte range.
    fn read(&mut self, offset: u64, size: Option<u64>) -> Result<Bytes>;

    /// Open a pull stream over a byte range. The default implementation
    /// performs one `read` and yields it as a single chunk; transports
    /// with real streaming (HTTP bodies) override this.
    fn stream(&mut self, offset: u64, size: Option<u64>) -> Result<ByteStream> {
        let bytes = self.read(offset, size)?;
        Ok(Box::new(std::iter::once(Ok(bytes))))
    }
}

impl RangeSource for Box<dyn RangeSource> {
    fn read(&mut self, offset: u64, size: Option<u64>) -> Result<Bytes> {
        (**self).read(offset, size)
    }

    fn stream(&mut self, offset: u64, size: Option<u64>) -> Result<ByteStream> {
        (**self).stream(offset, size)
    }
}
