//! Local-file range source.
//!
//! Small files are served with positioned reads; files at or above
//! [`MMAP_THRESHOLD`] are memory-mapped once and sliced, which wins for
//! the scattered random access an index walk produces.

use bytes::Bytes;
use memmap2::Mmap;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use super::RangeSource;
use crate::error::{Result, TrackError};

/// Memory-map threshold (50 MB). Below this, mapping overhead dominates.
pub const MMAP_THRESHOLD: u64 = 50 * 1024 * 1024;

enum Backing {
    Seek(File),
    Map(Mmap),
}

/// [`RangeSource`] over a local file.
pub struct FileRangeSource {
    backing: Backing,
    length: u64,
}

impl FileRangeSource {
    /// Open a file, choosing positioned reads or mmap by size.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let length = file.metadata()?.len();
        let backing = if length >= MMAP_THRESHOLD {
            // SAFETY: the mapping is read-only and private to this source.
            Backing::Map(unsafe { Mmap::map(&file)? })
        } else {
            Backing::Seek(file)
        };
        Ok(FileRangeSource { backing, length })
    }

    /// Resource length in bytes.
    pub fn len(&self) -> u64 {
        self.length
    }

    /// True when the file is empty.
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    fn check_bounds(&self, offset: u64, size: Option<u64>) -> Result<u64> {
        let end = match size {
            Some(s) => offset.checked_add(s).unwrap_or(u64::MAX),
            None => self.length,
        };
        if offset > self.length || end > self.length {
            return Err(TrackError::OutOfRange {
                offset,
                requested: size,
                length: Some(self.length),
            });
        }
        Ok(end)
    }
}

impl RangeSource for FileRangeSource {
    fn read(&mut self, offset: u64, size: Option<u64>) -> Result<Bytes> {
        let end = self.check_bounds(offset, size)?;
        match &mut self.backing {
            Backing::Map(map) => Ok(Bytes::copy_from_slice(
                &map[offset as usize..end as usize],
            )),
            Backing::Seek(file) => {
                file.seek(SeekFrom::Start(offset))?;
                let mut buf = vec![0u8; (end - offset) as usize];
                file.read_exact(&mut buf)?;
                Ok(Bytes::from(buf))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_exact_and_unbounded_reads() {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(b"0123456789").unwrap();
        let mut src = FileRangeSource::open(f.path()).unwrap();

        assert_eq!(src.len(), 10);
        assert_eq!(&src.read(2, Some(4)).unwrap()[..], b"2345");
        assert_eq!(&src.read(7, None).unwrap()[..], b"789");
    }

    #[test]
    fn test_past_end_is_out_of_range() {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(b"abc").unwrap();
        let mut src = FileRangeSource::open(f.path()).unwrap();

        assert!(src.read(0, Some(4)).unwrap_err().is_out_of_range());
        assert!(src.read(5, None).unwrap_err().is_out_of_range());
        // Reading the empty tail is allowed
        assert_eq!(src.read(3, None).unwrap().len(), 0);
    }
}
