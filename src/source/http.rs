//! HTTP range source (network feature).
//!
//! Fetches byte ranges with HTTP `Range` requests. Fetched spans go into a
//! byte-bounded LRU cache so an index walk that revisits nearby regions
//! does not repeat round trips. Requests are retried with exponential
//! backoff on transport failures.

use bytes::Bytes;
use lru::LruCache;
use reqwest::blocking::Client;
use reqwest::StatusCode;
use std::time::Duration;

use super::RangeSource;
use crate::error::{Result, TrackError};

/// Default cache budget for fetched ranges (16 MB).
pub const DEFAULT_CACHE_SIZE: usize = 16 * 1024 * 1024;

/// Default HTTP timeout (30 seconds).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default number of retry attempts.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Byte-bounded cache over fetched ranges, keyed by `(offset, end)`.
///
/// Tracks actual bytes held rather than entry count and evicts LRU
/// entries when the budget would be exceeded.
struct ByteBoundedCache {
    cache: LruCache<(u64, u64), Bytes>,
    current_size: usize,
    max_size: usize,
}

impl ByteBoundedCache {
    fn new(max_size: usize) -> Self {
        ByteBoundedCache {
            cache: LruCache::unbounded(),
            current_size: 0,
            max_size,
        }
    }

    /// Find a cached span containing `[offset, offset+size)` and slice it.
    fn get(&mut self, offset: u64, size: u64) -> Option<Bytes> {
        let key = self
            .cache
            .iter()
            .find(|((start, end), _)| *start <= offset && offset + size <= *end)
            .map(|(k, _)| *k)?;
        let bytes = self.cache.get(&key)?;
        let from = (offset - key.0) as usize;
        Some(bytes.slice(from..from + size as usize))
    }

    fn put(&mut self, offset: u64, value: Bytes) {
        let value_size = value.len();
        if value_size > self.max_size {
            return;
        }
        while self.current_size + value_size > self.max_size {
            match self.cache.pop_lru() {
                Some((_, old)) => self.current_size -= old.len(),
                None => break,
            }
        }
        self.current_size += value_size;
        self.cache.put((offset, offset + value.len() as u64), value);
    }
}

/// [`RangeSource`] over an HTTP(S) URL supporting `Range` requests.
pub struct HttpRangeSource {
    client: Client,
    url: String,
    cache: ByteBoundedCache,
    max_retries: u32,
}

impl HttpRangeSource {
    /// Create a source for `url` with default timeout, retries and cache.
    pub fn new(url: impl Into<String>) -> Result<Self> {
        Self::with_cache_size(url, DEFAULT_CACHE_SIZE)
    }

    /// Create a source with an explicit cache budget in bytes.
    pub fn with_cache_size(url: impl Into<String>, cache_size: usize) -> Result<Self> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| TrackError::Network(e.to_string()))?;
        Ok(HttpRangeSource {
            client,
            url: url.into(),
            cache: ByteBoundedCache::new(cache_size),
            max_retries: DEFAULT_MAX_RETRIES,
        })
    }

    fn fetch(&self, offset: u64, size: Option<u64>) -> Result<Bytes> {
        let range = match size {
            Some(s) if s > 0 => format!("bytes={}-{}", offset, offset + s - 1),
            Some(_) => return Ok(Bytes::new()),
            None => format!("bytes={}-", offset),
        };

        let mut last_err = None;
        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                std::thread::sleep(Duration::from_millis(100 << attempt));
            }
            let resp = match self
                .client
                .get(&self.url)
                .header(reqwest::header::RANGE, &range)
                .send()
            {
                Ok(r) => r,
                Err(e) => {
                    last_err = Some(TrackError::Network(e.to_string()));
                    continue;
                }
            };

            match resp.status() {
                StatusCode::PARTIAL_CONTENT | StatusCode::OK => {
                    let status = resp.status();
                    let mut body = resp
                        .bytes()
                        .map_err(|e| TrackError::Network(e.to_string()))?;
                    // A 200 ignores the range header and returns the whole
                    // resource; cut it down to the requested span.
                    if status == StatusCode::OK && offset > 0 {
                        if (body.len() as u64) < offset {
                            return Err(TrackError::OutOfRange {
                                offset,
                                requested: size,
                                length: Some(body.len() as u64),
                            });
                        }
                        body = body.slice(offset as usize..);
                    }
                    if let Some(s) = size {
                        if (body.len() as u64) < s {
                            return Err(TrackError::OutOfRange {
                                offset,
                                requested: size,
                                length: Some(offset + body.len() as u64),
                            });
                        }
                    }
                    return Ok(body);
                }
                StatusCode::RANGE_NOT_SATISFIABLE => {
                    return Err(TrackError::OutOfRange {
                        offset,
                        requested: size,
                        length: None,
                    });
                }
                status if status.is_server_error() => {
                    last_err = Some(TrackError::Http {
                        status: status.as_u16(),
                        url: self.url.clone(),
                    });
                    continue;
                }
                status => {
                    return Err(TrackError::Http {
                        status: status.as_u16(),
                        url: self.url.clone(),
                    });
                }
            }
        }
        Err(last_err.unwrap_or_else(|| TrackError::Network("retries exhausted".into())))
    }
}

impl RangeSource for HttpRangeSource {
    fn read(&mut self, offset: u64, size: Option<u64>) -> Result<Bytes> {
        if let Some(s) = size {
            if let Some(hit) = self.cache.get(offset, s) {
                return Ok(hit);
            }
        }
        let body = self.fetch(offset, size)?;
        let out = match size {
            Some(s) => body.slice(..s as usize),
            None => body,
        };
        self.cache.put(offset, out.clone());
        Ok(out)
    }

    fn stream(&mut self, offset: u64, size: Option<u64>) -> Result<super::ByteStream> {
        let range = match size {
            Some(s) if s > 0 => format!("bytes={}-{}", offset, offset + s - 1),
            Some(_) => return Ok(Box::new(std::iter::empty())),
            None => format!("bytes={}-", offset),
        };
        let resp = self
            .client
            .get(&self.url)
            .header(reqwest::header::RANGE, range)
            .send()
            .map_err(|e| TrackError::Network(e.to_string()))?;
        match resp.status() {
            StatusCode::PARTIAL_CONTENT | StatusCode::OK => {}
            StatusCode::RANGE_NOT_SATISFIABLE => {
                return Err(TrackError::OutOfRange {
                    offset,
                    requested: size,
                    length: None,
                })
            }
            status => {
                return Err(TrackError::Http {
                    status: status.as_u16(),
                    url: self.url.clone(),
                })
            }
        }
        Ok(Box::new(BodyChunks { body: resp }))
    }
}

/// Pull-stream over a response body, one 64 KiB chunk at a time.
struct BodyChunks {
    body: reqwest::blocking::Response,
}

impl Iterator for BodyChunks {
    type Item = Result<Bytes>;

    fn next(&mut self) -> Option<Self::Item> {
        use std::io::Read;
        let mut buf = vec![0u8; 64 * 1024];
        match self.body.read(&mut buf) {
            Ok(0) => None,
            Ok(n) => {
                buf.truncate(n);
                Some(Ok(Bytes::from(buf)))
            }
            Err(e) => Some(Err(TrackError::Io(e))),
        }
    }
}
