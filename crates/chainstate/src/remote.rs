//! Ranged HTTP fallback for blob files that are no longer kept locally.

use std::io::Read;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use lru::LruCache;

use crate::blobs::BlobFile;

pub const PAGE_SIZE: u64 = 4096;
pub const DEFAULT_CACHE_PAGES: usize = 1024;
const HTTP_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    Http(String),
    Status(i32),
}

impl std::fmt::Display for RemoteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RemoteError::Http(message) => write!(f, "remote fetch failed: {message}"),
            RemoteError::Status(code) => write!(f, "remote fetch returned HTTP {code}"),
        }
    }
}

impl std::error::Error for RemoteError {}

/// Source of byte ranges of remote blob files.
pub trait PageSource: Send + Sync {
    /// Returns up to `len` bytes of `file_name` starting at `start`; fewer
    /// when the file ends inside the range. `Ok(None)` means the remote does
    /// not hold that range at all.
    fn fetch_range(
        &self,
        file_name: &str,
        start: u64,
        len: u64,
    ) -> Result<Option<Vec<u8>>, RemoteError>;
}

pub struct HttpPageSource {
    base_url: String,
    timeout_secs: u64,
}

impl HttpPageSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout_secs: HTTP_TIMEOUT_SECS,
        }
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}

impl PageSource for HttpPageSource {
    fn fetch_range(
        &self,
        file_name: &str,
        start: u64,
        len: u64,
    ) -> Result<Option<Vec<u8>>, RemoteError> {
        if len == 0 {
            return Ok(Some(Vec::new()));
        }
        let url = format!("{}/{file_name}", self.base_url);
        let end = start + len - 1;
        let response = minreq::get(&url)
            .with_header("Range", format!("bytes={start}-{end}"))
            .with_timeout(self.timeout_secs)
            .send_lazy()
            .map_err(|err| RemoteError::Http(format!("{url} ({err})")))?;
        if !range_has_body(response.status_code, start)? {
            return Ok(None);
        }
        // a 200 at offset zero may carry the whole object; keep only the range
        let mut body = Vec::with_capacity(len as usize);
        Read::take(response, len)
            .read_to_end(&mut body)
            .map_err(|err| RemoteError::Http(format!("{url} ({err})")))?;
        Ok(Some(body))
    }
}

/// Whether the reply body holds the range starting at `start`. A 200 means
/// the server ignored `Range`, which is only usable from the start of the file.
fn range_has_body(status: i32, start: u64) -> Result<bool, RemoteError> {
    match status {
        206 => Ok(true),
        200 if start == 0 => Ok(true),
        404 | 416 => Ok(false),
        code => Err(RemoteError::Status(code)),
    }
}

type PageKey = (BlobFile, u64);

/// Page-granular reader over a [`PageSource`] with a bounded LRU of pages.
pub struct RemotePages {
    source: Box<dyn PageSource>,
    cache: Mutex<LruCache<PageKey, Arc<Vec<u8>>>>,
}

impl RemotePages {
    pub fn new(source: Box<dyn PageSource>, cache_pages: usize) -> Self {
        let capacity = NonZeroUsize::new(cache_pages).unwrap_or(NonZeroUsize::MIN);
        Self {
            source,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Reads `len` bytes at file-local `offset`, or `None` if the remote copy
    /// does not cover the whole range.
    pub fn read(&self, file: BlobFile, offset: u64, len: u64) -> Result<Option<Vec<u8>>, RemoteError> {
        if len == 0 {
            return Ok(Some(Vec::new()));
        }
        let end = offset + len;
        let mut out = Vec::with_capacity(len as usize);
        for page in offset / PAGE_SIZE..=(end - 1) / PAGE_SIZE {
            let Some(bytes) = self.page(file, page)? else {
                return Ok(None);
            };
            let page_start = page * PAGE_SIZE;
            let from = offset.saturating_sub(page_start) as usize;
            let to = ((end - page_start).min(PAGE_SIZE)) as usize;
            if bytes.len() < to {
                return Ok(None);
            }
            out.extend_from_slice(&bytes[from..to]);
        }
        Ok(Some(out))
    }

    pub fn cached_pages(&self) -> usize {
        self.cache.lock().expect("remote page cache").len()
    }

    fn page(&self, file: BlobFile, page: u64) -> Result<Option<Arc<Vec<u8>>>, RemoteError> {
        if let Some(hit) = self.cache.lock().expect("remote page cache").get(&(file, page)) {
            return Ok(Some(Arc::clone(hit)));
        }
        let fetched = self
            .source
            .fetch_range(&file.file_name(), page * PAGE_SIZE, PAGE_SIZE)?;
        let Some(bytes) = fetched else {
            return Ok(None);
        };
        let bytes = Arc::new(bytes);
        // a short page is the current end of the remote file, which may grow
        if bytes.len() as u64 == PAGE_SIZE {
            self.cache
                .lock()
                .expect("remote page cache")
                .put((file, page), Arc::clone(&bytes));
        }
        Ok(Some(bytes))
    }
}
