//! Append-only byte arena addressed by global offset.
//!
//! The arena is either one `blobs.dat` or, once split, a run of
//! `blobs.<n>.dat` files where file `n` holds exactly the global range
//! `[n * split_size, (n + 1) * split_size)`. Lengths are never stored; callers
//! keep them next to the offsets they were handed.

use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::remote::{HttpPageSource, PageSource, RemoteError, RemotePages, DEFAULT_CACHE_PAGES};

pub const DEFAULT_SPLIT_SIZE: u64 = 5_000_000_000;
pub const UNSPLIT_FILE_NAME: &str = "blobs.dat";

#[derive(Debug)]
pub enum BlobError {
    Io(std::io::Error),
    BlobMissing { offset: u64, length: usize },
    Remote(RemoteError),
}

impl std::fmt::Display for BlobError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BlobError::Io(err) => write!(f, "{err}"),
            BlobError::BlobMissing { offset, length } => write!(
                f,
                "blob at offset {offset} ({length} bytes) is not available locally or remotely"
            ),
            BlobError::Remote(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for BlobError {}

impl From<std::io::Error> for BlobError {
    fn from(err: std::io::Error) -> Self {
        BlobError::Io(err)
    }
}

impl From<RemoteError> for BlobError {
    fn from(err: RemoteError) -> Self {
        BlobError::Remote(err)
    }
}

/// What a read returns when neither the local files nor the remote hold the
/// requested range.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum MissingBlobPolicy {
    #[default]
    Error,
    /// Tombstone mode for stores migrated without their oldest blobs: the
    /// read succeeds with zeros and a warning is logged.
    ZeroFill,
}

impl MissingBlobPolicy {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "error" => Some(Self::Error),
            "zerofill" | "zero-fill" | "zero" => Some(Self::ZeroFill),
            _ => None,
        }
    }
}

/// One physical file of the arena.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum BlobFile {
    Unsplit,
    Split(u32),
}

impl BlobFile {
    pub fn file_name(self) -> String {
        match self {
            BlobFile::Unsplit => UNSPLIT_FILE_NAME.to_string(),
            BlobFile::Split(index) => format!("blobs.{index}.dat"),
        }
    }

    fn parse_split(name: &str) -> Option<u32> {
        name.strip_prefix("blobs.")?
            .strip_suffix(".dat")?
            .parse()
            .ok()
    }
}

#[derive(Clone, Debug)]
pub struct BlobStoreConfig {
    pub dir: PathBuf,
    /// Used only when the directory holds no blob files yet.
    pub split: bool,
    pub split_size: u64,
    pub remote: Option<String>,
    pub cache_pages: usize,
    pub missing: MissingBlobPolicy,
}

impl BlobStoreConfig {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            split: false,
            split_size: DEFAULT_SPLIT_SIZE,
            remote: None,
            cache_pages: DEFAULT_CACHE_PAGES,
            missing: MissingBlobPolicy::Error,
        }
    }
}

pub struct BlobStore {
    dir: PathBuf,
    split: bool,
    split_size: u64,
    missing: MissingBlobPolicy,
    remote: Option<RemotePages>,
    end: Mutex<u64>,
}

impl BlobStore {
    pub fn open(config: BlobStoreConfig) -> Result<Self, BlobError> {
        let source = config
            .remote
            .as_ref()
            .map(|url| Box::new(HttpPageSource::new(url.clone())) as Box<dyn PageSource>);
        Self::open_with_source(config, source)
    }

    pub fn open_with_source(
        config: BlobStoreConfig,
        source: Option<Box<dyn PageSource>>,
    ) -> Result<Self, BlobError> {
        if config.split_size == 0 {
            return Err(BlobError::Io(std::io::Error::new(
                ErrorKind::InvalidInput,
                "blob split size must be non-zero",
            )));
        }
        std::fs::create_dir_all(&config.dir)?;
        let (split, end) = Self::scan(&config.dir, config.split, config.split_size)?;
        sqlchain_log::log_info!(
            "blob store {} opened ({}, end offset {end}, remote {})",
            config.dir.display(),
            if split { "split" } else { "unsplit" },
            config.remote.as_deref().unwrap_or("none"),
        );
        Ok(Self {
            dir: config.dir,
            split,
            split_size: config.split_size,
            missing: config.missing,
            remote: source.map(|source| RemotePages::new(source, config.cache_pages)),
            end: Mutex::new(end),
        })
    }

    /// An unsplit file always wins; otherwise the highest numbered file fixes
    /// the append position.
    fn scan(dir: &Path, split_default: bool, split_size: u64) -> Result<(bool, u64), BlobError> {
        let unsplit = dir.join(UNSPLIT_FILE_NAME);
        if unsplit.exists() {
            return Ok((false, std::fs::metadata(&unsplit)?.len()));
        }
        let mut highest: Option<u32> = None;
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let Some(index) = entry.file_name().to_str().and_then(BlobFile::parse_split) else {
                continue;
            };
            highest = highest.max(Some(index));
        }
        match highest {
            Some(index) => {
                let len = std::fs::metadata(dir.join(BlobFile::Split(index).file_name()))?.len();
                Ok((true, u64::from(index) * split_size + len))
            }
            None => Ok((split_default, 0)),
        }
    }

    pub fn is_split(&self) -> bool {
        self.split
    }

    pub fn split_size(&self) -> u64 {
        self.split_size
    }

    /// Offset the next non-empty append will return.
    pub fn end_offset(&self) -> u64 {
        *self.end.lock().expect("blob store lock")
    }

    pub fn file_name_for(&self, index: u32) -> String {
        if self.split {
            BlobFile::Split(index).file_name()
        } else {
            BlobFile::Unsplit.file_name()
        }
    }

    /// Appends `bytes` and returns the global offset they start at. An empty
    /// payload is not stored and yields offset 0.
    pub fn append(&self, bytes: &[u8]) -> Result<u64, BlobError> {
        if bytes.is_empty() {
            return Ok(0);
        }
        let mut end = self.end.lock().expect("blob store lock");
        let offset = *end;
        for (file, local, range) in self.segments(offset, bytes.len()) {
            let mut handle = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(false)
                .open(self.dir.join(file.file_name()))?;
            handle.seek(SeekFrom::Start(local))?;
            handle.write_all(&bytes[range])?;
            handle.flush()?;
        }
        *end = offset + bytes.len() as u64;
        Ok(offset)
    }

    /// Reads `length` bytes at global `offset`, trying the local files, then
    /// the remote, then the missing-data policy.
    pub fn read(&self, offset: u64, length: usize) -> Result<Vec<u8>, BlobError> {
        if length == 0 {
            return Ok(Vec::new());
        }
        let mut out = vec![0u8; length];
        for (file, local, range) in self.read_segments(offset, length) {
            let chunk = &mut out[range];
            if self.read_local(file, local, chunk)? {
                continue;
            }
            if self.read_remote(file, local, chunk)? {
                continue;
            }
            return self.missing(offset, length);
        }
        Ok(out)
    }

    fn missing(&self, offset: u64, length: usize) -> Result<Vec<u8>, BlobError> {
        match self.missing {
            MissingBlobPolicy::Error => Err(BlobError::BlobMissing { offset, length }),
            MissingBlobPolicy::ZeroFill => {
                sqlchain_log::log_warn!(
                    "blob at offset {offset} ({length} bytes) missing; returning zeros"
                );
                Ok(vec![0u8; length])
            }
        }
    }

    fn read_local(&self, file: BlobFile, local: u64, buf: &mut [u8]) -> Result<bool, BlobError> {
        let mut handle = match File::open(self.dir.join(file.file_name())) {
            Ok(handle) => handle,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(false),
            Err(err) => return Err(err.into()),
        };
        handle.seek(SeekFrom::Start(local))?;
        match handle.read_exact(buf) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == ErrorKind::UnexpectedEof => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    fn read_remote(&self, file: BlobFile, local: u64, buf: &mut [u8]) -> Result<bool, BlobError> {
        let Some(remote) = &self.remote else {
            return Ok(false);
        };
        sqlchain_log::log_debug!(
            "blob {} offset {local} not local; fetching {} bytes remotely",
            file.file_name(),
            buf.len()
        );
        match remote.read(file, local, buf.len() as u64)? {
            Some(bytes) => {
                buf.copy_from_slice(&bytes);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Segments for a read: a present unsplit file is tried first regardless
    /// of the split mode.
    fn read_segments(&self, offset: u64, length: usize) -> Vec<(BlobFile, u64, std::ops::Range<usize>)> {
        if self.split && !self.dir.join(UNSPLIT_FILE_NAME).exists() {
            self.segments(offset, length)
        } else {
            vec![(BlobFile::Unsplit, offset, 0..length)]
        }
    }

    /// Physical pieces of the global range `[offset, offset + length)`, each
    /// as (file, file-local offset, range within the caller's buffer).
    fn segments(&self, offset: u64, length: usize) -> Vec<(BlobFile, u64, std::ops::Range<usize>)> {
        if !self.split {
            return vec![(BlobFile::Unsplit, offset, 0..length)];
        }
        let mut out = Vec::new();
        let mut pos = offset;
        let mut done = 0usize;
        while done < length {
            let index = (pos / self.split_size) as u32;
            let local = pos % self.split_size;
            let room = self.split_size - local;
            let take = (length - done).min(usize::try_from(room).unwrap_or(usize::MAX));
            out.push((BlobFile::Split(index), local, done..done + take));
            done += take;
            pos += take as u64;
        }
        out
    }
}
