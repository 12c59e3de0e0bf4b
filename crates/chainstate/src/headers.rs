//! Flat file of 80-byte headers; height `h` lives at byte `h * 80`.

use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use sqlchain_primitives::{BlockHeader, HEADER_LEN};

pub const HEADER_FILE_NAME: &str = "hdrs.dat";
/// Headers per retarget window.
pub const CHUNK_HEADERS: u32 = 2016;
pub const CHUNK_LEN: usize = HEADER_LEN * CHUNK_HEADERS as usize;

#[derive(Debug)]
pub enum HeaderError {
    Io(std::io::Error),
    TruncatedHeaderStore { height: u32, wanted: usize, got: usize },
    TruncatedChunk { index: u32, wanted: usize, got: usize },
}

impl std::fmt::Display for HeaderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HeaderError::Io(err) => write!(f, "{err}"),
            HeaderError::TruncatedHeaderStore {
                height,
                wanted,
                got,
            } => write!(
                f,
                "header store truncated at height {height}: wanted {wanted} bytes, got {got}"
            ),
            HeaderError::TruncatedChunk { index, wanted, got } => write!(
                f,
                "header store truncated in chunk {index}: wanted {wanted} bytes, got {got}"
            ),
        }
    }
}

impl std::error::Error for HeaderError {}

impl From<std::io::Error> for HeaderError {
    fn from(err: std::io::Error) -> Self {
        HeaderError::Io(err)
    }
}

pub struct HeaderStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl HeaderStore {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, HeaderError> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let path = dir.join(HEADER_FILE_NAME);
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;
        let store = Self {
            path,
            write_lock: Mutex::new(()),
        };
        match store.tip_height()? {
            Some(tip) => sqlchain_log::log_info!(
                "header store {} opened at height {tip}",
                store.path.display()
            ),
            None => sqlchain_log::log_info!("header store {} opened empty", store.path.display()),
        }
        Ok(store)
    }

    /// Writes (or overwrites) the header at `height`.
    pub fn put_header(&self, height: u32, raw: &[u8; HEADER_LEN]) -> Result<(), HeaderError> {
        let _guard = self.write_lock.lock().expect("header store lock");
        let mut file = OpenOptions::new().write(true).open(&self.path)?;
        file.seek(SeekFrom::Start(u64::from(height) * HEADER_LEN as u64))?;
        file.write_all(raw)?;
        file.flush()?;
        Ok(())
    }

    pub fn get_header(&self, height: u32) -> Result<[u8; HEADER_LEN], HeaderError> {
        let mut raw = [0u8; HEADER_LEN];
        let got = self.read_at(u64::from(height) * HEADER_LEN as u64, &mut raw)?;
        if got < HEADER_LEN {
            return Err(HeaderError::TruncatedHeaderStore {
                height,
                wanted: HEADER_LEN,
                got,
            });
        }
        Ok(raw)
    }

    pub fn get_header_fields(&self, height: u32) -> Result<BlockHeader, HeaderError> {
        Ok(BlockHeader::decode(&self.get_header(height)?))
    }

    pub fn get_difficulty(&self, height: u32) -> Result<f64, HeaderError> {
        Ok(self.get_header_fields(height)?.difficulty())
    }

    /// The 2016 headers of retarget window `index`, concatenated.
    pub fn get_chunk(&self, index: u32) -> Result<Vec<u8>, HeaderError> {
        let mut out = vec![0u8; CHUNK_LEN];
        let got = self.read_at(u64::from(index) * CHUNK_LEN as u64, &mut out)?;
        if got < CHUNK_LEN {
            return Err(HeaderError::TruncatedChunk {
                index,
                wanted: CHUNK_LEN,
                got,
            });
        }
        Ok(out)
    }

    /// Highest height with a complete record.
    pub fn tip_height(&self) -> Result<Option<u32>, HeaderError> {
        let records = std::fs::metadata(&self.path)?.len() / HEADER_LEN as u64;
        Ok(records
            .checked_sub(1)
            .map(|tip| u32::try_from(tip).unwrap_or(u32::MAX)))
    }

    /// Fills as much of `buf` as the file holds from `offset`.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize, HeaderError> {
        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(offset))?;
        let mut got = 0;
        while got < buf.len() {
            match file.read(&mut buf[got..]) {
                Ok(0) => break,
                Ok(read) => got += read,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(err.into()),
            }
        }
        Ok(got)
    }
}
