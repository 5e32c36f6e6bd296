//! Payload source for uploads: in-memory bytes or a file on disk.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
#[cfg(unix)]
use std::os::unix::fs::FileExt;

use crate::error::SteadyError;

/// Payload to upload. Cheap to clone; parts read independent ranges.
#[derive(Debug, Clone)]
pub struct UploadSource {
    inner: Inner,
}

#[derive(Debug, Clone)]
enum Inner {
    Bytes(Arc<[u8]>),
    File {
        file: Arc<File>,
        path: PathBuf,
        len: u64,
    },
}

impl UploadSource {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        let bytes: Vec<u8> = bytes.into();
        Self {
            inner: Inner::Bytes(Arc::from(bytes)),
        }
    }

    /// Open `path` for reading. The length is taken once, at open time.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SteadyError> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        Ok(Self {
            inner: Inner::File {
                file: Arc::new(file),
                path: path.to_path_buf(),
                len,
            },
        })
    }

    /// Total payload size in bytes.
    pub fn len(&self) -> u64 {
        match &self.inner {
            Inner::Bytes(b) => b.len() as u64,
            Inner::File { len, .. } => *len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Path of a file-backed source.
    pub fn path(&self) -> Option<&Path> {
        match &self.inner {
            Inner::Bytes(_) => None,
            Inner::File { path, .. } => Some(path),
        }
    }

    /// Bytes of `[start, end)`. File reads run on the blocking pool.
    pub async fn read_range(&self, start: u64, end: u64) -> Result<Vec<u8>, SteadyError> {
        if start > end || end > self.len() {
            return Err(SteadyError::Validation(format!(
                "range {}..{} outside payload of {} bytes",
                start,
                end,
                self.len()
            )));
        }
        match &self.inner {
            Inner::Bytes(b) => Ok(b[start as usize..end as usize].to_vec()),
            Inner::File { file, .. } => {
                let file = Arc::clone(file);
                tokio::task::spawn_blocking(move || read_at(&file, start, (end - start) as usize))
                    .await
                    .map_err(|e| SteadyError::Source(io::Error::other(e)))?
                    .map_err(SteadyError::from)
            }
        }
    }
}

#[cfg(unix)]
fn read_at(file: &File, offset: u64, len: usize) -> io::Result<Vec<u8>> {
    let mut buf = vec![0u8; len];
    file.read_exact_at(&mut buf, offset)?;
    Ok(buf)
}

/// Seek + read; parts are read one at a time per handle clone.
#[cfg(not(unix))]
fn read_at(file: &File, offset: u64, len: usize) -> io::Result<Vec<u8>> {
    use std::io::{Read, Seek, SeekFrom};
    let mut f = file.try_clone()?;
    f.seek(SeekFrom::Start(offset))?;
    let mut buf = vec![0u8; len];
    f.read_exact(&mut buf)?;
    Ok(buf)
}
