//! Windowed reads from a local media file.
//!
//! The reader hands the session driver one chunk at a time; a buffer lives
//! only until its part is acknowledged, so at most one chunk is resident.

use bytes::{Bytes, BytesMut};
use std::io::{self, SeekFrom};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

#[derive(Debug, Error)]
pub enum ChunkReadError {
    #[error("file `{path}` unreadable: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("offset {offset} is beyond end of `{path}` ({size_bytes} bytes)")]
    OffsetBeyondEof {
        path: PathBuf,
        offset: u64,
        size_bytes: u64,
    },
    #[error("file `{path}` is {actual} bytes on disk, {declared} were declared")]
    SizeMismatch {
        path: PathBuf,
        actual: u64,
        declared: u64,
    },
}

pub type ChunkReadResult<T> = Result<T, ChunkReadError>;

/// Reads fixed-size byte windows from one local file.
#[derive(Debug)]
pub struct ChunkReader {
    file: File,
    path: PathBuf,
    size_bytes: u64,
}

impl ChunkReader {
    /// Open the file and capture its on-disk size.
    pub async fn open(path: impl AsRef<Path>) -> ChunkReadResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).await.map_err(|source| ChunkReadError::Io {
            path: path.clone(),
            source,
        })?;
        let metadata = file.metadata().await.map_err(|source| ChunkReadError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(Self {
            file,
            path,
            size_bytes: metadata.len(),
        })
    }

    /// Size of the file as observed at open time.
    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// Check the on-disk size against the size declared at selection time.
    ///
    /// A mismatch means the file changed between selection and upload and
    /// the part layout computed from the declared size would be wrong.
    pub fn verify_declared_size(&self, declared: u64) -> ChunkReadResult<()> {
        if self.size_bytes != declared {
            return Err(ChunkReadError::SizeMismatch {
                path: self.path.clone(),
                actual: self.size_bytes,
                declared,
            });
        }
        Ok(())
    }

    /// Read exactly `min(requested_len, size - offset)` bytes at `offset`.
    ///
    /// The returned buffer's length is the actual read length, so a caller
    /// sees end-of-file explicitly rather than as a silent short read.
    pub async fn read_chunk(&mut self, offset: u64, requested_len: u64) -> ChunkReadResult<Bytes> {
        if offset >= self.size_bytes {
            return Err(ChunkReadError::OffsetBeyondEof {
                path: self.path.clone(),
                offset,
                size_bytes: self.size_bytes,
            });
        }

        let len = requested_len.min(self.size_bytes - offset) as usize;
        let mut buf = BytesMut::zeroed(len);

        self.file
            .seek(SeekFrom::Start(offset))
            .await
            .map_err(|source| ChunkReadError::Io {
                path: self.path.clone(),
                source,
            })?;
        self.file
            .read_exact(&mut buf)
            .await
            .map_err(|source| ChunkReadError::Io {
                path: self.path.clone(),
                source,
            })?;

        Ok(buf.freeze())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn fixture(content: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        file.write_all(content).expect("write fixture");
        file
    }

    #[tokio::test]
    async fn reads_exact_window() {
        let file = fixture(b"abcdefghij");
        let mut reader = ChunkReader::open(file.path()).await.unwrap();
        assert_eq!(reader.size_bytes(), 10);

        let chunk = reader.read_chunk(2, 4).await.unwrap();
        assert_eq!(&chunk[..], b"cdef");
    }

    #[tokio::test]
    async fn clamps_final_window_to_eof() {
        let file = fixture(b"abcdefghij");
        let mut reader = ChunkReader::open(file.path()).await.unwrap();

        let chunk = reader.read_chunk(8, 4).await.unwrap();
        assert_eq!(&chunk[..], b"ij");
        assert_eq!(chunk.len(), 2);
    }

    #[tokio::test]
    async fn rejects_offset_beyond_eof() {
        let file = fixture(b"abc");
        let mut reader = ChunkReader::open(file.path()).await.unwrap();

        let err = reader.read_chunk(3, 1).await.unwrap_err();
        assert!(matches!(err, ChunkReadError::OffsetBeyondEof { offset: 3, .. }));
    }

    #[tokio::test]
    async fn open_fails_for_missing_file() {
        let err = ChunkReader::open("/no/such/file.bin").await.unwrap_err();
        assert!(matches!(err, ChunkReadError::Io { .. }));
    }

    #[tokio::test]
    async fn detects_declared_size_drift() {
        let file = fixture(b"abcdef");
        let reader = ChunkReader::open(file.path()).await.unwrap();

        assert!(reader.verify_declared_size(6).is_ok());
        let err = reader.verify_declared_size(7).unwrap_err();
        assert!(matches!(
            err,
            ChunkReadError::SizeMismatch {
                actual: 6,
                declared: 7,
                ..
            }
        ));
    }
}
