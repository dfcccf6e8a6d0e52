use std::io;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use futures::Stream;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::io::StreamReader;
use tracing::{debug, warn};
use uuid::Uuid;

/// A scratch copy of an upload, owned by exactly one operation. The file is
/// removed by [`StagedFile::release`]; if the owner is dropped first (panic,
/// cancelled request), `Drop` removes it instead.
#[derive(Debug)]
pub struct StagedFile {
    path: PathBuf,
    size_bytes: u64,
    released: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum StagingError {
    #[error("upload exceeds the {limit} byte limit")]
    TooLarge { limit: u64 },
    #[error("staging io error: {0}")]
    Io(#[from] io::Error),
}

impl StagedFile {
    /// Streams `source` into a fresh file under `dir` named
    /// `{uuid}-{file_name}`. On failure nothing is left behind.
    pub async fn stage<S>(dir: &Path, file_name: &str, source: S, max_bytes: u64) -> Result<Self, StagingError>
    where
        S: Stream<Item = io::Result<Bytes>> + Send + Unpin,
    {
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(format!("{}-{}", Uuid::new_v4(), file_name));

        // Owned from the start so every early return below cleans up.
        let mut staged = StagedFile {
            path,
            size_bytes: 0,
            released: false,
        };

        let mut file = tokio::fs::File::create(&staged.path).await?;
        let mut reader = StreamReader::new(source);
        let mut buf = vec![0u8; 64 * 1024];
        loop {
            let read = reader.read(&mut buf).await?;
            if read == 0 {
                break;
            }
            staged.size_bytes += read as u64;
            if staged.size_bytes > max_bytes {
                drop(file);
                staged.release().await;
                return Err(StagingError::TooLarge { limit: max_bytes });
            }
            file.write_all(&buf[..read]).await?;
        }
        file.flush().await?;
        file.sync_all().await?;

        debug!("[ARTIFACT] staged {} ({} bytes)", staged.path.display(), staged.size_bytes);
        Ok(staged)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    pub async fn read(&self) -> io::Result<Bytes> {
        tokio::fs::read(&self.path).await.map(Bytes::from)
    }

    pub async fn release(mut self) {
        self.released = true;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => debug!("[ARTIFACT] released {}", self.path.display()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => warn!("[ARTIFACT] failed to remove {}: {}", self.path.display(), err),
        }
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(err) = std::fs::remove_file(&self.path) {
            if err.kind() != io::ErrorKind::NotFound {
                warn!("[ARTIFACT] failed to remove {} on drop: {}", self.path.display(), err);
            }
        }
    }
}
