use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use futures::Stream;
use tracing::{debug, error, info, warn};

use crate::core::errors::{GatewayError, GatewayResult};
use crate::core::validation::{join_remote, normalize_remote_path, sanitize_file_name};
use crate::models::artifact::{ArtifactEntry, ArtifactLocation, ListingLine};
use crate::services::staging::{StagedFile, StagingError};
use crate::services::traits::StoreClient;

/// Moves artifacts between callers and the distributed store: staging,
/// relaying, cleanup, plus deletes and listings.
pub struct ArtifactManager {
    store: Arc<dyn StoreClient>,
    staging_dir: PathBuf,
    default_dir: String,
    max_upload_bytes: u64,
}

impl ArtifactManager {
    pub fn new(
        store: Arc<dyn StoreClient>,
        staging_dir: PathBuf,
        default_dir: &str,
        max_upload_bytes: u64,
    ) -> Result<Self, String> {
        let default_dir = normalize_remote_path(default_dir)?;
        Ok(Self {
            store,
            staging_dir,
            default_dir,
            max_upload_bytes,
        })
    }

    pub fn default_dir(&self) -> &str {
        &self.default_dir
    }

    pub fn store_backend(&self) -> &'static str {
        self.store.backend()
    }

    /// `target_dir` is the directory the file lands in; the default directory
    /// is used when it is absent.
    pub fn target_path(&self, file_name: &str, target_dir: Option<&str>) -> GatewayResult<String> {
        let name = sanitize_file_name(file_name)?;
        let dir = match target_dir {
            Some(dir) => normalize_remote_path(dir).map_err(GatewayError::upload_failed)?,
            None => self.default_dir.clone(),
        };
        Ok(join_remote(&dir, &name))
    }

    pub async fn upload<S>(
        &self,
        file_name: &str,
        source: S,
        target_dir: Option<&str>,
    ) -> GatewayResult<ArtifactLocation>
    where
        S: Stream<Item = io::Result<Bytes>> + Send + Unpin,
    {
        let remote_path = self.target_path(file_name, target_dir)?;
        let scratch_name = sanitize_file_name(file_name)?;

        let staged = StagedFile::stage(&self.staging_dir, &scratch_name, source, self.max_upload_bytes)
            .await
            .map_err(|err| match err {
                StagingError::TooLarge { .. } => GatewayError::upload_failed(err.to_string()),
                StagingError::Io(io_err) => {
                    error!("[ARTIFACT] staging {} failed: {}", scratch_name, io_err);
                    GatewayError::upload_failed(format!("could not stage {scratch_name}: {io_err}"))
                }
            })?;

        let staging_path = staged.path().to_path_buf();
        debug!("[ARTIFACT] relaying {} bytes to {}", staged.size_bytes(), remote_path);
        let outcome = self.relay(&staged, &remote_path).await;
        staged.release().await;

        match outcome {
            Ok(location) => {
                info!(
                    "[ARTIFACT] uploaded {} -> {} ({} bytes, backend={})",
                    file_name,
                    location.remote_path,
                    location.size_bytes,
                    self.store.backend()
                );
                Ok(ArtifactLocation {
                    local_staging_path: Some(staging_path),
                    ..location
                })
            }
            Err(err) => {
                warn!("[ARTIFACT] upload of {} to {} failed: {}", file_name, remote_path, err);
                Err(GatewayError::from_remote_upload(err))
            }
        }
    }

    async fn relay(&self, staged: &StagedFile, remote_path: &str) -> GatewayResult<ArtifactLocation> {
        let content = staged.read().await.map_err(|err| {
            GatewayError::upload_failed(format!("could not read staged copy: {err}"))
        })?;
        self.store.upload(remote_path, content).await
    }

    /// Returns the canonical path that was deleted.
    pub async fn remove(&self, path: &str, recursive: bool) -> GatewayResult<String> {
        let path = normalize_remote_path(path).map_err(GatewayError::InvalidRequest)?;
        if path == "/" {
            return Err(GatewayError::InvalidRequest(
                "refusing to delete the store root".to_string(),
            ));
        }
        self.store.delete(&path, recursive).await?;
        info!("[ARTIFACT] removed {} (recursive={})", path, recursive);
        Ok(path)
    }

    /// Lists `path` (or the default directory) and returns it in canonical
    /// form next to its entries.
    pub async fn status(&self, path: Option<&str>) -> GatewayResult<(String, Vec<ArtifactEntry>)> {
        let path = match path {
            Some(p) => normalize_remote_path(p).map_err(GatewayError::InvalidRequest)?,
            None => self.default_dir.clone(),
        };
        let lines = self.store.list(&path).await?;
        let entries = lines.into_iter().filter_map(ListingLine::into_entry).collect();
        Ok((path, entries))
    }
}
