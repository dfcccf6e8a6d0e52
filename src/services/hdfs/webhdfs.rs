use std::time::Duration;

use bytes::Bytes;
use reqwest::header::{CONTENT_TYPE, LOCATION};
use reqwest::{Method, RequestBuilder};
use serde::Deserialize;
use tracing::{debug, info, warn};
use url::Url;

use crate::core::errors::{GatewayError, GatewayResult};
use crate::core::validation::join_remote;
use crate::models::artifact::{ArtifactEntry, ArtifactLocation, EntryKind, ListingLine};
use crate::models::remote::RemoteOperationResult;
use crate::services::traits::{RemoteFuture, StoreClient};

/// Talks to the NameNode's WebHDFS REST API. Writes follow the two-step
/// protocol: the NameNode answers `CREATE` with a redirect to a DataNode, and
/// the bytes are sent there.
#[derive(Clone)]
pub struct WebHdfsClient {
    client: reqwest::Client,
    api_url: Url,
    user: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListStatusResponse {
    file_statuses: FileStatuses,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct FileStatuses {
    #[serde(default)]
    file_status: Vec<FileStatus>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileStatus {
    #[serde(default)]
    path_suffix: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    length: u64,
    owner: Option<String>,
    group: Option<String>,
    permission: Option<String>,
    replication: Option<u32>,
    modification_time: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct BooleanResponse {
    boolean: bool,
}

impl WebHdfsClient {
    pub fn new(api_url: &str, user: &str, timeout: Duration) -> Result<Self, String> {
        let api_url = Url::parse(api_url).map_err(|e| format!("invalid HDFS_API_URL {api_url:?}: {e}"))?;
        if api_url.cannot_be_a_base() {
            return Err(format!("HDFS_API_URL cannot be used as a base: {api_url}"));
        }
        // Redirects are handled by hand: the CREATE redirect must not be
        // followed with an empty body.
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| format!("build http client failed: {e}"))?;
        Ok(Self {
            client,
            api_url,
            user: user.to_string(),
        })
    }

    fn op_url(&self, path: &str, op: &str, extra: &[(&str, &str)]) -> GatewayResult<Url> {
        let mut url = self.api_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                GatewayError::Unexpected(format!("HDFS base url cannot carry a path: {}", self.api_url))
            })?;
            segments.pop_if_empty();
            let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
            if parts.is_empty() {
                segments.push("");
            } else {
                segments.extend(parts);
            }
        }
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("op", op).append_pair("user.name", &self.user);
            for (key, value) in extra {
                query.append_pair(key, value);
            }
        }
        Ok(url)
    }

    async fn exchange(&self, request: RequestBuilder, what: &str) -> GatewayResult<RemoteOperationResult> {
        let response = request.send().await.map_err(|err| {
            warn!("[HDFS] {} transport failure: {}", what, err);
            GatewayError::from(err)
        })?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(GatewayError::from)?;
        Ok(RemoteOperationResult::from_http(status, body))
    }

    async fn create(&self, path: &str, content: Bytes) -> GatewayResult<ArtifactLocation> {
        let create_url = self.op_url(path, "CREATE", &[("overwrite", "true")])?;
        debug!("[HDFS] negotiate create: path={}", path);

        let response = self
            .client
            .request(Method::PUT, create_url)
            .send()
            .await
            .map_err(|err| {
                GatewayError::RemoteUnavailable(format!("create negotiation for {path} failed: {err}"))
            })?;
        let status = response.status().as_u16();
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());
        let body = response.text().await.map_err(|err| {
            GatewayError::RemoteUnavailable(format!("reading create negotiation for {path} failed: {err}"))
        })?;
        let negotiated = RemoteOperationResult::from_http(status, body);

        if !negotiated.success {
            return Err(GatewayError::RemoteUnavailable(format!(
                "namenode refused create for {}: {}",
                path,
                negotiated.detail()
            )));
        }
        let Some(location) = location.filter(|v| !v.trim().is_empty()) else {
            return Err(GatewayError::RemoteUnavailable(format!(
                "namenode did not provide a datanode location for {path}"
            )));
        };
        let datanode_url = self.api_url.join(location.trim()).map_err(|e| {
            GatewayError::RemoteUnavailable(format!("namenode returned an unusable location {location:?}: {e}"))
        })?;

        let size_bytes = content.len() as u64;
        debug!("[HDFS] write to datanode: path={}, bytes={}", path, size_bytes);
        let request = self
            .client
            .request(Method::PUT, datanode_url)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(content);
        let written = self.exchange(request, "datanode write").await?;
        if !written.is_completed() {
            return Err(GatewayError::RemoteWriteFailed(format!(
                "datanode rejected write of {}: {}",
                path,
                written.detail()
            )));
        }

        info!("[HDFS] stored {} ({} bytes)", path, size_bytes);
        Ok(ArtifactLocation {
            local_staging_path: None,
            remote_path: path.to_string(),
            size_bytes,
        })
    }

    async fn list_status(&self, path: &str) -> GatewayResult<Vec<ListingLine>> {
        let url = self.op_url(path, "LISTSTATUS", &[])?;
        let result = self.exchange(self.client.get(url), "list").await?;
        if result.is_not_found() {
            return Err(GatewayError::RemoteNotFound(path.to_string()));
        }
        if !result.success {
            return Err(GatewayError::RemoteOperationFailed(format!(
                "listing {} failed: {}",
                path,
                result.detail()
            )));
        }
        let parsed: ListStatusResponse = serde_json::from_str(&result.raw_response).map_err(|e| {
            GatewayError::RemoteOperationFailed(format!("malformed listing for {path}: {e}"))
        })?;

        Ok(parsed
            .file_statuses
            .file_status
            .into_iter()
            .map(|status| ListingLine::Entry(to_entry(path, status)))
            .collect())
    }

    async fn exists(&self, path: &str) -> GatewayResult<bool> {
        let url = self.op_url(path, "GETFILESTATUS", &[])?;
        let result = self.exchange(self.client.get(url), "stat").await?;
        if result.is_not_found() {
            return Ok(false);
        }
        if !result.success {
            return Err(GatewayError::RemoteOperationFailed(format!(
                "stat {} failed: {}",
                path,
                result.detail()
            )));
        }
        Ok(true)
    }

    async fn remove(&self, path: &str, recursive: bool) -> GatewayResult<bool> {
        let recursive_flag = if recursive { "true" } else { "false" };
        let url = self.op_url(path, "DELETE", &[("recursive", recursive_flag)])?;
        let result = self.exchange(self.client.delete(url), "delete").await?;
        if result.is_not_found() {
            return Err(GatewayError::RemoteNotFound(path.to_string()));
        }
        if !result.success {
            return Err(GatewayError::RemoteOperationFailed(format!(
                "delete of {} failed: {}",
                path,
                result.detail()
            )));
        }

        let deleted = serde_json::from_str::<BooleanResponse>(&result.raw_response)
            .map(|v| v.boolean)
            .map_err(|e| {
                GatewayError::RemoteOperationFailed(format!("malformed delete response for {path}: {e}"))
            })?;
        if deleted {
            info!("[HDFS] deleted {} (recursive={})", path, recursive);
            return Ok(true);
        }

        // WebHDFS answers `false` both for missing paths and for refusals.
        if !self.exists(path).await? {
            return Err(GatewayError::RemoteNotFound(path.to_string()));
        }
        Err(GatewayError::RemoteOperationFailed(format!(
            "store reported a failure deleting {path} (recursive={recursive})"
        )))
    }
}

fn to_entry(listed_path: &str, status: FileStatus) -> ArtifactEntry {
    let (name, path) = if status.path_suffix.is_empty() {
        // Listing a file returns the file itself with an empty suffix.
        let name = listed_path.rsplit('/').next().unwrap_or_default().to_string();
        (name, listed_path.to_string())
    } else {
        let path = join_remote(listed_path, &status.path_suffix);
        (status.path_suffix, path)
    };
    let kind = match status.kind.as_str() {
        "DIRECTORY" => EntryKind::Directory,
        "SYMLINK" => EntryKind::Symlink,
        _ => EntryKind::File,
    };
    ArtifactEntry {
        name,
        path,
        kind,
        size_bytes: status.length,
        owner: status.owner,
        group: status.group,
        permission: status.permission,
        replication: status.replication,
        modified_at: status.modification_time,
    }
}

impl StoreClient for WebHdfsClient {
    fn backend(&self) -> &'static str {
        "webhdfs"
    }

    fn upload<'a>(&'a self, path: &'a str, content: Bytes) -> RemoteFuture<'a, ArtifactLocation> {
        Box::pin(self.create(path, content))
    }

    fn list<'a>(&'a self, path: &'a str) -> RemoteFuture<'a, Vec<ListingLine>> {
        Box::pin(self.list_status(path))
    }

    fn delete<'a>(&'a self, path: &'a str, recursive: bool) -> RemoteFuture<'a, bool> {
        Box::pin(self.remove(path, recursive))
    }
}
