use std::any::Any;
use std::io;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use futures::{FutureExt, Stream};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::error;

use crate::config::Config;
use crate::core::errors::{ErrorKind, GatewayError, GatewayResult};
use crate::services::artifact_manager::ArtifactManager;
use crate::services::hdfs::build_store_client;
use crate::services::job_coordinator::JobCoordinator;
use crate::services::yarn::build_job_submitter;

pub type ByteStream<'a> = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send + 'a>>;

pub enum GatewayRequest<'a> {
    UploadArtifact {
        file_name: String,
        content: ByteStream<'a>,
        target_dir: Option<String>,
    },
    RemoveArtifact {
        path: String,
        recursive: bool,
    },
    ListArtifacts {
        path: Option<String>,
    },
    SubmitJob {
        task_name: String,
    },
    TriggerPipeline,
}

impl GatewayRequest<'_> {
    pub fn operation(&self) -> &'static str {
        match self {
            GatewayRequest::UploadArtifact { .. } => "upload_artifact",
            GatewayRequest::RemoveArtifact { .. } => "remove_artifact",
            GatewayRequest::ListArtifacts { .. } => "list_artifacts",
            GatewayRequest::SubmitJob { .. } => "submit_job",
            GatewayRequest::TriggerPipeline => "trigger_pipeline",
        }
    }
}

/// Uniform outcome of one gateway operation. Failures carry a stable
/// `status_kind`; `data` is only present on success.
#[derive(Debug, Clone, Serialize)]
pub struct GatewayResponse {
    pub ok: bool,
    pub operation: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_kind: Option<ErrorKind>,
    pub retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl GatewayResponse {
    fn success(operation: &'static str, message: impl Into<String>, data: Value) -> Self {
        Self {
            ok: true,
            operation,
            message: message.into(),
            status_kind: None,
            retryable: false,
            cause: None,
            data: Some(data),
        }
    }

    fn failure(operation: &'static str, err: &GatewayError) -> Self {
        let kind = err.kind();
        Self {
            ok: false,
            operation,
            message: err.to_string(),
            status_kind: Some(kind),
            retryable: kind.retryable(),
            cause: err.cause_kind(),
            data: None,
        }
    }
}

/// Stateless front door over the artifact manager and the job coordinator.
pub struct Gateway {
    artifacts: ArtifactManager,
    jobs: JobCoordinator,
}

impl Gateway {
    pub fn new(artifacts: ArtifactManager, jobs: JobCoordinator) -> Self {
        Self { artifacts, jobs }
    }

    pub fn from_config(cfg: &Config) -> Result<Arc<Self>, String> {
        let store = build_store_client(cfg)?;
        let artifacts = ArtifactManager::new(
            store,
            cfg.staging_dir.clone(),
            &cfg.hdfs_default_dir,
            cfg.max_upload_bytes,
        )?;
        let jobs = JobCoordinator::new(build_job_submitter(cfg)?, cfg)?;
        Ok(Arc::new(Self::new(artifacts, jobs)))
    }

    pub fn artifacts(&self) -> &ArtifactManager {
        &self.artifacts
    }

    pub fn jobs(&self) -> &JobCoordinator {
        &self.jobs
    }

    pub async fn dispatch(&self, request: GatewayRequest<'_>) -> GatewayResponse {
        let operation = request.operation();
        let outcome = AssertUnwindSafe(self.handle(request))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                let detail = panic_message(panic.as_ref());
                error!("[GATEWAY] {} panicked: {}", operation, detail);
                Err(GatewayError::Unexpected(detail))
            });

        match outcome {
            Ok((message, data)) => GatewayResponse::success(operation, message, data),
            Err(err) => GatewayResponse::failure(operation, &err),
        }
    }

    async fn handle(&self, request: GatewayRequest<'_>) -> GatewayResult<(String, Value)> {
        match request {
            GatewayRequest::UploadArtifact {
                file_name,
                content,
                target_dir,
            } => {
                let location = self
                    .artifacts
                    .upload(&file_name, content, target_dir.as_deref())
                    .await?;
                Ok((
                    format!("{} uploaded to {}", file_name, location.remote_path),
                    json!({
                        "hdfs_path": location.remote_path,
                        "size_bytes": location.size_bytes,
                        "local_staging_path": location.local_staging_path,
                    }),
                ))
            }
            GatewayRequest::RemoveArtifact { path, recursive } => {
                let path = self.artifacts.remove(&path, recursive).await?;
                Ok((
                    format!("{path} deleted"),
                    json!({ "hdfs_path": path, "recursive": recursive }),
                ))
            }
            GatewayRequest::ListArtifacts { path } => {
                let (path, entries) = self.artifacts.status(path.as_deref()).await?;
                Ok((
                    format!("{} entries under {}", entries.len(), path),
                    json!({ "hdfs_path": path, "entries": entries }),
                ))
            }
            GatewayRequest::SubmitJob { task_name } => {
                let submission = self.jobs.submit_named_job(&task_name).await?;
                let descriptor = &submission.descriptor;
                Ok((
                    format!("{} job submitted", descriptor.task_name().display_name()),
                    json!({
                        "job_id": descriptor.job_id(),
                        "task": descriptor.task_name(),
                        "application_id": submission.application_id,
                        "submitted_at": descriptor.submitted_at().to_rfc3339(),
                    }),
                ))
            }
            GatewayRequest::TriggerPipeline => {
                let pid = self.jobs.trigger_reproducible_pipeline()?;
                Ok(("pipeline started".to_string(), json!({ "pid": pid })))
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "worker task panicked".to_string()
    }
}
