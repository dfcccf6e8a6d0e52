use std::io;

use axum::extract::{Multipart, Query, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use futures::TryStreamExt;
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::api::{bad_request, respond, AppState};
use crate::core::validation::normalize_non_empty;
use crate::services::gateway::{ByteStream, GatewayRequest};

#[derive(Debug, Deserialize)]
struct PathQuery {
    hdfs_path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DeleteQuery {
    hdfs_path: Option<String>,
    #[serde(default)]
    recursive: bool,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/upload", post(upload))
        .route("/status", get(status))
        .route("/delete", delete(remove))
}

/// Streams the multipart `file` field into the gateway. `hdfs_path` is the
/// target directory, not the full file path.
async fn upload(
    State(state): State<AppState>,
    Query(query): Query<PathQuery>,
    mut multipart: Multipart,
) -> (StatusCode, Json<Value>) {
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => return bad_request("multipart field `file` is required"),
            Err(err) => {
                warn!("[ARTIFACT] malformed multipart body: {}", err);
                return bad_request(format!("malformed multipart body: {err}"));
            }
        };
        if field.name() != Some("file") {
            continue;
        }
        let Some(file_name) = normalize_non_empty(field.file_name().map(str::to_string)) else {
            return bad_request("uploaded file has no file name");
        };

        let content: ByteStream<'_> = Box::pin(field.map_err(io::Error::other));
        let res = state
            .gateway
            .dispatch(GatewayRequest::UploadArtifact {
                file_name,
                content,
                target_dir: normalize_non_empty(query.hdfs_path),
            })
            .await;
        return respond(res, StatusCode::CREATED);
    }
}

async fn status(State(state): State<AppState>, Query(query): Query<PathQuery>) -> (StatusCode, Json<Value>) {
    let res = state
        .gateway
        .dispatch(GatewayRequest::ListArtifacts {
            path: normalize_non_empty(query.hdfs_path),
        })
        .await;
    respond(res, StatusCode::OK)
}

async fn remove(State(state): State<AppState>, Query(query): Query<DeleteQuery>) -> (StatusCode, Json<Value>) {
    let path = normalize_non_empty(query.hdfs_path)
        .unwrap_or_else(|| state.gateway.artifacts().default_dir().to_string());
    let res = state
        .gateway
        .dispatch(GatewayRequest::RemoveArtifact {
            path,
            recursive: query.recursive,
        })
        .await;
    respond(res, StatusCode::OK)
}
