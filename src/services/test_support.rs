//! In-process stand-ins for the NameNode/DataNode pair and the
//! ResourceManager, served by axum on an ephemeral local port.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, post, put};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};

pub async fn serve(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    addr
}

fn remote_exception(status: StatusCode, exception: &str, message: &str) -> Response {
    (
        status,
        Json(json!({
            "RemoteException": {
                "exception": exception,
                "javaClassName": format!("org.apache.hadoop.{exception}"),
                "message": message,
            }
        })),
    )
        .into_response()
}

fn parent_of(path: &str) -> String {
    match path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(idx) => path[..idx].to_string(),
    }
}

#[derive(Default)]
pub struct FakeHdfsState {
    pub base: String,
    pub files: BTreeMap<String, Vec<u8>>,
    pub dirs: BTreeSet<String>,
    pub create_calls: usize,
    pub write_calls: usize,
    pub fail_create: bool,
    pub omit_location: bool,
    pub reject_write: bool,
    /// DataNode answers the write with another redirect instead of storing it.
    pub redirect_write: bool,
    pub refuse_delete: bool,
    pub delay: Option<Duration>,
}

impl FakeHdfsState {
    fn add_dirs_for(&mut self, path: &str) {
        let mut current = parent_of(path);
        while current != "/" {
            self.dirs.insert(current.clone());
            current = parent_of(&current);
        }
    }

    fn has_children(&self, dir: &str) -> bool {
        let prefix = format!("{}/", dir.trim_end_matches('/'));
        self.files.keys().any(|p| p.starts_with(&prefix)) || self.dirs.iter().any(|p| p.starts_with(&prefix))
    }

    fn status_json(&self, path: &str, suffix: &str) -> Option<Value> {
        if let Some(content) = self.files.get(path) {
            return Some(json!({
                "pathSuffix": suffix,
                "type": "FILE",
                "length": content.len(),
                "owner": "root",
                "group": "supergroup",
                "permission": "644",
                "replication": 3,
                "modificationTime": 1_700_000_000_000i64,
            }));
        }
        if path == "/" || self.dirs.contains(path) {
            return Some(json!({
                "pathSuffix": suffix,
                "type": "DIRECTORY",
                "length": 0,
                "owner": "root",
                "group": "supergroup",
                "permission": "755",
                "replication": 0,
                "modificationTime": 1_700_000_000_000i64,
            }));
        }
        None
    }
}

#[derive(Clone)]
pub struct FakeHdfs {
    addr: SocketAddr,
    state: Arc<Mutex<FakeHdfsState>>,
}

impl FakeHdfs {
    pub async fn start() -> Self {
        let state = Arc::new(Mutex::new(FakeHdfsState::default()));
        let router = Router::new()
            .route("/webhdfs/v1/{*path}", any(namenode))
            .route("/datanode/{*path}", put(datanode))
            .with_state(state.clone());
        let addr = serve(router).await;
        state.lock().base = format!("http://{addr}");
        Self { addr, state }
    }

    pub fn api_url(&self) -> String {
        format!("http://{}/webhdfs/v1", self.addr)
    }

    pub fn configure(&self, f: impl FnOnce(&mut FakeHdfsState)) {
        f(&mut self.state.lock());
    }

    pub fn put_file(&self, path: &str, content: &[u8]) {
        let mut state = self.state.lock();
        state.add_dirs_for(path);
        state.files.insert(path.to_string(), content.to_vec());
    }

    pub fn put_dir(&self, path: &str) {
        let mut state = self.state.lock();
        state.add_dirs_for(path);
        state.dirs.insert(path.to_string());
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.state.lock().files.get(path).cloned()
    }

    pub fn create_calls(&self) -> usize {
        self.state.lock().create_calls
    }

    pub fn write_calls(&self) -> usize {
        self.state.lock().write_calls
    }
}

async fn namenode(
    State(state): State<Arc<Mutex<FakeHdfsState>>>,
    method: Method,
    Path(path): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let delay = state.lock().delay;
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }

    let path = format!("/{}", path.trim_matches('/'));
    let op = query.get("op").cloned().unwrap_or_default();
    let mut s = state.lock();

    match (method, op.as_str()) {
        (Method::PUT, "CREATE") => {
            s.create_calls += 1;
            if s.fail_create {
                return remote_exception(
                    StatusCode::FORBIDDEN,
                    "SafeModeException",
                    "Cannot create file. Name node is in safe mode.",
                );
            }
            if s.omit_location {
                return StatusCode::OK.into_response();
            }
            let mut headers = HeaderMap::new();
            let location = format!("{}/datanode{}?op=CREATE&overwrite=true", s.base, path);
            headers.insert(header::LOCATION, location.parse().unwrap());
            (StatusCode::TEMPORARY_REDIRECT, headers).into_response()
        }
        (Method::GET, "LISTSTATUS") => {
            if s.files.contains_key(&path) {
                let status = s.status_json(&path, "").unwrap();
                return Json(json!({"FileStatuses": {"FileStatus": [status]}})).into_response();
            }
            if path != "/" && !s.dirs.contains(&path) {
                return remote_exception(
                    StatusCode::NOT_FOUND,
                    "FileNotFoundException",
                    &format!("File {path} does not exist."),
                );
            }
            let mut children: BTreeMap<String, Value> = BTreeMap::new();
            let candidates: Vec<String> = s.files.keys().chain(s.dirs.iter()).cloned().collect();
            for child in candidates {
                if child != path && parent_of(&child) == path {
                    let suffix = child.rsplit('/').next().unwrap_or_default().to_string();
                    if let Some(status) = s.status_json(&child, &suffix) {
                        children.insert(suffix, status);
                    }
                }
            }
            Json(json!({"FileStatuses": {"FileStatus": children.into_values().collect::<Vec<_>>()}}))
                .into_response()
        }
        (Method::GET, "GETFILESTATUS") => match s.status_json(&path, "") {
            Some(status) => Json(json!({"FileStatus": status})).into_response(),
            None => remote_exception(
                StatusCode::NOT_FOUND,
                "FileNotFoundException",
                &format!("File does not exist: {path}"),
            ),
        },
        (Method::DELETE, "DELETE") => {
            let recursive = query.get("recursive").map(|v| v == "true").unwrap_or(false);
            let exists = s.files.contains_key(&path) || s.dirs.contains(&path);
            if !exists || s.refuse_delete {
                return Json(json!({"boolean": false})).into_response();
            }
            if s.dirs.contains(&path) && s.has_children(&path) && !recursive {
                return remote_exception(
                    StatusCode::FORBIDDEN,
                    "PathIsNotEmptyDirectoryException",
                    &format!("`{path} is non empty': Directory is not empty"),
                );
            }
            let prefix = format!("{path}/");
            s.files.retain(|p, _| p != &path && !p.starts_with(&prefix));
            s.dirs.retain(|p| p != &path && !p.starts_with(&prefix));
            Json(json!({"boolean": true})).into_response()
        }
        _ => remote_exception(
            StatusCode::BAD_REQUEST,
            "IllegalArgumentException",
            &format!("Invalid value for webhdfs parameter \"op\": {op}"),
        ),
    }
}

async fn datanode(
    State(state): State<Arc<Mutex<FakeHdfsState>>>,
    Path(path): Path<String>,
    body: Bytes,
) -> Response {
    let path = format!("/{}", path.trim_matches('/'));
    let mut s = state.lock();
    s.write_calls += 1;
    if s.reject_write {
        return remote_exception(
            StatusCode::FORBIDDEN,
            "AccessControlException",
            "Permission denied: user=root, access=WRITE",
        );
    }
    if s.redirect_write {
        let mut headers = HeaderMap::new();
        let location = format!("{}/datanode-2{}?op=CREATE", s.base, path);
        headers.insert(header::LOCATION, location.parse().unwrap());
        return (StatusCode::TEMPORARY_REDIRECT, headers).into_response();
    }
    s.add_dirs_for(&path);
    s.files.insert(path, body.to_vec());
    StatusCode::CREATED.into_response()
}

#[derive(Default)]
pub struct FakeYarnState {
    pub base: String,
    pub submissions: Vec<Value>,
    pub reject: bool,
    pub omit_location: bool,
    pub delay: Option<Duration>,
}

#[derive(Clone)]
pub struct FakeYarn {
    addr: SocketAddr,
    state: Arc<Mutex<FakeYarnState>>,
}

impl FakeYarn {
    pub async fn start() -> Self {
        let state = Arc::new(Mutex::new(FakeYarnState::default()));
        let router = Router::new()
            .route("/ws/v1/cluster/apps", post(submit_app))
            .with_state(state.clone());
        let addr = serve(router).await;
        state.lock().base = format!("http://{addr}");
        Self { addr, state }
    }

    pub fn apps_url(&self) -> String {
        format!("http://{}/ws/v1/cluster/apps", self.addr)
    }

    pub fn configure(&self, f: impl FnOnce(&mut FakeYarnState)) {
        f(&mut self.state.lock());
    }

    pub fn submissions(&self) -> Vec<Value> {
        self.state.lock().submissions.clone()
    }
}

async fn submit_app(State(state): State<Arc<Mutex<FakeYarnState>>>, Json(payload): Json<Value>) -> Response {
    let delay = state.lock().delay;
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
    let mut s = state.lock();
    s.submissions.push(payload);
    if s.reject {
        return remote_exception(
            StatusCode::BAD_REQUEST,
            "BadRequestException",
            "Queue default is STOPPED. Cannot accept submission",
        );
    }
    if s.omit_location {
        return StatusCode::ACCEPTED.into_response();
    }
    let app_id = format!("application_1700000000000_{:04}", s.submissions.len());
    let mut headers = HeaderMap::new();
    let location = format!("{}/ws/v1/cluster/apps/{}", s.base, app_id);
    headers.insert(header::LOCATION, location.parse().unwrap());
    (StatusCode::ACCEPTED, headers).into_response()
}
