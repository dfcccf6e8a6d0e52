use std::process::Stdio;
use std::time::Duration;

use bytes::Bytes;
use chrono::NaiveDateTime;
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::core::errors::{GatewayError, GatewayResult};
use crate::models::artifact::{ArtifactEntry, ArtifactLocation, EntryKind, ListingLine};
use crate::models::remote::RemoteOperationResult;
use crate::services::traits::{RemoteFuture, StoreClient};

static LS_ROW: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^([dl-][rwxstST-]{9}[+.]?)\s+(\S+)\s+(\S+)\s+(\S+)\s+(\d+)\s+(\d{4}-\d{2}-\d{2} \d{2}:\d{2})\s+(.+)$",
    )
    .expect("valid ls row pattern")
});

const NOT_FOUND_MARKER: &str = "No such file or directory";

/// Runs `hdfs dfs` in a trusted execution context. The configured command
/// prefix may wrap the client, e.g. `docker exec -i namenode hdfs`.
#[derive(Clone)]
pub struct HdfsCliClient {
    command: Vec<String>,
    timeout: Duration,
}

impl HdfsCliClient {
    pub fn new(command: Vec<String>, timeout: Duration) -> Result<Self, String> {
        if command.is_empty() {
            return Err("hdfs cli command must not be empty".to_string());
        }
        Ok(Self { command, timeout })
    }

    async fn run(&self, args: &[&str], stdin: Option<Bytes>) -> GatewayResult<RemoteOperationResult> {
        let program = &self.command[0];
        let mut cmd = tokio::process::Command::new(program);
        cmd.args(&self.command[1..])
            .arg("dfs")
            .args(args)
            .stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!("[HDFS] cli: {} dfs {}", self.command.join(" "), args.join(" "));
        let mut child = cmd.spawn().map_err(|err| {
            GatewayError::RemoteUnavailable(format!("failed to start {program}: {err}"))
        })?;

        let writer = match (child.stdin.take(), stdin) {
            (Some(mut pipe), Some(content)) => Some(tokio::spawn(async move {
                let written = pipe.write_all(&content).await;
                drop(pipe);
                written
            })),
            _ => None,
        };

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                GatewayError::RemoteUnavailable(format!(
                    "hdfs dfs {} timed out after {}s",
                    args.first().copied().unwrap_or_default(),
                    self.timeout.as_secs_f64()
                ))
            })?
            .map_err(|err| GatewayError::RemoteUnavailable(format!("hdfs dfs failed to run: {err}")))?;

        if let Some(writer) = writer {
            match writer.await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => debug!("[HDFS] cli stdin closed early: {}", err),
                Err(err) => warn!("[HDFS] cli stdin writer aborted: {}", err),
            }
        }

        Ok(RemoteOperationResult::from_exit(
            output.status.code(),
            String::from_utf8_lossy(&output.stdout).to_string(),
            String::from_utf8_lossy(&output.stderr).to_string(),
        ))
    }

    async fn put(&self, path: &str, content: Bytes) -> GatewayResult<ArtifactLocation> {
        let size_bytes = content.len() as u64;
        let result = self.run(&["-put", "-f", "-", path], Some(content)).await?;
        if !result.success {
            return Err(GatewayError::RemoteWriteFailed(format!(
                "hdfs put of {} failed: {}",
                path,
                result.detail()
            )));
        }
        info!("[HDFS] stored {} via cli ({} bytes)", path, size_bytes);
        Ok(ArtifactLocation {
            local_staging_path: None,
            remote_path: path.to_string(),
            size_bytes,
        })
    }

    async fn ls(&self, path: &str) -> GatewayResult<Vec<ListingLine>> {
        let result = self.run(&["-ls", path], None).await?;
        if !result.success {
            if is_not_found(&result) {
                return Err(GatewayError::RemoteNotFound(path.to_string()));
            }
            return Err(GatewayError::RemoteOperationFailed(format!(
                "hdfs ls of {} failed: {}",
                path,
                result.detail()
            )));
        }
        Ok(parse_listing(&result.raw_response))
    }

    async fn rm(&self, path: &str, recursive: bool) -> GatewayResult<bool> {
        let mut args = vec!["-rm", "-skipTrash"];
        if recursive {
            args.push("-r");
        }
        args.push(path);
        let result = self.run(&args, None).await?;
        if !result.success {
            if is_not_found(&result) {
                return Err(GatewayError::RemoteNotFound(path.to_string()));
            }
            return Err(GatewayError::RemoteOperationFailed(format!(
                "hdfs rm of {} failed: {}",
                path,
                result.detail()
            )));
        }
        info!("[HDFS] deleted {} via cli (recursive={})", path, recursive);
        Ok(true)
    }
}

fn is_not_found(result: &RemoteOperationResult) -> bool {
    result
        .error_detail
        .as_deref()
        .map(|detail| detail.contains(NOT_FOUND_MARKER))
        .unwrap_or(false)
}

/// Parses `hdfs dfs -ls` output. Anything that is not a listing row, such as
/// the leading `Found N items`, is kept as a summary line.
pub fn parse_listing(stdout: &str) -> Vec<ListingLine> {
    stdout
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.trim().is_empty())
        .map(|line| match parse_row(line) {
            Some(entry) => ListingLine::Entry(entry),
            None => ListingLine::Summary(line.trim().to_string()),
        })
        .collect()
}

fn parse_row(line: &str) -> Option<ArtifactEntry> {
    let caps = LS_ROW.captures(line)?;
    let permission = caps.get(1)?.as_str();
    let path = caps.get(7)?.as_str().to_string();
    let kind = match permission.chars().next() {
        Some('d') => EntryKind::Directory,
        Some('l') => EntryKind::Symlink,
        _ => EntryKind::File,
    };
    let modified_at = NaiveDateTime::parse_from_str(caps.get(6)?.as_str(), "%Y-%m-%d %H:%M")
        .ok()
        .map(|dt| dt.and_utc().timestamp_millis());
    Some(ArtifactEntry {
        name: path.rsplit('/').next().unwrap_or_default().to_string(),
        kind,
        size_bytes: caps.get(5)?.as_str().parse().unwrap_or(0),
        owner: Some(caps.get(3)?.as_str().to_string()),
        group: Some(caps.get(4)?.as_str().to_string()),
        permission: Some(permission.to_string()),
        replication: caps.get(2)?.as_str().parse().ok(),
        modified_at,
        path,
    })
}

impl StoreClient for HdfsCliClient {
    fn backend(&self) -> &'static str {
        "hdfs-cli"
    }

    fn upload<'a>(&'a self, path: &'a str, content: Bytes) -> RemoteFuture<'a, ArtifactLocation> {
        Box::pin(self.put(path, content))
    }

    fn list<'a>(&'a self, path: &'a str) -> RemoteFuture<'a, Vec<ListingLine>> {
        Box::pin(self.ls(path))
    }

    fn delete<'a>(&'a self, path: &'a str, recursive: bool) -> RemoteFuture<'a, bool> {
        Box::pin(self.rm(path, recursive))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::errors::ErrorKind;

    const SAMPLE_LS: &str = "Found 2 items\n\
drwxr-xr-x   - root supergroup          0 2024-03-01 10:15 /user/hashiramart/raw\n\
-rw-r--r--   3 root supergroup       1234 2024-03-01 10:16 /user/hashiramart/orders 2024.csv\n";

    #[test]
    fn parses_rows_and_keeps_summary_lines_apart() {
        let lines = parse_listing(SAMPLE_LS);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], ListingLine::Summary("Found 2 items".to_string()));

        let ListingLine::Entry(dir) = &lines[1] else { panic!("expected entry") };
        assert_eq!(dir.kind, EntryKind::Directory);
        assert_eq!(dir.name, "raw");
        assert_eq!(dir.replication, None);

        let ListingLine::Entry(file) = &lines[2] else { panic!("expected entry") };
        assert_eq!(file.kind, EntryKind::File);
        assert_eq!(file.name, "orders 2024.csv");
        assert_eq!(file.path, "/user/hashiramart/orders 2024.csv");
        assert_eq!(file.size_bytes, 1234);
        assert_eq!(file.replication, Some(3));
        assert_eq!(file.owner.as_deref(), Some("root"));
        assert!(file.modified_at.is_some());
    }

    #[cfg(unix)]
    fn scripted(script: &str) -> HdfsCliClient {
        // `sh -c <script> hdfs dfs ...` puts `dfs` and its arguments in "$@".
        HdfsCliClient::new(
            vec!["sh".into(), "-c".into(), script.into(), "hdfs".into()],
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn put_streams_content_through_stdin() {
        let client = scripted(r#"[ "$2" = "-put" ] && [ "$5" = "/user/x/orders.csv" ] && [ "$(cat)" = "a,b" ]"#);
        let location = client
            .upload("/user/x/orders.csv", Bytes::from_static(b"a,b"))
            .await
            .unwrap();
        assert_eq!(location.remote_path, "/user/x/orders.csv");
        assert_eq!(location.size_bytes, 3);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failed_put_is_a_write_failure() {
        let client = scripted("cat >/dev/null; echo 'put: Permission denied' >&2; exit 1");
        let err = client
            .upload("/user/x/orders.csv", Bytes::from_static(b"a,b"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RemoteWriteFailed);
        assert!(err.to_string().contains("Permission denied"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn ls_and_rm_translate_missing_paths() {
        let client = scripted("echo \"$2: \\`$4': No such file or directory\" >&2; exit 1");
        assert_eq!(
            client.list("/user/none").await.unwrap_err().kind(),
            ErrorKind::RemoteNotFound
        );
        assert_eq!(
            client.delete("/user/none", false).await.unwrap_err().kind(),
            ErrorKind::RemoteNotFound
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn rm_of_directory_without_recursion_fails() {
        let client = scripted("echo \"rm: \\`/user/raw': Is a directory\" >&2; exit 1");
        let err = client.delete("/user/raw", false).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RemoteOperationFailed);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn ls_output_is_parsed() {
        let client = scripted("printf 'Found 1 items\\n-rw-r--r--   1 root supergroup 5 2024-03-01 10:16 /user/x/a.csv\\n'");
        let lines = client.list("/user/x").await.unwrap();
        assert_eq!(lines.len(), 2);
        assert!(matches!(lines[0], ListingLine::Summary(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn hung_client_times_out_as_unavailable() {
        let client = HdfsCliClient::new(
            vec!["sh".into(), "-c".into(), "sleep 5".into(), "hdfs".into()],
            Duration::from_millis(200),
        )
        .unwrap();
        let err = client.list("/user/x").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RemoteUnavailable);
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn missing_binary_is_unavailable() {
        let client = HdfsCliClient::new(
            vec!["definitely-not-an-hdfs-binary".into()],
            Duration::from_secs(1),
        )
        .unwrap();
        let err = client.list("/user/x").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RemoteUnavailable);
    }
}
