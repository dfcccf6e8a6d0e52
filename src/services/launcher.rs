use std::io;
use std::path::Path;
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tracing::{info, warn};

use crate::core::errors::{GatewayError, GatewayResult};
use crate::models::job::CommandSpec;

/// Starts `spec` as a detached process and returns its pid once it is
/// running. The exit status is only logged; callers never observe it.
///
/// Must be called from within a tokio runtime.
pub fn spawn_detached(label: &str, spec: &CommandSpec, cwd: Option<&Path>) -> GatewayResult<Option<u32>> {
    if let Some(dir) = cwd {
        if !dir.is_dir() {
            return Err(GatewayError::LaunchFailed(format!(
                "working directory {} does not exist",
                dir.display()
            )));
        }
    }

    let mut cmd = tokio::process::Command::new(&spec.program);
    cmd.args(&spec.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }

    let mut child = cmd.spawn().map_err(|err| match err.kind() {
        io::ErrorKind::NotFound => GatewayError::LaunchFailed(format!(
            "'{}' command not found. Is it installed on the gateway host?",
            spec.program
        )),
        io::ErrorKind::PermissionDenied => {
            GatewayError::LaunchFailed(format!("'{}' is not executable: {}", spec.program, err))
        }
        _ => GatewayError::LaunchFailed(format!("failed to start '{}': {}", spec.program, err)),
    })?;

    let pid = child.id();
    info!("[{}] started: pid={:?}, command={}", label, pid, spec.command_line());

    if let Some(stdout) = child.stdout.take() {
        tokio::spawn(forward_output(label.to_string(), "stdout", stdout));
    }
    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(forward_output(label.to_string(), "stderr", stderr));
    }

    let label = label.to_string();
    tokio::spawn(async move {
        match child.wait().await {
            Ok(status) if status.success() => info!("[{}] finished: pid={:?}", label, pid),
            Ok(status) => warn!("[{}] exited unsuccessfully: pid={:?}, status={}", label, pid, status),
            Err(err) => warn!("[{}] wait failed: pid={:?}, error={}", label, pid, err),
        }
    });

    Ok(pid)
}

async fn forward_output<R>(label: String, stream: &'static str, reader: R)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        info!("[{}] {} | {}", label, stream, line);
    }
}
