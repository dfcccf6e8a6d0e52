use crate::core::errors::{GatewayError, GatewayResult};

pub fn normalize_non_empty(input: Option<String>) -> Option<String> {
    input.and_then(|v| normalize_non_empty_str(&v))
}

pub fn normalize_non_empty_str(input: &str) -> Option<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Canonical absolute store path: leading `/`, no empty, `.` or `..` segments,
/// no trailing slash (except for the root itself).
pub fn normalize_remote_path(raw: &str) -> Result<String, String> {
    let trimmed = raw.trim();
    if !trimmed.starts_with('/') {
        return Err(format!("remote path must be absolute: {trimmed:?}"));
    }
    let mut segments = Vec::new();
    for segment in trimmed.split('/') {
        match segment {
            "" | "." => continue,
            ".." => return Err(format!("remote path must not contain '..': {trimmed:?}")),
            s => segments.push(s),
        }
    }
    Ok(format!("/{}", segments.join("/")))
}

pub fn join_remote(dir: &str, name: &str) -> String {
    format!("{}/{}", dir.trim_end_matches('/'), name)
}

/// Reduces a caller-supplied file name to its final component.
pub fn sanitize_file_name(raw: &str) -> GatewayResult<String> {
    let base = raw
        .trim()
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or("")
        .trim();
    if base.is_empty() || base == "." || base == ".." {
        return Err(GatewayError::upload_failed(format!(
            "invalid file name: {raw:?}"
        )));
    }
    if base.chars().any(|c| c.is_control()) {
        return Err(GatewayError::upload_failed(format!(
            "file name contains control characters: {raw:?}"
        )));
    }
    Ok(base.to_string())
}
