use serde::Deserialize;

const MAX_DETAIL_CHARS: usize = 2000;

/// The outcome of exactly one exchange with a remote service, before it is
/// classified into a typed result. `status` is the HTTP status for REST
/// exchanges and the exit code for command-line exchanges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteOperationResult {
    pub success: bool,
    pub status: Option<i32>,
    pub raw_response: String,
    pub error_detail: Option<String>,
    /// Hadoop exception class name from a `RemoteException` body, if present.
    pub exception: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RemoteExceptionEnvelope {
    #[serde(rename = "RemoteException")]
    remote_exception: RemoteExceptionBody,
}

#[derive(Debug, Deserialize)]
struct RemoteExceptionBody {
    exception: Option<String>,
    message: Option<String>,
}

impl RemoteOperationResult {
    pub fn from_http(status: u16, body: String) -> Self {
        // 3xx counts as success: redirects are how the store hands out write locations.
        let success = (200..400).contains(&status);
        let parsed = serde_json::from_str::<RemoteExceptionEnvelope>(&body).ok();
        let exception = parsed
            .as_ref()
            .and_then(|env| env.remote_exception.exception.clone());
        let error_detail = if success && parsed.is_none() {
            None
        } else {
            let message = parsed
                .and_then(|env| {
                    let exception = env.remote_exception.exception.unwrap_or_default();
                    env.remote_exception
                        .message
                        .map(|m| if exception.is_empty() { m } else { format!("{exception}: {m}") })
                })
                .unwrap_or_else(|| truncate(body.trim()));
            Some(format!("status {status}: {message}"))
        };
        Self {
            success: success && exception.is_none(),
            status: Some(i32::from(status)),
            raw_response: body,
            error_detail,
            exception,
        }
    }

    /// Success with a 2xx status. Redirects are not followed, so a 3xx from
    /// an endpoint that should do the work means nothing was done.
    pub fn is_completed(&self) -> bool {
        self.success && matches!(self.status, Some(200..=299))
    }

    pub fn from_exit(code: Option<i32>, stdout: String, stderr: String) -> Self {
        let success = code == Some(0);
        let error_detail = if success {
            None
        } else {
            let text = if stderr.trim().is_empty() { stdout.trim() } else { stderr.trim() };
            Some(match code {
                Some(code) => format!("exit code {code}: {}", truncate(text)),
                None => format!("terminated by signal: {}", truncate(text)),
            })
        };
        Self {
            success,
            status: code,
            raw_response: stdout,
            error_detail: error_detail.map(|d| d.trim_end_matches(": ").to_string()),
            exception: None,
        }
    }

    pub fn detail(&self) -> String {
        self.error_detail
            .clone()
            .unwrap_or_else(|| format!("unexpected response (status {:?})", self.status))
    }

    pub fn is_not_found(&self) -> bool {
        self.status == Some(404)
            || self.exception.as_deref() == Some("FileNotFoundException")
    }
}

fn truncate(text: &str) -> String {
    if text.chars().count() <= MAX_DETAIL_CHARS {
        return text.to_string();
    }
    let mut out: String = text.chars().take(MAX_DETAIL_CHARS).collect();
    out.push_str("…");
    out
}
