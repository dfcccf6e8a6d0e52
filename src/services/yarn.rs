use std::sync::Arc;
use std::time::Duration;

use reqwest::header::LOCATION;
use serde::Serialize;
use tracing::{info, warn};
use url::Url;

use crate::config::{Config, JobSubmitMode};
use crate::core::errors::{GatewayError, GatewayResult};
use crate::models::job::JobDescriptor;
use crate::models::remote::RemoteOperationResult;
use crate::services::launcher::spawn_detached;
use crate::services::traits::{JobSubmitter, RemoteFuture};

#[derive(Debug, Serialize)]
#[serde(rename_all = "kebab-case")]
struct SubmitApplicationRequest<'a> {
    application_id: &'a str,
    application_name: String,
    am_container_spec: AmContainerSpec,
    application_type: &'static str,
}

#[derive(Debug, Serialize)]
struct AmContainerSpec {
    commands: ContainerCommands,
}

#[derive(Debug, Serialize)]
struct ContainerCommands {
    command: String,
}

/// Submits applications through the ResourceManager's Cluster Applications
/// REST API. Submission is acknowledged with `202 Accepted` and a `Location`
/// pointing at the new application; nothing here waits for it to run.
#[derive(Clone)]
pub struct YarnRestClient {
    client: reqwest::Client,
    apps_url: Url,
    app_name_prefix: String,
}

impl YarnRestClient {
    pub fn new(apps_url: &str, job_id_prefix: &str, timeout: Duration) -> Result<Self, String> {
        let apps_url = Url::parse(apps_url).map_err(|e| format!("invalid YARN_API_URL {apps_url:?}: {e}"))?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| format!("build http client failed: {e}"))?;
        Ok(Self {
            client,
            apps_url,
            app_name_prefix: capitalize(job_id_prefix),
        })
    }

    fn payload<'a>(&self, descriptor: &'a JobDescriptor) -> SubmitApplicationRequest<'a> {
        SubmitApplicationRequest {
            application_id: descriptor.job_id(),
            application_name: format!("{}-{}-Processing", self.app_name_prefix, descriptor.task_name()),
            am_container_spec: AmContainerSpec {
                commands: ContainerCommands {
                    command: descriptor.command().command_line(),
                },
            },
            application_type: "SPARK",
        }
    }

    async fn post_application(&self, descriptor: &JobDescriptor) -> GatewayResult<Option<String>> {
        let payload = self.payload(descriptor);
        info!(
            "[YARN] submit: job_id={}, task={}, command={}",
            descriptor.job_id(),
            descriptor.task_name(),
            payload.am_container_spec.commands.command
        );

        let response = self
            .client
            .post(self.apps_url.clone())
            .json(&payload)
            .send()
            .await
            .map_err(|err| {
                warn!("[YARN] submit transport failure: job_id={}, error={}", descriptor.job_id(), err);
                GatewayError::from(err)
            })?;
        let status = response.status().as_u16();
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());
        let body = response.text().await.map_err(GatewayError::from)?;
        let result = RemoteOperationResult::from_http(status, body);

        if !result.is_completed() {
            warn!("[YARN] submission rejected: job_id={}, detail={}", descriptor.job_id(), result.detail());
            return Err(GatewayError::SubmissionRejected(result.detail()));
        }

        let application_id = location.as_deref().and_then(application_id_from_location);
        if application_id.is_none() {
            warn!("[YARN] accepted without a usable Location header: job_id={}", descriptor.job_id());
        }
        info!(
            "[YARN] accepted: job_id={}, application_id={}",
            descriptor.job_id(),
            application_id.as_deref().unwrap_or("-")
        );
        Ok(application_id)
    }
}

fn application_id_from_location(location: &str) -> Option<String> {
    location
        .split(['?', '#'])
        .next()
        .and_then(|path| path.trim_end_matches('/').rsplit('/').next())
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(|id| id.to_string())
}

fn capitalize(raw: &str) -> String {
    let mut chars = raw.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

impl JobSubmitter for YarnRestClient {
    fn backend(&self) -> &'static str {
        "yarn-rest"
    }

    fn submit<'a>(&'a self, descriptor: &'a JobDescriptor) -> RemoteFuture<'a, Option<String>> {
        Box::pin(self.post_application(descriptor))
    }
}

/// Runs the job's command line directly (`spark-submit --master yarn ...`) as
/// a detached process on the gateway host. The cluster assigns the
/// application id later, so none is returned.
#[derive(Clone, Default)]
pub struct SparkSubmitLauncher;

impl JobSubmitter for SparkSubmitLauncher {
    fn backend(&self) -> &'static str {
        "spark-submit"
    }

    fn submit<'a>(&'a self, descriptor: &'a JobDescriptor) -> RemoteFuture<'a, Option<String>> {
        Box::pin(async move {
            spawn_detached("SPARK-SUBMIT", descriptor.command(), None)?;
            Ok(None)
        })
    }
}

pub fn build_job_submitter(cfg: &Config) -> Result<Arc<dyn JobSubmitter>, String> {
    let submitter: Arc<dyn JobSubmitter> = match cfg.job_submit_mode {
        JobSubmitMode::YarnRest => Arc::new(YarnRestClient::new(
            &cfg.yarn_api_url,
            &cfg.job_id_prefix,
            Duration::from_secs(cfg.remote_timeout_secs),
        )?),
        JobSubmitMode::SparkSubmit => Arc::new(SparkSubmitLauncher),
    };
    Ok(submitter)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::core::errors::ErrorKind;
    use crate::models::job::{CommandSpec, TaskName};
    use crate::services::test_support::FakeYarn;

    fn descriptor(task: TaskName) -> JobDescriptor {
        JobDescriptor::new(
            "hashiramart",
            task,
            CommandSpec::new(
                "/opt/spark/bin/spark-submit",
                vec![
                    "--master".into(),
                    "yarn".into(),
                    "/app/process_data.py".into(),
                    "--task".into(),
                    task.to_string(),
                ],
            ),
        )
    }

    #[test]
    fn extracts_application_id_from_location() {
        assert_eq!(
            application_id_from_location("http://rm:8088/ws/v1/cluster/apps/application_1_0001"),
            Some("application_1_0001".to_string())
        );
        assert_eq!(
            application_id_from_location("/ws/v1/cluster/apps/application_1_0002/?user=root"),
            Some("application_1_0002".to_string())
        );
        assert_eq!(application_id_from_location(""), None);
    }

    #[tokio::test]
    async fn posts_application_payload_and_returns_manager_id() {
        let fake = FakeYarn::start().await;
        let client = YarnRestClient::new(&fake.apps_url(), "hashiramart", Duration::from_secs(2)).unwrap();
        let job = descriptor(TaskName::Recommender);

        let app_id = client.submit(&job).await.unwrap();

        assert_eq!(app_id.as_deref(), Some("application_1700000000000_0001"));
        let submissions = fake.submissions();
        assert_eq!(submissions.len(), 1);
        let payload = &submissions[0];
        assert_eq!(payload["application-id"], job.job_id());
        assert_eq!(payload["application-name"], "Hashiramart-recommender-Processing");
        assert_eq!(payload["application-type"], "SPARK");
        assert_eq!(
            payload["am-container-spec"]["commands"]["command"],
            "/opt/spark/bin/spark-submit --master yarn /app/process_data.py --task recommender"
        );
    }

    #[tokio::test]
    async fn accepted_without_location_still_succeeds() {
        let fake = FakeYarn::start().await;
        fake.configure(|s| s.omit_location = true);
        let client = YarnRestClient::new(&fake.apps_url(), "hashiramart", Duration::from_secs(2)).unwrap();

        let app_id = client.submit(&descriptor(TaskName::Forecasting)).await.unwrap();
        assert_eq!(app_id, None);
    }

    #[tokio::test]
    async fn rejection_carries_remote_error_body() {
        let fake = FakeYarn::start().await;
        fake.configure(|s| s.reject = true);
        let client = YarnRestClient::new(&fake.apps_url(), "hashiramart", Duration::from_secs(2)).unwrap();

        let err = client.submit(&descriptor(TaskName::Forecasting)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SubmissionRejected);
        assert!(err.to_string().contains("Queue default is STOPPED"));
    }

    #[tokio::test]
    async fn slow_resource_manager_times_out_as_unavailable() {
        let fake = FakeYarn::start().await;
        fake.configure(|s| s.delay = Some(Duration::from_secs(3)));
        let client =
            YarnRestClient::new(&fake.apps_url(), "hashiramart", Duration::from_millis(200)).unwrap();

        let err = client.submit(&descriptor(TaskName::Recommender)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RemoteUnavailable);
    }

    #[tokio::test]
    async fn spark_submit_reports_missing_binary() {
        let job = JobDescriptor::new(
            "hashiramart",
            TaskName::Recommender,
            CommandSpec::new("definitely-not-spark-submit", vec![]),
        );
        let err = SparkSubmitLauncher.submit(&job).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LaunchFailed);
    }
}
