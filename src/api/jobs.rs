use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::Value;

use crate::api::{respond, AppState};
use crate::services::gateway::GatewayRequest;

pub fn router() -> Router<AppState> {
    Router::new().route("/process/{task_name}", post(process))
}

async fn process(State(state): State<AppState>, Path(task_name): Path<String>) -> (StatusCode, Json<Value>) {
    let res = state.gateway.dispatch(GatewayRequest::SubmitJob { task_name }).await;
    respond(res, StatusCode::ACCEPTED)
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use crate::api::test_util::spawn_app;
    use crate::config::Config;
    use crate::services::test_support::FakeYarn;

    async fn app_with_yarn() -> (String, FakeYarn) {
        let yarn = FakeYarn::start().await;
        let mut cfg = Config::for_tests();
        cfg.yarn_api_url = yarn.apps_url();
        (spawn_app(&cfg).await, yarn)
    }

    #[tokio::test]
    async fn accepted_job_returns_202_with_ids() {
        let (base, yarn) = app_with_yarn().await;

        let res = reqwest::Client::new()
            .post(format!("{base}/jobs/process/forecasting"))
            .send()
            .await
            .unwrap();

        assert_eq!(res.status(), 202);
        let body: Value = res.json().await.unwrap();
        assert!(body["data"]["job_id"].as_str().unwrap().starts_with("hashiramart-forecasting-"));
        assert_eq!(body["data"]["task"], "forecasting");
        assert_eq!(yarn.submissions().len(), 1);
    }

    #[tokio::test]
    async fn unknown_task_is_400_and_not_submitted() {
        let (base, yarn) = app_with_yarn().await;

        let res = reqwest::Client::new()
            .post(format!("{base}/jobs/process/training"))
            .send()
            .await
            .unwrap();

        assert_eq!(res.status(), 400);
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["error"]["kind"], "invalid_task");
        assert!(yarn.submissions().is_empty());
    }

    #[tokio::test]
    async fn rejected_submission_is_502() {
        let (base, yarn) = app_with_yarn().await;
        yarn.configure(|s| s.reject = true);

        let res = reqwest::Client::new()
            .post(format!("{base}/jobs/process/recommender"))
            .send()
            .await
            .unwrap();

        assert_eq!(res.status(), 502);
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["error"]["kind"], "submission_rejected");
        assert!(body["error"]["message"].as_str().unwrap().contains("STOPPED"));
    }
}
