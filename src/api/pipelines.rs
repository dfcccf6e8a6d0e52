use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::Value;

use crate::api::{respond, AppState};
use crate::services::gateway::GatewayRequest;

pub fn router() -> Router<AppState> {
    Router::new().route("/run", post(run))
}

async fn run(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let res = state.gateway.dispatch(GatewayRequest::TriggerPipeline).await;
    respond(res, StatusCode::ACCEPTED)
}
