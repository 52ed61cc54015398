// SPDX-License-Identifier: MIT

//! HTTP transport

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::cli::{evaluate_message, ConditionMessage, EvaluationResult};
use crate::condition::{Evaluator, Limits};

/// Shared by every request; read-only after startup
#[derive(Debug)]
pub struct AppState {
    pub evaluator: Evaluator,
    pub limits: Limits,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/evaluate", post(evaluate))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn serve(addr: SocketAddr, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = router(state);

    log::info!("Listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn evaluate(
    State(state): State<Arc<AppState>>,
    Json(message): Json<ConditionMessage>,
) -> Json<EvaluationResult> {
    Json(evaluate_message(&state.evaluator, &state.limits, &message))
}
