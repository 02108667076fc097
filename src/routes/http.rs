// GET handlers: version, status, dashboard, OAuth login + callback

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use chrono::Utc;
use serde::Deserialize;

use super::AppState;
use crate::version::{NAME, VERSION};

/// GET /version: service name and version (from Cargo.toml at build time).
pub(super) async fn version_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "name": NAME,
        "version": VERSION,
    }))
}

/// GET /api/status: latest snapshot published by the sync worker.
pub(super) async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    let status = state.status.borrow().clone();
    Json(status)
}

pub(super) async fn dashboard_handler(State(state): State<AppState>) -> Response {
    let Some(account_id) = state.auth.account_id() else {
        return (StatusCode::FORBIDDEN, "login required").into_response();
    };
    let status = state.status.borrow().clone();
    let today = Utc::now().date_naive();
    match state.repo.dashboard(&account_id, today, &status).await {
        Ok(dashboard) => Json(dashboard).into_response(),
        Err(e) => {
            tracing::warn!(account = %account_id, error = %format!("{e:#}"), "dashboard query failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "dashboard unavailable").into_response()
        }
    }
}

/// GET /login: redirect to the Fitbit consent page.
pub(super) async fn login_handler(State(state): State<AppState>) -> Response {
    match state.auth.authorize_url() {
        Ok(url) => Redirect::to(url.as_str()).into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "cannot build authorize url");
            (StatusCode::INTERNAL_SERVER_ERROR, "login unavailable").into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct CallbackParams {
    code: Option<String>,
    error: Option<String>,
}

/// GET /callback?code=: exchange the code, then back to the index.
pub(super) async fn callback_handler(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> Response {
    if let Some(error) = params.error {
        return (StatusCode::BAD_REQUEST, format!("authorization denied: {error}")).into_response();
    }
    let Some(code) = params.code.filter(|c| !c.is_empty()) else {
        return (StatusCode::BAD_REQUEST, "missing code").into_response();
    };
    match state.auth.exchange_code(&code).await {
        Ok(_) => Redirect::to("/").into_response(),
        Err(e) => {
            tracing::warn!(error = %format!("{e:#}"), "oauth code exchange failed");
            (StatusCode::BAD_GATEWAY, "token exchange failed").into_response()
        }
    }
}
