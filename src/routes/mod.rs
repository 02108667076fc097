// HTTP routes: liveness, version, sync status, dashboard, OAuth login

mod http;

use axum::{Router, routing::get};
use std::sync::Arc;
use tokio::sync::watch;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};

use crate::fitbit_client::Authenticator;
use crate::heart_repo::HeartRepo;
use crate::models::SyncStatus;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) status: watch::Receiver<SyncStatus>,
    pub(crate) repo: Arc<HeartRepo>,
    pub(crate) auth: Arc<Authenticator>,
}

pub fn app(
    status: watch::Receiver<SyncStatus>,
    repo: Arc<HeartRepo>,
    auth: Arc<Authenticator>,
) -> Router {
    let state = AppState { status, repo, auth };
    Router::new()
        .route("/", get(|| async { "fitbit-exporter is running" })) // GET /
        .route("/version", get(http::version_handler)) // GET /version
        .route("/api/status", get(http::status_handler)) // GET /api/status
        .route("/api/dashboard", get(http::dashboard_handler)) // GET /api/dashboard
        .route("/login", get(http::login_handler)) // GET /login
        .route("/callback", get(http::callback_handler)) // GET /callback?code=
        .layer(CorsLayer::new().allow_origin(Any))
        .layer(CompressionLayer::new())
        .with_state(state)
}
