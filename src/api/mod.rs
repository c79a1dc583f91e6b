//! HTTP API.
//!
//! All routes live under `/api`; uploaded images are served from `/uploads`.

pub mod auth;
pub mod reports;
pub mod tasks;
pub mod uploads;
pub mod users;

use crate::auth::Credentials;
use crate::config::Config;
use crate::db::Database;
use crate::error::ApiError;
use axum::extract::{DefaultBodyLimit, FromRequest};
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post, put};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub credentials: Arc<Credentials>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(db: Database, credentials: Credentials, config: Config) -> Self {
        Self {
            db: Arc::new(db),
            credentials: Arc::new(credentials),
            config: Arc::new(config),
        }
    }
}

/// JSON body extractor whose rejection is an [`ApiError`].
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

#[derive(serde::Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Build the router with all routes.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let uploads = ServeDir::new(&state.config.server.uploads_dir);
    let body_limit = DefaultBodyLimit::max(state.config.server.max_upload_bytes);

    Router::new()
        // Auth
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route(
            "/api/auth/profile",
            get(auth::get_profile).put(auth::update_profile),
        )
        .route("/api/auth/upload-image", post(uploads::upload_image))
        // Tasks
        .route("/api/tasks/dashboard-data", get(tasks::dashboard_data))
        .route("/api/tasks/user-dashboard-data", get(tasks::user_dashboard_data))
        .route("/api/tasks", get(tasks::list_tasks).post(tasks::create_task))
        .route(
            "/api/tasks/{id}",
            get(tasks::get_task)
                .put(tasks::update_task)
                .delete(tasks::delete_task),
        )
        .route("/api/tasks/{id}/status", put(tasks::update_task_status))
        .route("/api/tasks/{id}/todo", put(tasks::update_task_checklist))
        // Users
        .route("/api/users", get(users::list_users))
        .route("/api/users/{id}", get(users::get_user))
        // Reports
        .route("/api/reports/export/tasks", get(reports::export_tasks))
        .route("/api/reports/export/users", get(reports::export_users))
        .route("/api/health", get(health))
        .nest_service("/uploads", uploads)
        .layer(body_limit)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Handle for a running server.
pub struct ServerHandle {
    pub addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl ServerHandle {
    /// Signal graceful shutdown and wait for in-flight requests to finish.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        let _ = self.task.await;
    }
}

/// Bind the configured address and serve in the background.
pub async fn start_server(state: AppState) -> anyhow::Result<ServerHandle> {
    let bind = format!("{}:{}", state.config.server.bind, state.config.server.port);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind).await?;
    let addr = listener.local_addr()?;

    info!("Server listening on http://{}", addr);

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let task = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                info!("Server shutting down");
            })
            .await
        {
            tracing::error!("Server error: {}", e);
        }
    });

    Ok(ServerHandle {
        addr,
        shutdown_tx: Some(shutdown_tx),
        task,
    })
}
