//! rollcall-api — the coordinator's HTTP surface.

pub mod handlers;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};

use rollcall_core::protocol::{LOGIN_PATH, MANAGER_PATH, UPDATE_PATH};

pub use handlers::ApiState;

pub fn router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handlers::handle_root))
        .route(
            LOGIN_PATH,
            get(handlers::handle_login_page).post(handlers::handle_login),
        )
        .route(UPDATE_PATH, post(handlers::handle_update))
        .route(MANAGER_PATH, get(handlers::handle_overview))
        .route("/manager/paths", post(handlers::handle_default_paths))
        .route("/manager/id/{token}", get(handlers::handle_session_inspect))
        .route("/manager/id/{token}/track", post(handlers::handle_track_toggle))
        .route("/manager/id/{token}/export", get(handlers::handle_export))
        .route("/manager/id/{token}/paths", post(handlers::handle_session_paths))
        .with_state(state)
        .layer(cors)
}

/// Serve on an already-bound listener.
pub async fn serve_listener(listener: tokio::net::TcpListener, state: ApiState) -> anyhow::Result<()> {
    let addr = listener.local_addr()?;
    tracing::info!(%addr, "coordinator listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

pub async fn serve(state: ApiState, bind: &str, port: u16) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(format!("{}:{}", bind, port)).await?;
    serve_listener(listener, state).await
}
