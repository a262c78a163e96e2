pub mod chat_routes;

use std::path::Path;

use axum::routing::post;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::service::chat_service::ChatService;
use chat_routes::stream_chat_handler;

pub const STREAM_PATH: &str = "/ai/chat/stream-sse";

/// Builds the application router. Files under `static_dir` are served as the
/// fallback when the directory exists.
pub fn router(svc: ChatService, static_dir: &Path) -> Router {
    let mut app = Router::new()
        .route(STREAM_PATH, post(stream_chat_handler))
        .with_state(svc);

    if static_dir.is_dir() {
        info!("Serving static assets from {}", static_dir.display());
        app = app.fallback_service(ServeDir::new(static_dir));
    }

    app.layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
