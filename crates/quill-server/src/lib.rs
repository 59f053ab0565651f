//! Quill HTTP server - REST API over the notes backend.
//!
//! Routes under `/users` and `/login` are public; everything else sits
//! behind the bearer-token middleware, which resolves the token to an
//! owner id that every handler passes down explicitly.

pub mod auth;
pub mod error;
pub mod http;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use quill_core::QuillService;
use quill_sqlite::SqliteStore;

/// Shared application state.
pub struct AppState {
    pub service: QuillService<SqliteStore>,
}

/// Create the API router.
pub fn create_router(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route("/users/me", get(http::me))
        .route("/folders", get(http::list_folders).post(http::create_folder))
        .route(
            "/folders/{id}",
            get(http::get_folder)
                .put(http::rename_folder)
                .delete(http::delete_folder),
        )
        .route("/tags", get(http::list_tags).post(http::create_tag))
        .route(
            "/tags/{id}",
            get(http::get_tag)
                .put(http::rename_tag)
                .delete(http::delete_tag),
        )
        .route("/notes", get(http::list_notes).post(http::create_note))
        .route(
            "/notes/{id}",
            get(http::get_note)
                .put(http::update_note)
                .delete(http::delete_note),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_auth,
        ));

    Router::new()
        .route("/users", post(http::register))
        .route("/login", post(http::login))
        .merge(protected)
        .fallback(http::fallback)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the server.
pub async fn serve(addr: &str, state: Arc<AppState>) -> Result<(), Box<dyn std::error::Error>> {
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("quill server listening on {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
