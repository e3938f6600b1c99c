//! Axum router configuration with middleware.
//!
//! Middleware: CORS, request tracing.
//!
//! When the configured `web_dir` (or `SWITCHBOARD_WEB_DIR`) points at an
//! existing directory, the chat UI is served from it. Relay routes take priority; unknown paths fall through
//! to the static files.

use axum::Router;
use axum::routing::{delete, get, post, put};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use crate::http::handlers;
use crate::state::AppState;

/// Build the complete router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        // Accounts
        .route(
            "/accounts",
            get(handlers::account::list_accounts).post(handlers::account::create_account),
        )
        .route("/accounts/add", post(handlers::account::create_account))
        .route("/accounts/{id}/update", put(handlers::account::update_account))
        .route("/accounts/{id}/delete", delete(handlers::account::delete_account))
        .route("/accounts/{id}/send", post(handlers::send::send_from_account))
        // Conversations (account-scoped)
        .route(
            "/accounts/{id}/messages/{phone}",
            get(handlers::message::account_messages),
        )
        .route("/accounts/{id}/contacts", get(handlers::message::account_contacts))
        // Conversations (default account unless ?account_id=)
        .route("/messages/{phone}", get(handlers::message::legacy_messages))
        .route("/contacts", get(handlers::message::legacy_contacts))
        // Status
        .route("/status", get(handlers::status::get_status));

    let web_dir = state.config.web_dir.clone();

    let mut router = Router::new()
        .route(
            "/webhook",
            get(handlers::webhook::verify_webhook).post(handlers::webhook::receive_webhook),
        )
        .route("/test-webhook", post(handlers::webhook::test_webhook))
        .route("/send", post(handlers::send::send))
        .route("/send-template", post(handlers::send::send_template))
        .route("/ws", get(handlers::ws::ws_handler))
        .route("/health", get(handlers::status::health_check))
        .nest("/api", api_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    if let Some(dir) = web_dir.filter(|dir| dir.is_dir()) {
        let index = dir.join("index.html");
        router = router.fallback_service(ServeDir::new(&dir).fallback(ServeFile::new(index)));
        tracing::info!(path = %dir.display(), "static chat UI serving enabled");
    }

    router
}
