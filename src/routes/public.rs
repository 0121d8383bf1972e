use crate::{AppState, handlers};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};

// Phone photos routinely exceed axum's 2 MB default.
const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Public Router Module
///
/// Endpoints reachable without passing the route guard. Handlers here forward the
/// session when the request carries one but never require a seller role.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness check for load balancers.
        .route("/health", get(|| async { "ok" }))
        // GET /
        // Home page and redirect target of the route guard. Never role-restricted.
        .route("/", get(handlers::home))
        // GET /privacy-policy
        // Constant plaintext document.
        .route("/privacy-policy", get(handlers::privacy_policy))
        // GET /products/{uuid}
        // Product detail, proxied to the backend's /product/{uuid}.
        .route("/products/{uuid}", get(handlers::get_product))
        // POST /detect
        // Batik motif detection, multipart upload forwarded to the backend's /predict.
        .route(
            "/detect",
            post(handlers::detect_motif).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        // GET/POST/DELETE /auth/session
        // Session status, login exchange (writes both cookies) and logout (clears both).
        .route(
            "/auth/session",
            get(handlers::get_session)
                .post(handlers::create_session)
                .delete(handlers::delete_session),
        )
        // POST /seller/register
        // Open a seller account. Needs a session, not a seller role.
        .route("/seller/register", post(handlers::register_seller))
}
