use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, patch, post},
};

/// Seller Router Module
///
/// The seller dashboard. These routes are nested under the configured protected prefix
/// (`/dashboard` by default), so the route guard has already checked the access token
/// and the role claim before any handler here runs.
pub fn seller_routes() -> Router<AppState> {
    Router::new()
        // GET /dashboard
        // Store information of the logged-in seller.
        .route("/", get(handlers::seller_dashboard))
        // GET /dashboard/wallet
        // Balance and payout history.
        .route("/wallet", get(handlers::seller_wallet))
        // POST /dashboard/withdraw
        // Client-validated payout request.
        .route("/withdraw", post(handlers::withdraw))
        // PATCH /dashboard/profile
        // Forwarded as POST + X-HTTP-Method-Override: PATCH.
        .route("/profile", patch(handlers::update_seller_profile))
}
