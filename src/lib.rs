use axum::{
    Router,
    extract::FromRef,
    http::HeaderName,
    middleware,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Request/session layer.
pub mod api;
pub mod guard;
pub mod session;

// HTTP surface.
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod routes;

use routes::{public, seller};

// --- Public Re-exports ---

pub use api::{ApiState, HttpRequestApi, MockRequestApi, RequestApi};
pub use config::AppConfig;
pub use guard::RouteGuard;
pub use session::{ClockState, Session, SessionStore, SystemClock};

/// ApiDoc
///
/// OpenAPI document of the edge service, served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::home, handlers::privacy_policy, handlers::get_product, handlers::detect_motif,
        handlers::get_session, handlers::create_session, handlers::delete_session,
        handlers::register_seller, handlers::seller_dashboard, handlers::seller_wallet,
        handlers::withdraw, handlers::update_seller_profile
    ),
    components(
        schemas(
            models::StatusMessage, models::EnvelopeDoc, models::DetectUpload, models::LoginTokens,
            models::SessionStatus, models::HomePage, models::WithdrawRequest,
            models::RegisterSellerRequest, models::UpdateSellerProfileRequest,
        )
    ),
    tags(
        (name = "ragamaya-edge", description = "RagaMaya request/session layer")
    )
)]
struct ApiDoc;

/// AppState
///
/// Shared, cheaply clonable container of everything handlers and middleware need.
/// The session itself is never stored here: it is read from each request.
#[derive(Clone)]
pub struct AppState {
    /// Backend client.
    pub api: ApiState,
    /// Time source for cookie expiry.
    pub clock: ClockState,
    /// Seller-area guard built from the configuration.
    pub guard: RouteGuard,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(api: ApiState, clock: ClockState, config: AppConfig) -> Self {
        Self {
            api,
            clock,
            guard: RouteGuard::from_config(&config),
            config,
        }
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for ApiState {
    fn from_ref(app_state: &AppState) -> ApiState {
        app_state.api.clone()
    }
}

impl FromRef<AppState> for ClockState {
    fn from_ref(app_state: &AppState) -> ClockState {
        app_state.clock.clone()
    }
}

impl FromRef<AppState> for RouteGuard {
    fn from_ref(app_state: &AppState) -> RouteGuard {
        app_state.guard.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// create_router
///
/// Assembles the routes, wraps them in the route guard, then adds the
/// observability and CORS layers.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let mut routes = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes());

    // Mounted under the guard's own normalized prefix so both agree on what is protected.
    let prefix = state.guard.protected_prefix().to_string();
    if prefix.is_empty() {
        tracing::warn!("no protected prefix configured, seller routes not mounted");
    } else {
        routes = routes.nest(&prefix, seller::seller_routes());
    }

    let base_router = routes
        // Runs before every handler; paths outside the protected prefix pass straight through.
        .layer(middleware::from_fn_with_state(
            state.clone(),
            guard::route_guard,
        ))
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(
                    x_request_id.clone(),
                    MakeRequestUuid,
                ))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Span for one HTTP exchange, correlated by the `x-request-id` header.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
