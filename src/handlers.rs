use std::sync::Arc;

use axum::{
    Json,
    extract::{Multipart, Path, State},
    http::{HeaderMap, header},
    response::{AppendHeaders, IntoResponse},
};

use reqwest::multipart::{Form, Part};

use crate::{
    api::{ApiRequest, ApiState, Envelope},
    config::AppConfig,
    error::{ApiError, AppError},
    models::{
        DetectUpload, EnvelopeDoc, HomePage, LoginTokens, RegisterSellerRequest, SessionStatus,
        StatusMessage, UpdateSellerProfileRequest, WithdrawRequest,
    },
    session::{ClockState, RequestCookies, Session, SessionStore},
};

/// Fixed plaintext served at GET /privacy-policy.
pub const PRIVACY_POLICY: &str = include_str!("privacy_policy.txt");

// Backend paths called by the page handlers.
const SELLER_INFO_PATH: &str = "/seller/info";
const SELLER_REGISTER_PATH: &str = "/seller/register";
const SELLER_UPDATE_PATH: &str = "/seller/update";
const WALLET_INFO_PATH: &str = "/wallet/info";
const WALLET_WITHDRAW_PATH: &str = "/wallet/withdraw";
const DETECT_PATH: &str = "/predict";

/// Multipart field that must carry the photo to classify.
pub const DETECT_IMAGE_FIELD: &str = "image";

/// call_backend
///
/// Issues one backend call and applies the envelope rule: only `status == 200`
/// counts as success, whatever the HTTP status was.
async fn call_backend(
    api: &ApiState,
    session: &Session,
    request: ApiRequest,
) -> Result<Json<Envelope>, AppError> {
    let envelope = api.request(session, request).await?;
    if !envelope.is_ok() {
        return Err(AppError::Rejected(envelope));
    }
    Ok(Json(envelope))
}

fn session_status(session: &Session) -> SessionStatus {
    SessionStatus {
        logged_in: session.is_logged_in(),
        role: session.role(),
    }
}

// --- Public Pages ---

/// home
///
/// [Public Route] Landing page, also the redirect target of the route guard.
#[utoipa::path(
    get,
    path = "/",
    responses((status = 200, description = "Home", body = HomePage))
)]
pub async fn home(headers: HeaderMap) -> Json<HomePage> {
    let session = Session::from_headers(&headers);
    Json(HomePage {
        app: "RagaMaya".to_string(),
        logged_in: session.is_logged_in(),
        role: session.role(),
    })
}

/// privacy_policy
///
/// [Public Route] Constant plaintext document.
#[utoipa::path(
    get,
    path = "/privacy-policy",
    responses((status = 200, description = "Privacy policy", content_type = "text/plain; charset=utf-8", body = String))
)]
pub async fn privacy_policy() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        PRIVACY_POLICY,
    )
}

/// get_product
///
/// [Public Route] Product detail page. The session is forwarded when present so the
/// backend can personalise the reply, but it is not required.
#[utoipa::path(
    get,
    path = "/products/{uuid}",
    params(("uuid" = String, Path, description = "Product UUID")),
    responses(
        (status = 200, description = "Product", body = EnvelopeDoc),
        (status = 404, description = "Not Found", body = EnvelopeDoc)
    )
)]
pub async fn get_product(
    State(api): State<ApiState>,
    Path(uuid): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Envelope>, AppError> {
    let session = Session::from_headers(&headers);
    call_backend(&api, &session, ApiRequest::get(format!("/product/{}", uuid))).await
}

/// detect_motif
///
/// [Public Route] Batik motif detection. The upload is re-sent to the backend as
/// multipart, field by field, keeping file names and content types.
#[utoipa::path(
    post,
    path = "/detect",
    request_body(content = DetectUpload, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Detected motif", body = EnvelopeDoc),
        (status = 400, description = "No image in the upload", body = StatusMessage)
    )
)]
pub async fn detect_motif(
    State(api): State<ApiState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<Envelope>, AppError> {
    let session = Session::from_headers(&headers);

    let mut form = Form::new();
    let mut has_image = false;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(e.body_text()))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(e.body_text()))?;

        if name == DETECT_IMAGE_FIELD && !bytes.is_empty() {
            has_image = true;
        }

        let mut part = Part::bytes(bytes.to_vec());
        if let Some(file_name) = file_name {
            part = part.file_name(file_name);
        }
        if let Some(content_type) = content_type {
            part = part.mime_str(&content_type).map_err(|_| {
                AppError::Validation(format!("Unsupported content type {}", content_type))
            })?;
        }
        form = form.part(name, part);
    }

    if !has_image {
        return Err(AppError::Validation("An image is required".to_string()));
    }

    tracing::debug!("forwarding detection upload");
    call_backend(&api, &session, ApiRequest::post(DETECT_PATH).multipart(form)).await
}

// --- Session ---

fn request_session_store(
    headers: &HeaderMap,
    config: &AppConfig,
    clock: ClockState,
) -> (Arc<RequestCookies>, SessionStore) {
    let cookies = Arc::new(RequestCookies::from_headers(headers, config.secure_cookies()));
    let store = SessionStore::new(cookies.clone(), clock);
    (cookies, store)
}

/// get_session
///
/// [Public Route] Reports whether the request carries a usable session and its role claim.
#[utoipa::path(
    get,
    path = "/auth/session",
    responses((status = 200, description = "Session", body = SessionStatus))
)]
pub async fn get_session(headers: HeaderMap) -> Json<SessionStatus> {
    Json(session_status(&Session::from_headers(&headers)))
}

/// create_session
///
/// [Public Route] Completes the login exchange: stores the token pair as the
/// `access_token` (7h) and `refresh_token` (7d) cookies.
#[utoipa::path(
    post,
    path = "/auth/session",
    request_body = LoginTokens,
    responses(
        (status = 200, description = "Session created", body = SessionStatus),
        (status = 400, description = "Missing token or not a valid cookie value", body = StatusMessage)
    )
)]
pub async fn create_session(
    State(config): State<AppConfig>,
    State(clock): State<ClockState>,
    headers: HeaderMap,
    Json(tokens): Json<LoginTokens>,
) -> Result<impl IntoResponse, AppError> {
    tokens.validate().map_err(AppError::Validation)?;

    let (cookies, store) = request_session_store(&headers, &config, clock);
    store.login(&tokens.access_token, &tokens.refresh_token);

    let status = session_status(&store.get_session());
    tracing::info!(role = ?status.role, "session created");

    let set_cookies: Vec<_> = cookies
        .take_set_cookie_headers()?
        .into_iter()
        .map(|value| (header::SET_COOKIE, value))
        .collect();
    Ok((AppendHeaders(set_cookies), Json(status)))
}

/// delete_session
///
/// [Public Route] Logout: clears both session cookies.
#[utoipa::path(
    delete,
    path = "/auth/session",
    responses((status = 200, description = "Logged out", body = SessionStatus))
)]
pub async fn delete_session(
    State(config): State<AppConfig>,
    State(clock): State<ClockState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let (cookies, store) = request_session_store(&headers, &config, clock);
    store.logout();

    let set_cookies: Vec<_> = cookies
        .take_set_cookie_headers()?
        .into_iter()
        .map(|value| (header::SET_COOKIE, value))
        .collect();
    Ok((
        AppendHeaders(set_cookies),
        Json(session_status(&store.get_session())),
    ))
}

// --- Seller Onboarding ---

/// register_seller
///
/// [Session Route] Opens a seller account for the logged-in user. Any role may call it;
/// a session is required because the backend ties the store to the token's user.
#[utoipa::path(
    post,
    path = "/seller/register",
    request_body = RegisterSellerRequest,
    responses(
        (status = 200, description = "Registered", body = EnvelopeDoc),
        (status = 400, description = "Invalid form", body = StatusMessage),
        (status = 401, description = "No session", body = StatusMessage)
    )
)]
pub async fn register_seller(
    State(api): State<ApiState>,
    headers: HeaderMap,
    Json(form): Json<RegisterSellerRequest>,
) -> Result<Json<Envelope>, AppError> {
    let session = Session::from_headers(&headers);
    if !session.has_access_token() {
        return Err(AppError::Unauthenticated);
    }
    form.validate().map_err(AppError::Validation)?;

    let body = serde_json::to_value(&form).map_err(ApiError::from)?;
    call_backend(&api, &session, ApiRequest::post(SELLER_REGISTER_PATH).json(body)).await
}

// --- Seller Dashboard (guarded) ---

/// seller_dashboard
///
/// [Seller Route] Dashboard landing: the seller's own store information.
#[utoipa::path(
    get,
    path = "/dashboard",
    responses(
        (status = 200, description = "Seller info", body = EnvelopeDoc),
        (status = 307, description = "Not a seller, redirected home")
    )
)]
pub async fn seller_dashboard(
    State(api): State<ApiState>,
    headers: HeaderMap,
) -> Result<Json<Envelope>, AppError> {
    let session = Session::from_headers(&headers);
    call_backend(&api, &session, ApiRequest::get(SELLER_INFO_PATH)).await
}

/// seller_wallet
///
/// [Seller Route] Wallet balance and payout history.
#[utoipa::path(
    get,
    path = "/dashboard/wallet",
    responses((status = 200, description = "Wallet", body = EnvelopeDoc))
)]
pub async fn seller_wallet(
    State(api): State<ApiState>,
    headers: HeaderMap,
) -> Result<Json<Envelope>, AppError> {
    let session = Session::from_headers(&headers);
    call_backend(&api, &session, ApiRequest::get(WALLET_INFO_PATH)).await
}

/// withdraw
///
/// [Seller Route] Payout request. The form is validated before any backend call.
#[utoipa::path(
    post,
    path = "/dashboard/withdraw",
    request_body = WithdrawRequest,
    responses(
        (status = 200, description = "Withdrawal requested", body = EnvelopeDoc),
        (status = 400, description = "Invalid form", body = StatusMessage)
    )
)]
pub async fn withdraw(
    State(api): State<ApiState>,
    headers: HeaderMap,
    Json(form): Json<WithdrawRequest>,
) -> Result<Json<Envelope>, AppError> {
    form.validate().map_err(AppError::Validation)?;

    let session = Session::from_headers(&headers);
    let body = serde_json::to_value(&form).map_err(ApiError::from)?;
    call_backend(&api, &session, ApiRequest::post(WALLET_WITHDRAW_PATH).json(body)).await
}

/// update_seller_profile
///
/// [Seller Route] Partial profile update. Sent as POST with the PATCH override
/// header, since native PATCH is blocked in some deployments.
#[utoipa::path(
    patch,
    path = "/dashboard/profile",
    request_body = UpdateSellerProfileRequest,
    responses((status = 200, description = "Updated", body = EnvelopeDoc))
)]
pub async fn update_seller_profile(
    State(api): State<ApiState>,
    headers: HeaderMap,
    Json(form): Json<UpdateSellerProfileRequest>,
) -> Result<Json<Envelope>, AppError> {
    let session = Session::from_headers(&headers);
    let body = serde_json::to_value(&form).map_err(ApiError::from)?;
    call_backend(
        &api,
        &session,
        ApiRequest::patch(SELLER_UPDATE_PATH)
            .json(body)
            .with_override_patch(),
    )
    .await
}
