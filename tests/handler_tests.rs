mod common;

use std::sync::Arc;

use axum::{
    body::{Body, to_bytes},
    http::{Method, Request, Response, StatusCode, header},
};
use chrono::{TimeZone, Utc};
use ragamaya_edge::{
    AppConfig, AppState, create_router,
    api::{ApiMethod, ApiState, MockRequestApi},
    config::Env,
    handlers::PRIVACY_POLICY,
    session::{ClockState, FixedClock},
};
use serde_json::{Value, json};
use tower::ServiceExt;

use common::{buyer_token, cookie_header, seller_token};

// --- Helpers ---

fn app_with(api: Arc<MockRequestApi>, config: AppConfig) -> axum::Router {
    let clock = Arc::new(FixedClock::new(
        Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap(),
    ));
    create_router(AppState::new(api as ApiState, clock as ClockState, config))
}

fn app(api: Arc<MockRequestApi>) -> axum::Router {
    app_with(api, AppConfig::default())
}

fn ok_backend() -> Arc<MockRequestApi> {
    Arc::new(MockRequestApi::responding(json!({
        "status": 200,
        "message": "ok",
        "body": { "balance": 125000 }
    })))
}

fn json_request(method: Method, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::COOKIE, cookie_header(&[("access_token", token)]));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get_request(uri: &str, cookies: &[(&str, &str)]) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if !cookies.is_empty() {
        builder = builder.header(header::COOKIE, cookie_header(cookies));
    }
    builder.body(Body::empty()).unwrap()
}

async fn body_json(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn set_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect()
}

// --- Public pages ---

#[tokio::test]
async fn test_health_check() {
    let response = app(ok_backend()).oneshot(get_request("/health", &[])).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_privacy_policy_is_constant_plaintext() {
    let response = app(ok_backend())
        .oneshot(get_request("/privacy-policy", &[]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "text/plain; charset=utf-8"
    );
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(bytes, PRIVACY_POLICY.as_bytes());
}

#[tokio::test]
async fn test_home_reports_session() {
    let token = seller_token();
    let response = app(ok_backend())
        .oneshot(get_request("/", &[("access_token", token.as_str())]))
        .await
        .unwrap();

    let page = body_json(response).await;
    assert_eq!(page["app"], "RagaMaya");
    assert_eq!(page["logged_in"], true);
    assert_eq!(page["role"], "seller");
}

#[tokio::test]
async fn test_product_detail_is_proxied_verbatim() {
    let envelope = json!({
        "status": 200,
        "message": "ok",
        "body": { "uuid": "abc-123", "name": "Batik X" }
    });
    let api = Arc::new(MockRequestApi::responding(envelope.clone()));

    let response = app(api.clone())
        .oneshot(get_request("/products/abc-123", &[]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, envelope);

    let calls = api.calls();
    assert_eq!(calls[0].path, "/product/abc-123");
    assert_eq!(calls[0].method, ApiMethod::Get);
    assert!(calls[0].bearer.is_none());
}

#[tokio::test]
async fn test_product_not_found_passes_backend_envelope_through() {
    let envelope = json!({ "status": 404, "message": "not found" });
    let api = Arc::new(MockRequestApi::rejecting(StatusCode::NOT_FOUND, envelope.clone()));

    let response = app(api)
        .oneshot(get_request("/products/missing", &[]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await, envelope);
}

#[tokio::test]
async fn test_unreachable_backend_is_bad_gateway() {
    let response = app(Arc::new(MockRequestApi::unreachable()))
        .oneshot(get_request("/products/abc-123", &[]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = body_json(response).await;
    assert_eq!(body["status"], 502);
    assert!(body["message"].as_str().unwrap().starts_with("Network error"));
}

// --- Motif detection ---

const BOUNDARY: &str = "ragamaya-test-boundary";

fn multipart_request(parts: &[(&str, Option<&str>, &str, &[u8])]) -> Request<Body> {
    let mut body = Vec::new();
    for (name, file_name, content_type, bytes) in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        let disposition = match file_name {
            Some(file_name) => format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                name, file_name
            ),
            None => format!("Content-Disposition: form-data; name=\"{}\"\r\n", name),
        };
        body.extend_from_slice(disposition.as_bytes());
        body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    Request::builder()
        .method(Method::POST)
        .uri("/detect")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn test_detect_forwards_upload_as_multipart() {
    let envelope = json!({ "status": 200, "message": "ok", "body": { "motif": "Kawung" } });
    let api = Arc::new(MockRequestApi::responding(envelope.clone()));

    let response = app(api.clone())
        .oneshot(multipart_request(&[(
            "image",
            Some("kain.jpg"),
            "image/jpeg",
            [0xFFu8, 0xD8, 0xFF, 0xE0].as_slice(),
        )]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, envelope);

    let calls = api.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].path, "/predict");
    assert_eq!(calls[0].wire_method, ApiMethod::Post);
    assert!(calls[0].multipart);
    assert!(calls[0].json.is_none());
}

#[tokio::test]
async fn test_detect_without_image_is_not_sent() {
    let api = ok_backend();

    let response = app(api.clone())
        .oneshot(multipart_request(&[("note", None, "text/plain", b"no photo".as_slice())]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(api.calls().is_empty());
}

// --- Session endpoints ---

#[tokio::test]
async fn test_create_session_sets_both_cookies() {
    let token = seller_token();
    let response = app(ok_backend())
        .oneshot(json_request(
            Method::POST,
            "/auth/session",
            None,
            json!({ "access_token": token, "refresh_token": "refresh-abc" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let cookies = set_cookies(&response);
    assert_eq!(cookies.len(), 2);
    assert!(cookies[0].starts_with(&format!("access_token={}; Path=/; Max-Age=25200;", token)));
    assert!(cookies[1].starts_with("refresh_token=refresh-abc; Path=/; Max-Age=604800;"));
    assert!(cookies.iter().all(|c| !c.contains("Secure")));

    let status = body_json(response).await;
    assert_eq!(status, json!({ "logged_in": true, "role": "seller" }));
}

#[tokio::test]
async fn test_create_session_marks_cookies_secure_in_production() {
    let config = AppConfig {
        env: Env::Production,
        ..AppConfig::default()
    };
    let response = app_with(ok_backend(), config)
        .oneshot(json_request(
            Method::POST,
            "/auth/session",
            None,
            json!({ "access_token": seller_token(), "refresh_token": "refresh-abc" }),
        ))
        .await
        .unwrap();

    assert!(set_cookies(&response).iter().all(|c| c.ends_with("; Secure")));
}

#[tokio::test]
async fn test_create_session_rejects_blank_tokens() {
    let response = app(ok_backend())
        .oneshot(json_request(
            Method::POST,
            "/auth/session",
            None,
            json!({ "access_token": "  ", "refresh_token": "refresh-abc" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(set_cookies(&response).is_empty());
}

#[tokio::test]
async fn test_create_session_rejects_tokens_that_are_not_cookie_values() {
    for refresh_token in [
        "r1; Domain=evil.example; Max-Age=99999999",
        "r1\u{7f}x",
        "r1 x",
    ] {
        let response = app(ok_backend())
            .oneshot(json_request(
                Method::POST,
                "/auth/session",
                None,
                json!({ "access_token": seller_token(), "refresh_token": refresh_token }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{:?}", refresh_token);
        assert!(
            set_cookies(&response).is_empty(),
            "a rejected login must not write either cookie"
        );
        let body = body_json(response).await;
        assert_eq!(body["status"], 400);
    }
}

#[tokio::test]
async fn test_logout_clears_both_cookies() {
    let token = seller_token();
    let response = app(ok_backend())
        .oneshot(
            Request::builder()
                .method(Method::DELETE)
                .uri("/auth/session")
                .header(
                    header::COOKIE,
                    cookie_header(&[("access_token", token.as_str()), ("refresh_token", "refresh-abc")]),
                )
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let cookies = set_cookies(&response);
    assert_eq!(cookies.len(), 2);
    assert!(cookies[0].starts_with("access_token=; Path=/; Max-Age=0;"));
    assert!(cookies[1].starts_with("refresh_token=; Path=/; Max-Age=0;"));
    assert_eq!(body_json(response).await, json!({ "logged_in": false }));
}

#[tokio::test]
async fn test_session_status_with_malformed_token_is_logged_out() {
    let response = app(ok_backend())
        .oneshot(get_request("/auth/session", &[("access_token", "garbage")]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({ "logged_in": false }));
}

// --- Seller onboarding ---

#[tokio::test]
async fn test_register_seller_requires_session() {
    let api = ok_backend();
    let response = app(api.clone())
        .oneshot(json_request(
            Method::POST,
            "/seller/register",
            None,
            json!({ "name": "Toko", "phone": "081234567890", "address": "Solo" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(api.calls().is_empty());
}

#[tokio::test]
async fn test_register_seller_validates_before_calling_backend() {
    let api = ok_backend();
    let token = buyer_token();
    let response = app(api.clone())
        .oneshot(json_request(
            Method::POST,
            "/seller/register",
            Some(token.as_str()),
            json!({ "name": "Toko", "phone": "12ab", "address": "Solo" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["status"], 400);
    assert_eq!(body["message"], "Phone number must be 8 to 15 digits");
    assert!(api.calls().is_empty());
}

#[tokio::test]
async fn test_register_seller_forwards_form() {
    let api = ok_backend();
    let token = buyer_token();
    let response = app(api.clone())
        .oneshot(json_request(
            Method::POST,
            "/seller/register",
            Some(token.as_str()),
            json!({ "name": "Toko Batik Sekar", "phone": "+6281234567890", "address": "Solo" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let calls = api.calls();
    assert_eq!(calls[0].path, "/seller/register");
    assert_eq!(calls[0].override_header.as_deref(), Some("POST"));
    assert_eq!(
        calls[0].json,
        Some(json!({ "name": "Toko Batik Sekar", "phone": "+6281234567890", "address": "Solo" }))
    );
}

// --- Seller dashboard ---

#[tokio::test]
async fn test_withdraw_validation_failure_is_not_sent() {
    let api = ok_backend();
    let token = seller_token();
    let response = app(api.clone())
        .oneshot(json_request(
            Method::POST,
            "/dashboard/withdraw",
            Some(token.as_str()),
            json!({ "amount": 0, "bank_name": "BCA", "account_number": "123", "account_name": "Sekar" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(api.calls().is_empty());
}

#[tokio::test]
async fn test_withdraw_is_forwarded_as_post() {
    let api = ok_backend();
    let token = seller_token();
    let response = app(api.clone())
        .oneshot(json_request(
            Method::POST,
            "/dashboard/withdraw",
            Some(token.as_str()),
            json!({ "amount": 50000, "bank_name": "BCA", "account_number": "1234567890", "account_name": "Sekar" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let calls = api.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].path, "/wallet/withdraw");
    assert_eq!(calls[0].wire_method, ApiMethod::Post);
    assert_eq!(calls[0].json.as_ref().unwrap()["amount"], 50000);
}

#[tokio::test]
async fn test_rejected_envelope_surfaces_its_status() {
    let envelope = json!({ "status": 400, "message": "saldo tidak cukup" });
    let api = Arc::new(MockRequestApi::responding(envelope.clone()));
    let token = seller_token();

    let response = app(api)
        .oneshot(json_request(
            Method::POST,
            "/dashboard/withdraw",
            Some(token.as_str()),
            json!({ "amount": 999999999, "bank_name": "BCA", "account_number": "1234567890", "account_name": "Sekar" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await, envelope);
}

#[tokio::test]
async fn test_profile_update_uses_patch_override() {
    let api = ok_backend();
    let token = seller_token();
    let response = app(api.clone())
        .oneshot(json_request(
            Method::PATCH,
            "/dashboard/profile",
            Some(token.as_str()),
            json!({ "name": "Toko Batik Sekar" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let calls = api.calls();
    assert_eq!(calls[0].path, "/seller/update");
    assert_eq!(calls[0].method, ApiMethod::Patch);
    assert_eq!(calls[0].wire_method, ApiMethod::Post);
    assert_eq!(calls[0].override_header.as_deref(), Some("PATCH"));
    assert_eq!(calls[0].json, Some(json!({ "name": "Toko Batik Sekar" })));
}

#[tokio::test]
async fn test_wallet_reads_backend() {
    let api = ok_backend();
    let token = seller_token();
    let response = app(api.clone())
        .oneshot(get_request("/dashboard/wallet", &[("access_token", token.as_str())]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["body"]["balance"], 125000);
    assert_eq!(api.calls()[0].path, "/wallet/info");
    assert!(api.calls()[0].override_header.is_none());
}
