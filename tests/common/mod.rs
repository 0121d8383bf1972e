#![allow(dead_code)]

use std::time::SystemTime;

use axum::http::{HeaderMap, HeaderValue, header};
use jsonwebtoken::{EncodingKey, Header, encode};
use serde_json::{Value, json};

// The edge never verifies signatures, so any secret works for minting test tokens.
const BACKEND_JWT_SECRET: &str = "backend-owned-secret-not-known-to-the-edge";

/// Mints an access token the way the backend would, with the given role claim.
pub fn access_token(role: Option<&str>) -> String {
    let now = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap()
        .as_secs();

    let mut claims = json!({
        "sub": "0b6f7c1e-2a54-4c1f-9d0e-5a1f0c9a7e11",
        "email": "penjual@ragamaya.id",
        "iat": now,
        "exp": now + 7 * 60 * 60,
    });
    if let Some(role) = role {
        claims["role"] = json!(role);
    }

    token_with_claims(claims)
}

/// Mints a token carrying exactly `claims`.
pub fn token_with_claims(claims: Value) -> String {
    let key = EncodingKey::from_secret(BACKEND_JWT_SECRET.as_bytes());
    encode(&Header::default(), &claims, &key).unwrap()
}

pub fn seller_token() -> String {
    access_token(Some("seller"))
}

pub fn buyer_token() -> String {
    access_token(Some("user"))
}

pub fn cookie_header(pairs: &[(&str, &str)]) -> String {
    pairs
        .iter()
        .map(|(name, value)| format!("{}={}", name, value))
        .collect::<Vec<_>>()
        .join("; ")
}

pub fn headers_with_cookies(pairs: &[(&str, &str)]) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::COOKIE,
        HeaderValue::from_str(&cookie_header(pairs)).unwrap(),
    );
    headers
}
