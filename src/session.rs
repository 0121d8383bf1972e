use std::{
    collections::HashMap,
    sync::{Arc, Mutex, RwLock},
};

use axum::http::{HeaderMap, HeaderValue, header};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::Serialize;
use serde_json::Value;

use crate::error::CookieError;

/// Cookie holding the short-lived bearer token sent to the backend.
pub const ACCESS_TOKEN_COOKIE: &str = "access_token";
/// Cookie holding the long-lived token used to obtain a new access token.
pub const REFRESH_TOKEN_COOKIE: &str = "refresh_token";

/// Access token lifetime: 7 hours.
pub const ACCESS_TOKEN_MAX_AGE_SECS: i64 = 7 * 60 * 60;
/// Refresh token lifetime: 7 days.
pub const REFRESH_TOKEN_MAX_AGE_SECS: i64 = 7 * 24 * 60 * 60;

// --- Clock ---

/// Clock
///
/// Source of "now" for cookie expiry. Injected so tests can move time explicitly.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock used by the running service.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// FixedClock
///
/// A clock that only moves when told to.
#[derive(Debug)]
pub struct FixedClock {
    now: RwLock<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(now),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.write().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read().unwrap_or_else(|e| e.into_inner())
    }
}

/// ClockState
///
/// The concrete type used to share the clock across the application state.
pub type ClockState = Arc<dyn Clock>;

// --- Claims ---

/// SessionClaims
///
/// The subset of the access token payload this layer looks at. Each claim is read
/// on its own: the backend owns the token format, so a claim with an unexpected
/// shape is skipped instead of failing the whole token.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionClaims {
    pub sub: Option<String>,
    pub email: Option<String>,
    pub name: Option<String>,
    /// Role discriminator, e.g. "seller".
    pub role: Option<String>,
    pub exp: Option<i64>,
    pub iat: Option<i64>,
}

impl SessionClaims {
    /// Picks the known claims out of a decoded JWT payload.
    pub fn from_payload(payload: &Value) -> Self {
        Self {
            sub: payload.get("sub").and_then(claim_id),
            email: claim_str(payload, "email"),
            name: claim_str(payload, "name"),
            role: claim_str(payload, "role"),
            exp: claim_timestamp(payload, "exp"),
            iat: claim_timestamp(payload, "iat"),
        }
    }
}

fn claim_str(payload: &Value, key: &str) -> Option<String> {
    payload.get(key).and_then(Value::as_str).map(str::to_string)
}

// Subjects are strings or numeric ids depending on the issuer.
fn claim_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

// NumericDate may carry a fraction of a second.
fn claim_timestamp(payload: &Value, key: &str) -> Option<i64> {
    let value = payload.get(key)?;
    value
        .as_i64()
        .or_else(|| value.as_f64().map(|secs| secs.trunc() as i64))
}

/// decode_claims
///
/// Reads the payload of a JWT without checking its signature or expiry.
/// The result is advisory only: the backend verifies the token on every API call
/// and rejects anything it did not issue. Only a token that is not a JWT with a
/// JSON object payload yields `None`.
pub fn decode_claims(token: &str) -> Option<SessionClaims> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    match decode::<Value>(token, &DecodingKey::from_secret(&[]), &validation) {
        Ok(data) if data.claims.is_object() => Some(SessionClaims::from_payload(&data.claims)),
        Ok(_) => {
            tracing::debug!("access token payload is not an object, treating as logged out");
            None
        }
        Err(e) => {
            tracing::debug!(error = %e, "access token could not be decoded, treating as logged out");
            None
        }
    }
}

// --- Session value ---

/// Session
///
/// The authenticated session as seen by this layer: two opaque bearer tokens.
/// It is a plain value, read once per request and passed explicitly into every
/// call that talks to the backend. Never mutated in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

impl Session {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: non_empty(access_token.into()),
            refresh_token: non_empty(refresh_token.into()),
        }
    }

    /// A session with no tokens at all.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Builds the session from the `Cookie` headers of an incoming request.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let mut cookies = parse_cookie_header(headers);
        Self {
            access_token: cookies.remove(ACCESS_TOKEN_COOKIE).and_then(non_empty),
            refresh_token: cookies.remove(REFRESH_TOKEN_COOKIE).and_then(non_empty),
        }
    }

    pub fn has_access_token(&self) -> bool {
        self.access_token.is_some()
    }

    /// Decoded access token claims, or `None` when the token is absent or malformed.
    pub fn claims(&self) -> Option<SessionClaims> {
        self.access_token.as_deref().and_then(decode_claims)
    }

    pub fn is_logged_in(&self) -> bool {
        self.claims().is_some()
    }

    pub fn role(&self) -> Option<String> {
        self.claims().and_then(|claims| claims.role)
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

/// parse_cookie_header
///
/// Collects `name=value` pairs from every `Cookie` header. The first occurrence of a
/// name wins, matching how browsers order more specific cookies first.
pub fn parse_cookie_header(headers: &HeaderMap) -> HashMap<String, String> {
    let mut cookies = HashMap::new();
    for value in headers.get_all(header::COOKIE) {
        let Ok(raw) = value.to_str() else {
            continue;
        };
        for pair in raw.split(';') {
            if let Some((name, value)) = pair.split_once('=') {
                cookies
                    .entry(name.trim().to_string())
                    .or_insert_with(|| value.trim().trim_matches('"').to_string());
            }
        }
    }
    cookies
}

// --- Cookies ---

/// is_cookie_value
///
/// Whether `value` is made only of RFC 6265 cookie-octets: visible ASCII except
/// `"`, `,`, `;` and `\`. Anything else could break or extend the `Set-Cookie` line.
pub fn is_cookie_value(value: &str) -> bool {
    value
        .bytes()
        .all(|b| matches!(b, 0x21 | 0x23..=0x2B | 0x2D..=0x3A | 0x3C..=0x5B | 0x5D..=0x7E))
}

/// SessionCookie
///
/// A cookie write: name, value and lifetime. Clearing is a write with a zero max-age.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
    pub max_age: Duration,
    pub expires_at: DateTime<Utc>,
}

impl SessionCookie {
    pub fn issue(name: &str, value: &str, max_age_secs: i64, now: DateTime<Utc>) -> Self {
        let max_age = Duration::seconds(max_age_secs);
        Self {
            name: name.to_string(),
            value: value.to_string(),
            max_age,
            expires_at: now + max_age,
        }
    }

    pub fn cleared(name: &str) -> Self {
        Self {
            name: name.to_string(),
            value: String::new(),
            max_age: Duration::zero(),
            expires_at: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    pub fn is_cleared(&self) -> bool {
        self.max_age <= Duration::zero()
    }

    /// Renders the `Set-Cookie` header line. Cookies are site-wide (`Path=/`) and stay
    /// readable by page scripts, which attach the access token themselves.
    pub fn to_set_cookie(&self, secure: bool) -> String {
        let mut line = format!(
            "{}={}; Path=/; Max-Age={}; Expires={}; SameSite=Lax",
            self.name,
            self.value,
            self.max_age.num_seconds(),
            self.expires_at.format("%a, %d %b %Y %H:%M:%S GMT"),
        );
        if secure {
            line.push_str("; Secure");
        }
        line
    }
}

/// StoredCookie
///
/// What a cookie store hands back on read. `expires_at` is `None` when the store
/// does not know the expiry (e.g. cookies received on a request).
#[derive(Debug, Clone, PartialEq)]
pub struct StoredCookie {
    pub value: String,
    pub expires_at: Option<DateTime<Utc>>,
}

/// CookieStore
///
/// Contract for where session cookies live. Writes are batched so both tokens are
/// replaced or cleared together.
pub trait CookieStore: Send + Sync {
    fn get(&self, name: &str) -> Option<StoredCookie>;
    fn set_all(&self, cookies: &[SessionCookie]);
    fn remove_all(&self, names: &[&str]);
}

/// MemoryCookieStore
///
/// A cookie jar held in memory, e.g. for a native client or tests.
#[derive(Debug, Default)]
pub struct MemoryCookieStore {
    jar: RwLock<HashMap<String, StoredCookie>>,
}

impl MemoryCookieStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CookieStore for MemoryCookieStore {
    fn get(&self, name: &str) -> Option<StoredCookie> {
        let jar = self.jar.read().unwrap_or_else(|e| e.into_inner());
        jar.get(name).cloned()
    }

    fn set_all(&self, cookies: &[SessionCookie]) {
        let mut jar = self.jar.write().unwrap_or_else(|e| e.into_inner());
        for cookie in cookies {
            if cookie.is_cleared() {
                jar.remove(&cookie.name);
                continue;
            }
            jar.insert(
                cookie.name.clone(),
                StoredCookie {
                    value: cookie.value.clone(),
                    expires_at: Some(cookie.expires_at),
                },
            );
        }
    }

    fn remove_all(&self, names: &[&str]) {
        let mut jar = self.jar.write().unwrap_or_else(|e| e.into_inner());
        for name in names {
            jar.remove(*name);
        }
    }
}

/// RequestCookies
///
/// A cookie store scoped to one HTTP exchange: reads come from the request's
/// `Cookie` header, writes are queued as `Set-Cookie` lines for the response.
#[derive(Debug)]
pub struct RequestCookies {
    incoming: RwLock<HashMap<String, String>>,
    outgoing: Mutex<Vec<SessionCookie>>,
    secure: bool,
}

impl RequestCookies {
    pub fn from_headers(headers: &HeaderMap, secure: bool) -> Self {
        Self {
            incoming: RwLock::new(parse_cookie_header(headers)),
            outgoing: Mutex::new(Vec::new()),
            secure,
        }
    }

    /// Drains the queued writes as `Set-Cookie` header values. Fails as a whole if
    /// any queued cookie cannot be rendered, so a session is never half-written.
    pub fn take_set_cookie_headers(&self) -> Result<Vec<HeaderValue>, CookieError> {
        let mut outgoing = self.outgoing.lock().unwrap_or_else(|e| e.into_inner());
        outgoing
            .drain(..)
            .map(|cookie| {
                if !is_cookie_value(&cookie.value) {
                    return Err(CookieError::InvalidValue(cookie.name));
                }
                HeaderValue::from_str(&cookie.to_set_cookie(self.secure))
                    .map_err(|_| CookieError::InvalidValue(cookie.name))
            })
            .collect()
    }
}

impl CookieStore for RequestCookies {
    fn get(&self, name: &str) -> Option<StoredCookie> {
        let incoming = self.incoming.read().unwrap_or_else(|e| e.into_inner());
        incoming.get(name).map(|value| StoredCookie {
            value: value.clone(),
            expires_at: None,
        })
    }

    fn set_all(&self, cookies: &[SessionCookie]) {
        let mut incoming = self.incoming.write().unwrap_or_else(|e| e.into_inner());
        let mut outgoing = self.outgoing.lock().unwrap_or_else(|e| e.into_inner());
        for cookie in cookies {
            if cookie.is_cleared() {
                incoming.remove(&cookie.name);
            } else {
                incoming.insert(cookie.name.clone(), cookie.value.clone());
            }
            outgoing.push(cookie.clone());
        }
    }

    fn remove_all(&self, names: &[&str]) {
        let cleared: Vec<SessionCookie> = names.iter().map(|name| SessionCookie::cleared(name)).collect();
        self.set_all(&cleared);
    }
}

// --- Session store ---

/// SessionStore
///
/// Reads and replaces the session held in a `CookieStore`. Reads are pure; `login`
/// and `logout` replace or clear both cookies in one store operation.
#[derive(Clone)]
pub struct SessionStore {
    cookies: Arc<dyn CookieStore>,
    clock: ClockState,
}

impl SessionStore {
    pub fn new(cookies: Arc<dyn CookieStore>, clock: ClockState) -> Self {
        Self { cookies, clock }
    }

    pub fn get_session(&self) -> Session {
        Session {
            access_token: self.live_value(ACCESS_TOKEN_COOKIE),
            refresh_token: self.live_value(REFRESH_TOKEN_COOKIE),
        }
    }

    pub fn is_logged_in(&self) -> bool {
        self.get_session().is_logged_in()
    }

    pub fn get_role(&self) -> Option<String> {
        self.get_session().role()
    }

    /// Stores a freshly issued token pair, replacing whatever was there.
    pub fn login(&self, access_token: &str, refresh_token: &str) {
        let now = self.clock.now();
        self.cookies.set_all(&[
            SessionCookie::issue(ACCESS_TOKEN_COOKIE, access_token, ACCESS_TOKEN_MAX_AGE_SECS, now),
            SessionCookie::issue(REFRESH_TOKEN_COOKIE, refresh_token, REFRESH_TOKEN_MAX_AGE_SECS, now),
        ]);
        tracing::debug!("session cookies written");
    }

    pub fn logout(&self) {
        self.cookies
            .remove_all(&[ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE]);
        tracing::debug!("session cookies cleared");
    }

    fn live_value(&self, name: &str) -> Option<String> {
        let cookie = self.cookies.get(name)?;
        if let Some(expires_at) = cookie.expires_at {
            if expires_at <= self.clock.now() {
                return None;
            }
        }
        non_empty(cookie.value)
    }
}
