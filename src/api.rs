use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::http::{StatusCode, header};
use reqwest::multipart::Form;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::{error::ApiError, session::Session};

/// Header carrying the intended verb when the wire method differs from it.
pub const METHOD_OVERRIDE_HEADER: &str = "x-http-method-override";

const JSON_CONTENT_TYPE: &str = "application/json";

// --- Request description ---

/// ApiMethod
///
/// HTTP verbs the backend understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl ApiMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApiMethod::Get => "GET",
            ApiMethod::Post => "POST",
            ApiMethod::Put => "PUT",
            ApiMethod::Patch => "PATCH",
            ApiMethod::Delete => "DELETE",
        }
    }

    fn to_reqwest(self) -> reqwest::Method {
        match self {
            ApiMethod::Get => reqwest::Method::GET,
            ApiMethod::Post => reqwest::Method::POST,
            ApiMethod::Put => reqwest::Method::PUT,
            ApiMethod::Patch => reqwest::Method::PATCH,
            ApiMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

/// RequestBody
///
/// For GET a JSON body becomes the query string; for every other verb it is the payload.
/// Multipart bodies carry their own boundary-bearing content type.
#[derive(Debug, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(Value),
    Multipart(Form),
}

/// ApiRequest
///
/// One backend call: path relative to the base URL, verb, body and the PATCH workaround flag.
#[derive(Debug)]
pub struct ApiRequest {
    pub path: String,
    pub method: ApiMethod,
    pub body: RequestBody,
    /// Send as POST and announce PATCH through the override header, for
    /// environments that block native PATCH.
    pub override_patch: bool,
}

impl ApiRequest {
    pub fn new(method: ApiMethod, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method,
            body: RequestBody::Empty,
            override_patch: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(ApiMethod::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(ApiMethod::Post, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(ApiMethod::Put, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(ApiMethod::Patch, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(ApiMethod::Delete, path)
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = RequestBody::Json(body);
        self
    }

    pub fn multipart(mut self, form: Form) -> Self {
        self.body = RequestBody::Multipart(form);
        self
    }

    pub fn with_override_patch(mut self) -> Self {
        self.override_patch = true;
        self
    }

    /// The verb actually put on the wire.
    pub fn wire_method(&self) -> ApiMethod {
        if self.override_patch {
            ApiMethod::Post
        } else {
            self.method
        }
    }

    /// Value of the method-override header, set on every non-GET call.
    pub fn override_header(&self) -> Option<&'static str> {
        if self.override_patch {
            Some(ApiMethod::Patch.as_str())
        } else if self.method != ApiMethod::Get {
            Some(self.method.as_str())
        } else {
            None
        }
    }

    pub fn is_multipart(&self) -> bool {
        matches!(self.body, RequestBody::Multipart(_))
    }
}

/// query_pairs
///
/// Flattens a JSON object into query parameters. Strings are sent verbatim, `null`
/// is skipped and any other value is sent as its JSON text.
pub fn query_pairs(value: &Value) -> Vec<(String, String)> {
    let Some(object) = value.as_object() else {
        tracing::warn!("GET body is not a JSON object, no query parameters sent");
        return Vec::new();
    };
    object
        .iter()
        .filter_map(|(key, value)| match value {
            Value::Null => None,
            Value::String(s) => Some((key.clone(), s.clone())),
            other => Some((key.clone(), other.to_string())),
        })
        .collect()
}

// --- Envelope ---

/// Envelope
///
/// The backend's JSON reply, `{status, message, body?}`, kept exactly as received.
/// The HTTP status of a 2xx reply says nothing about the outcome: callers check
/// `is_ok()` (envelope `status == 200`) themselves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Envelope(Value);

impl Envelope {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn status(&self) -> Option<i64> {
        self.0.get("status").and_then(Value::as_i64)
    }

    pub fn message(&self) -> Option<&str> {
        self.0.get("message").and_then(Value::as_str)
    }

    pub fn body(&self) -> Option<&Value> {
        self.0.get("body")
    }

    pub fn is_ok(&self) -> bool {
        self.status() == Some(200)
    }

    pub fn body_as<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        let body = self.body().cloned().unwrap_or(Value::Null);
        Ok(serde_json::from_value(body)?)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }
}

impl From<Value> for Envelope {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

// --- Client contract ---

/// RequestApi
///
/// Contract for talking to the RagaMaya backend. The session is passed in on every
/// call so the token is never cached by the client. Implementations do not retry,
/// queue or dedupe.
#[async_trait]
pub trait RequestApi: Send + Sync {
    async fn request(&self, session: &Session, request: ApiRequest) -> Result<Envelope, ApiError>;
}

/// ApiState
///
/// The concrete type used to share the backend client across the application state.
pub type ApiState = Arc<dyn RequestApi>;

/// HttpRequestApi
///
/// reqwest-backed implementation. Timeouts are the transport defaults.
#[derive(Clone)]
pub struct HttpRequestApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRequestApi {
    pub fn new(base_url: &str) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }
}

#[async_trait]
impl RequestApi for HttpRequestApi {
    async fn request(&self, session: &Session, request: ApiRequest) -> Result<Envelope, ApiError> {
        let url = self.url(&request.path);
        let wire_method = request.wire_method();
        let override_header = request.override_header();

        let mut builder = self.client.request(wire_method.to_reqwest(), &url);

        if let Some(token) = session.access_token.as_deref() {
            builder = builder.bearer_auth(token);
        }
        if let Some(verb) = override_header {
            builder = builder.header(METHOD_OVERRIDE_HEADER, verb);
        }

        builder = match request.body {
            // reqwest writes `multipart/form-data; boundary=...` itself.
            RequestBody::Multipart(form) => builder.multipart(form),
            RequestBody::Json(value) if wire_method == ApiMethod::Get => builder
                .header(header::CONTENT_TYPE, JSON_CONTENT_TYPE)
                .query(&query_pairs(&value)),
            RequestBody::Json(value) => builder
                .header(header::CONTENT_TYPE, JSON_CONTENT_TYPE)
                .body(serde_json::to_vec(&value)?),
            RequestBody::Empty => builder.header(header::CONTENT_TYPE, JSON_CONTENT_TYPE),
        };

        tracing::debug!(method = wire_method.as_str(), %url, "calling backend");

        let response = builder.send().await.map_err(|e| {
            tracing::warn!(error = %e, %url, "backend unreachable");
            ApiError::Transport(e.to_string())
        })?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        if status.is_success() {
            let value: Value = serde_json::from_slice(&bytes)?;
            return Ok(Envelope::new(value));
        }

        tracing::warn!(status = status.as_u16(), %url, "backend returned an error");

        match serde_json::from_slice::<Value>(&bytes) {
            Ok(value) if value.is_object() => Err(ApiError::Backend {
                status,
                envelope: Envelope::new(value),
            }),
            _ => Err(ApiError::Status { status }),
        }
    }
}

// --- Mock implementation (for handler tests) ---

/// RecordedRequest
///
/// What `MockRequestApi` saw for one call.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub path: String,
    pub method: ApiMethod,
    pub wire_method: ApiMethod,
    pub override_header: Option<String>,
    pub bearer: Option<String>,
    pub json: Option<Value>,
    pub multipart: bool,
}

#[derive(Debug, Clone)]
enum MockReply {
    Envelope(Value),
    Backend(StatusCode, Value),
    Unreachable,
}

/// MockRequestApi
///
/// In-memory `RequestApi` that answers every call with a canned reply and records
/// the calls, so handlers can be tested without a backend.
#[derive(Debug)]
pub struct MockRequestApi {
    reply: MockReply,
    calls: Mutex<Vec<RecordedRequest>>,
}

impl MockRequestApi {
    /// Every call resolves with `envelope`.
    pub fn responding(envelope: Value) -> Self {
        Self::with_reply(MockReply::Envelope(envelope))
    }

    /// Every call fails as a non-2xx backend reply carrying `envelope`.
    pub fn rejecting(status: StatusCode, envelope: Value) -> Self {
        Self::with_reply(MockReply::Backend(status, envelope))
    }

    /// Every call fails at the transport level.
    pub fn unreachable() -> Self {
        Self::with_reply(MockReply::Unreachable)
    }

    fn with_reply(reply: MockReply) -> Self {
        Self {
            reply,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<RecordedRequest> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl RequestApi for MockRequestApi {
    async fn request(&self, session: &Session, request: ApiRequest) -> Result<Envelope, ApiError> {
        let recorded = RecordedRequest {
            path: request.path.clone(),
            method: request.method,
            wire_method: request.wire_method(),
            override_header: request.override_header().map(str::to_string),
            bearer: session.access_token.clone(),
            json: match &request.body {
                RequestBody::Json(value) => Some(value.clone()),
                _ => None,
            },
            multipart: request.is_multipart(),
        };
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(recorded);

        match &self.reply {
            MockReply::Envelope(value) => Ok(Envelope::new(value.clone())),
            MockReply::Backend(status, value) => Err(ApiError::Backend {
                status: *status,
                envelope: Envelope::new(value.clone()),
            }),
            MockReply::Unreachable => Err(ApiError::Transport(
                "Mock transport error: connection refused".to_string(),
            )),
        }
    }
}
