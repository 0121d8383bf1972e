use std::env;

/// AppConfig
///
/// Holds the edge service configuration. Immutable once loaded and shared with
/// handlers and middleware through `FromRef`, next to the API client and the clock.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Base URL of the RagaMaya backend. Every API path is appended to it.
    pub api_base_url: String,
    // Socket address the HTTP server binds to.
    pub bind_addr: String,
    // Path prefix of the seller area protected by the route guard.
    pub protected_prefix: String,
    // Role claim required inside the protected prefix.
    pub required_role: String,
    // Where denied navigations are sent.
    pub redirect_to: String,
    // Runtime environment marker. Controls log format and the cookie `Secure` flag.
    pub env: Env,
}

/// Env
///
/// Runtime context: human-readable logs and plain-HTTP cookies locally,
/// JSON logs and `Secure` cookies in production.
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

const LOCAL_API_BASE_URL: &str = "http://localhost:8080/api";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_PROTECTED_PREFIX: &str = "/dashboard";
const DEFAULT_REQUIRED_ROLE: &str = "seller";

impl Default for AppConfig {
    /// default
    ///
    /// Safe, non-panicking values for test state setup. No environment variables are read.
    fn default() -> Self {
        Self {
            api_base_url: LOCAL_API_BASE_URL.to_string(),
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            protected_prefix: DEFAULT_PROTECTED_PREFIX.to_string(),
            required_role: DEFAULT_REQUIRED_ROLE.to_string(),
            redirect_to: "/".to_string(),
            env: Env::Local,
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads the configuration from environment variables at startup.
    ///
    /// # Panics
    /// Panics in production when `API_BASE_URL` is not set, so the service never
    /// starts pointing at a local backend.
    pub fn load() -> Self {
        let env_str = env::var("APP_ENV").unwrap_or_else(|_| "local".to_string());
        let env = match env_str.as_str() {
            "production" => Env::Production,
            _ => Env::Local,
        };

        let api_base_url = match env {
            Env::Production => {
                env::var("API_BASE_URL").expect("FATAL: API_BASE_URL must be set in production.")
            }
            Env::Local => {
                env::var("API_BASE_URL").unwrap_or_else(|_| LOCAL_API_BASE_URL.to_string())
            }
        };

        Self {
            api_base_url,
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string()),
            protected_prefix: env::var("SELLER_AREA_PREFIX")
                .map(|raw| {
                    normalize_prefix(&raw)
                        .expect("FATAL: SELLER_AREA_PREFIX must name a path below '/'.")
                })
                .unwrap_or_else(|_| DEFAULT_PROTECTED_PREFIX.to_string()),
            required_role: env::var("SELLER_ROLE")
                .unwrap_or_else(|_| DEFAULT_REQUIRED_ROLE.to_string()),
            redirect_to: "/".to_string(),
            env,
        }
    }

    /// Whether session cookies must carry the `Secure` attribute.
    pub fn secure_cookies(&self) -> bool {
        self.env == Env::Production
    }
}

/// normalize_prefix
///
/// Canonical form of a route prefix: one leading `/`, no trailing `/`.
/// Returns `None` for an empty prefix or the root, which cannot be nested.
pub fn normalize_prefix(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        None
    } else {
        Some(format!("/{}", trimmed))
    }
}
