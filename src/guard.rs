use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};

use crate::{
    config::{AppConfig, normalize_prefix},
    session::Session,
};

/// GuardDecision
///
/// Outcome of evaluating one navigation into the protected area.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// No access-token cookie.
    Unauthenticated,
    /// A token is present but its role claim is missing or different.
    AuthenticatedWrongRole,
    Authorized,
}

/// RouteGuard
///
/// Request-time check in front of the seller area. It only inspects the request
/// cookies: no network, no blocking. The check is advisory, real authorization
/// happens in the backend on every API call.
#[derive(Clone, Debug)]
pub struct RouteGuard {
    protected_prefix: String,
    required_role: String,
    redirect_to: String,
}

impl RouteGuard {
    pub fn new(
        protected_prefix: impl Into<String>,
        required_role: impl Into<String>,
        redirect_to: impl Into<String>,
    ) -> Self {
        Self {
            protected_prefix: normalize_prefix(&protected_prefix.into()).unwrap_or_default(),
            required_role: required_role.into(),
            redirect_to: redirect_to.into(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.protected_prefix.clone(),
            config.required_role.clone(),
            config.redirect_to.clone(),
        )
    }

    /// Whether `path` lies in the protected area. Matching is per segment, so
    /// `/dashboard` and `/dashboard/wallet` match but `/dashboards` does not.
    pub fn protects(&self, path: &str) -> bool {
        if self.protected_prefix.is_empty() {
            return false;
        }
        match path.strip_prefix(self.protected_prefix.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }

    pub fn evaluate(&self, session: &Session) -> GuardDecision {
        if !session.has_access_token() {
            return GuardDecision::Unauthenticated;
        }
        match session.role() {
            Some(role) if role == self.required_role => GuardDecision::Authorized,
            _ => GuardDecision::AuthenticatedWrongRole,
        }
    }

    /// Full check for a path; paths outside the protected area are always authorized.
    pub fn check(&self, path: &str, session: &Session) -> GuardDecision {
        if self.protects(path) {
            self.evaluate(session)
        } else {
            GuardDecision::Authorized
        }
    }

    /// The normalized prefix, empty when nothing is protected.
    pub fn protected_prefix(&self) -> &str {
        &self.protected_prefix
    }

    pub fn redirect_to(&self) -> &str {
        &self.redirect_to
    }
}

/// route_guard
///
/// Middleware wrapping the whole router. Denied navigations get a
/// `307 Temporary Redirect` home and never reach a handler.
pub async fn route_guard(
    State(guard): State<RouteGuard>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    if !guard.protects(&path) {
        return next.run(request).await;
    }

    let session = Session::from_headers(request.headers());
    match guard.evaluate(&session) {
        GuardDecision::Authorized => next.run(request).await,
        decision => {
            tracing::info!(?decision, %path, "navigation denied, redirecting");
            Redirect::temporary(guard.redirect_to()).into_response()
        }
    }
}
