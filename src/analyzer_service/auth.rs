//! API key gate
//!
//! Every request outside [`PUBLIC_PATHS`] must carry an `X-API-Key` header whose
//! value is in the configured key set. A missing key is rejected with 401 and
//! an `ApiKey` challenge, an unknown key with 403.

use std::collections::HashSet;
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use tracing::{debug, warn};

use crate::error::{ApiError, AuthError, ConfigError};

pub const API_KEY_HEADER: &str = "x-api-key";

/// Exact-match paths that skip the key check for any method.
pub const PUBLIC_PATHS: [&str; 4] = ["/health", "/docs", "/redoc", "/openapi.json"];

/// Result of a successful check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Public,
    Allowed,
}

#[derive(Debug, Clone)]
pub struct ApiKeyGate {
    keys: HashSet<String>,
}

impl ApiKeyGate {
    /// Parse a comma-separated key list. Blank entries are dropped; an empty
    /// result is a fatal configuration error.
    pub fn from_config_value(raw: &str) -> Result<Self, ConfigError> {
        Self::new(raw.split(','))
    }

    pub fn new<I, S>(keys: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keys: HashSet<String> = keys
            .into_iter()
            .map(|k| k.as_ref().trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();

        if keys.is_empty() {
            return Err(ConfigError::NoApiKeys);
        }

        Ok(Self { keys })
    }

    pub fn key_count(&self) -> usize {
        self.keys.len()
    }

    pub fn is_public(path: &str) -> bool {
        PUBLIC_PATHS.contains(&path)
    }

    pub fn check(&self, path: &str, headers: &HeaderMap) -> Result<Access, AuthError> {
        if Self::is_public(path) {
            return Ok(Access::Public);
        }

        // An empty header value counts as missing.
        let Some(value) = headers.get(API_KEY_HEADER).filter(|v| !v.is_empty()) else {
            return Err(AuthError::MissingKey);
        };

        match value.to_str() {
            Ok(key) if self.keys.contains(key) => Ok(Access::Allowed),
            _ => Err(AuthError::InvalidKey),
        }
    }
}

/// Middleware enforcing [`ApiKeyGate::check`] before any handler runs.
pub async fn require_api_key(
    State(gate): State<Arc<ApiKeyGate>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let path = request.uri().path();

    match gate.check(path, request.headers()) {
        Ok(access) => {
            debug!(path, access = ?access, "Request authorized");
            Ok(next.run(request).await)
        }
        Err(e) => {
            warn!(
                path,
                method = %request.method(),
                error = %e,
                "Rejected unauthenticated request"
            );
            Err(e.into())
        }
    }
}
