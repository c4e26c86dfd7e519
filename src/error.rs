//! Error types for the analyzer service.
//!
//! Each layer returns its own error enum. Status codes are assigned only when
//! an [`ApiError`] is turned into a response.

use axum::{
    http::{header::WWW_AUTHENTICATE, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::protocols::ErrorDetail;

/// Fatal startup errors. The process must not serve traffic after one of these.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("No API keys configured. Set API_KEYS environment variable.")]
    NoApiKeys,

    #[error("Invalid bind address {addr}: {reason}")]
    InvalidBindAddr { addr: String, reason: String },
}

/// Request-scoped authentication failures.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    #[error("Missing API key. Include X-API-Key header.")]
    MissingKey,

    #[error("Invalid API key")]
    InvalidKey,
}

/// Failures while loading a model or running inference on it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ModelError {
    /// Download, weight or config failure while building the pipeline.
    #[error("{0}")]
    Load(String),

    /// Tokenizer rejected the input.
    #[error("{0}")]
    Tokenization(String),

    /// Forward pass or post-processing failed.
    #[error("{0}")]
    Inference(String),
}

impl From<candle_core::Error> for ModelError {
    fn from(value: candle_core::Error) -> Self {
        ModelError::Inference(value.to_string())
    }
}

impl From<hf_hub::api::sync::ApiError> for ModelError {
    fn from(value: hf_hub::api::sync::ApiError) -> Self {
        ModelError::Load(format!("HuggingFace API error: {}", value))
    }
}

impl From<std::io::Error> for ModelError {
    fn from(value: std::io::Error) -> Self {
        ModelError::Load(value.to_string())
    }
}

impl From<serde_json::Error> for ModelError {
    fn from(value: serde_json::Error) -> Self {
        ModelError::Load(value.to_string())
    }
}

/// Outermost error type returned by handlers and middleware.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Request body rejected before reaching a classifier.
    #[error("{message}")]
    Validation { status: StatusCode, message: String },

    /// A classifier call failed; `kind` names the stage ("emotion", "sentiment").
    #[error("Error analyzing {kind}: {source}")]
    Analysis {
        kind: &'static str,
        #[source]
        source: ModelError,
    },
}

impl ApiError {
    pub fn analysis(kind: &'static str, source: ModelError) -> Self {
        ApiError::Analysis { kind, source }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Auth(AuthError::MissingKey) => StatusCode::UNAUTHORIZED,
            ApiError::Auth(AuthError::InvalidKey) => StatusCode::FORBIDDEN,
            ApiError::Validation { status, .. } => *status,
            ApiError::Analysis { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(ErrorDetail::new(self.to_string()));
        let mut response = (status, body).into_response();

        if matches!(self, ApiError::Auth(AuthError::MissingKey)) {
            response
                .headers_mut()
                .insert(WWW_AUTHENTICATE, HeaderValue::from_static("ApiKey"));
        }

        response
    }
}
