//! Emotion and sentiment classification over HTTP.
//!
//! Two pretrained transformer classifiers sit behind an API-key-gated axum
//! router. See [`analyzer_service`] for the HTTP surface and [`classifier`] for
//! the model wrappers.

pub mod analyzer_service;
pub mod classifier;
pub mod error;
pub mod protocols;

pub use analyzer_service::config::{DEFAULT_EMOTION_MODEL, DEFAULT_SENTIMENT_MODEL, SERVICE_NAME};
pub use analyzer_service::{AnalyzerServer, AnalyzerServiceConfig, ApiKeyGate};
pub use classifier::TextClassifierService;
pub use error::{ApiError, AuthError, ConfigError, ModelError};
