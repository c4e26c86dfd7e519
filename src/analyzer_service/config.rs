//! Configuration for the Analyzer Service

use serde::{Deserialize, Serialize};

use crate::classifier::candle::DEFAULT_MAX_SEQUENCE_LENGTH;

pub const SERVICE_NAME: &str = "emotion-sentiment-analyzer";
pub const DEFAULT_EMOTION_MODEL: &str = "j-hartmann/emotion-english-distilroberta-base";
pub const DEFAULT_SENTIMENT_MODEL: &str = "ProsusAI/finbert";

/// Configuration for the Analyzer Service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerServiceConfig {
    /// Host to bind the analyzer service
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP port for the analyzer service
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// Raw comma-separated API key list (e.g. "key1,key2")
    #[serde(default)]
    pub api_keys: String,

    /// Emotion model (HuggingFace model ID or local path)
    #[serde(default = "default_emotion_model")]
    pub emotion_model: String,

    /// Sentiment model (HuggingFace model ID or local path)
    #[serde(default = "default_sentiment_model")]
    pub sentiment_model: String,

    /// Tokens kept per input; longer text is truncated
    #[serde(default = "default_max_sequence_length")]
    pub max_sequence_length: usize,

    /// Enable request logging
    #[serde(default = "default_true")]
    pub log_requests: bool,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    8000
}

fn default_emotion_model() -> String {
    DEFAULT_EMOTION_MODEL.to_string()
}

fn default_sentiment_model() -> String {
    DEFAULT_SENTIMENT_MODEL.to_string()
}

fn default_max_sequence_length() -> usize {
    DEFAULT_MAX_SEQUENCE_LENGTH
}

fn default_true() -> bool {
    true
}

impl Default for AnalyzerServiceConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            http_port: default_http_port(),
            api_keys: String::new(),
            emotion_model: default_emotion_model(),
            sentiment_model: default_sentiment_model(),
            max_sequence_length: default_max_sequence_length(),
            log_requests: default_true(),
        }
    }
}

impl AnalyzerServiceConfig {
    /// Create a new config with the required API key list
    pub fn new(api_keys: impl Into<String>) -> Self {
        Self {
            api_keys: api_keys.into(),
            ..Default::default()
        }
    }

    /// Builder pattern: set host
    pub fn with_host(mut self, host: String) -> Self {
        self.host = host;
        self
    }

    /// Builder pattern: set HTTP port
    pub fn with_http_port(mut self, port: u16) -> Self {
        self.http_port = port;
        self
    }

    /// Builder pattern: set emotion model
    pub fn with_emotion_model(mut self, model: String) -> Self {
        self.emotion_model = model;
        self
    }

    /// Builder pattern: set sentiment model
    pub fn with_sentiment_model(mut self, model: String) -> Self {
        self.sentiment_model = model;
        self
    }

    /// Builder pattern: set max sequence length
    pub fn with_max_sequence_length(mut self, max_len: usize) -> Self {
        self.max_sequence_length = max_len;
        self
    }

    /// Builder pattern: toggle request logging
    pub fn with_log_requests(mut self, enabled: bool) -> Self {
        self.log_requests = enabled;
        self
    }

    /// Get the HTTP bind address
    pub fn http_bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.http_port)
    }
}
