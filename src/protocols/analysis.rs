use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::classifier::{BestLabel, ClassificationResult};

/// Body of every analysis request.
#[derive(ToSchema, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextInput {
    /// Text to classify
    #[schema(min_length = 1, example = "I am thrilled about this!")]
    pub text: String,
}

impl TextInput {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Whitespace-only text counts as present; only the empty string is rejected.
    pub fn validate(&self) -> Result<(), String> {
        if self.text.is_empty() {
            return Err("Field 'text' must not be empty".to_string());
        }
        Ok(())
    }
}

#[derive(ToSchema, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionTelemetry {
    pub emotion_processing_time_ms: f64,
}

#[derive(ToSchema, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentTelemetry {
    pub sentiment_processing_time_ms: f64,
}

#[derive(ToSchema, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinedTelemetry {
    pub emotion_processing_time_ms: f64,
    pub sentiment_processing_time_ms: f64,
    /// Both calls plus handler overhead.
    pub total_processing_time_ms: f64,
}

#[derive(ToSchema, Debug, Clone, Serialize)]
pub struct EmotionResponse {
    pub text: String,
    /// Every emotion label with its probability
    #[schema(value_type = std::collections::BTreeMap<String, f64>)]
    pub emotions: ClassificationResult,
    pub telemetry: EmotionTelemetry,
}

#[derive(ToSchema, Debug, Clone, Serialize)]
pub struct SentimentResponse {
    pub text: String,
    /// Highest-scoring sentiment label
    #[schema(value_type = BestLabel)]
    pub sentiment: ClassificationResult,
    pub telemetry: SentimentTelemetry,
}

#[derive(ToSchema, Debug, Clone, Serialize)]
pub struct CombinedResponse {
    pub text: String,
    #[schema(value_type = std::collections::BTreeMap<String, f64>)]
    pub emotions: ClassificationResult,
    #[schema(value_type = BestLabel)]
    pub sentiment: ClassificationResult,
    pub telemetry: CombinedTelemetry,
}

#[derive(ToSchema, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Loading,
}

#[derive(ToSchema, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub service: String,
    pub models_loaded: bool,
    pub version: String,
}

impl HealthResponse {
    pub fn new(models_loaded: bool, service: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            status: if models_loaded {
                HealthStatus::Healthy
            } else {
                HealthStatus::Loading
            },
            service: service.into(),
            models_loaded,
            version: version.into(),
        }
    }
}

/// Body of every error response.
#[derive(ToSchema, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub detail: String,
}

impl ErrorDetail {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_input_validation() {
        assert!(TextInput::new("I am thrilled about this!").validate().is_ok());
        assert!(TextInput::new("   ").validate().is_ok());
        assert!(TextInput::new("").validate().is_err());
    }

    #[test]
    fn test_health_status_follows_models_loaded() {
        let health = HealthResponse::new(false, "svc", "1.0.0");
        assert_eq!(health.status, HealthStatus::Loading);

        let json = serde_json::to_value(HealthResponse::new(true, "svc", "1.0.0")).unwrap();
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["models_loaded"], true);
        assert_eq!(json["service"], "svc");
        assert_eq!(json["version"], "1.0.0");
    }

    #[test]
    fn test_combined_telemetry_field_names() {
        let telemetry = CombinedTelemetry {
            emotion_processing_time_ms: 12.5,
            sentiment_processing_time_ms: 8.25,
            total_processing_time_ms: 21.0,
        };
        let json = serde_json::to_value(&telemetry).unwrap();
        assert_eq!(json["emotion_processing_time_ms"], 12.5);
        assert_eq!(json["sentiment_processing_time_ms"], 8.25);
        assert_eq!(json["total_processing_time_ms"], 21.0);
    }
}
