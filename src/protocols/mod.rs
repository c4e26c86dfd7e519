//! Request and response bodies exposed over HTTP.

pub mod analysis;

pub use analysis::{
    CombinedResponse, CombinedTelemetry, EmotionResponse, EmotionTelemetry, ErrorDetail,
    HealthResponse, HealthStatus, SentimentResponse, SentimentTelemetry, TextInput,
};
