//! Request handlers for the Analyzer Service
//!
//! Each handler runs one or both classifier services and attaches stage
//! timings to the response.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{rejection::JsonRejection, FromRequest, Request, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use tracing::{debug, error};
use uuid::Uuid;

use super::config::SERVICE_NAME;
use crate::{
    classifier::{elapsed_ms, TextClassifierService},
    error::ApiError,
    protocols::{
        CombinedResponse, CombinedTelemetry, EmotionResponse, EmotionTelemetry, ErrorDetail,
        HealthResponse, SentimentResponse, SentimentTelemetry, TextInput,
    },
};

/// Shared state for handlers
pub struct HandlerState {
    pub emotion: Arc<TextClassifierService>,
    pub sentiment: Arc<TextClassifierService>,
}

impl HandlerState {
    pub fn new(emotion: Arc<TextClassifierService>, sentiment: Arc<TextClassifierService>) -> Self {
        Self { emotion, sentiment }
    }

    pub fn models_loaded(&self) -> bool {
        self.emotion.is_loaded() && self.sentiment.is_loaded()
    }
}

/// JSON body that passed [`TextInput::validate`].
///
/// Malformed JSON is rejected with 400, a missing or mistyped field with 422
/// (axum's own statuses), and empty text with 422.
pub struct ValidatedText(pub TextInput);

impl<S> FromRequest<S> for ValidatedText
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(input) = Json::<TextInput>::from_request(req, state)
            .await
            .map_err(|rejection: JsonRejection| ApiError::Validation {
                status: rejection.status(),
                message: rejection.body_text(),
            })?;

        input.validate().map_err(|message| ApiError::Validation {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            message,
        })?;

        Ok(ValidatedText(input))
    }
}

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/health",
    tag = "service",
    responses((status = 200, description = "Model load status", body = HealthResponse))
)]
pub async fn health_handler(State(state): State<Arc<HandlerState>>) -> impl IntoResponse {
    Json(HealthResponse::new(
        state.models_loaded(),
        SERVICE_NAME,
        env!("CARGO_PKG_VERSION"),
    ))
}

/// Emotion classification endpoint
#[utoipa::path(
    post,
    path = "/emotion",
    tag = "analysis",
    summary = "Emotion classification",
    request_body = TextInput,
    responses(
        (status = 200, description = "Probability of every emotion label", body = EmotionResponse),
        (status = 400, description = "Malformed JSON body", body = ErrorDetail),
        (status = 401, description = "Missing API key", body = ErrorDetail),
        (status = 403, description = "Invalid API key", body = ErrorDetail),
        (status = 415, description = "Body is not application/json", body = ErrorDetail),
        (status = 422, description = "Missing, mistyped or empty `text`", body = ErrorDetail),
        (status = 500, description = "Model failed to load or run", body = ErrorDetail)
    ),
    security(("ApiKeyAuth" = []))
)]
pub async fn emotion_handler(
    State(state): State<Arc<HandlerState>>,
    ValidatedText(input): ValidatedText,
) -> Result<Json<EmotionResponse>, ApiError> {
    let request_id = Uuid::new_v4().to_string();
    debug!(request_id = %request_id, chars = char_count(&input.text), "Processing emotion request");

    let (emotions, elapsed) = classify(&state.emotion, &input.text, &request_id).await?;

    Ok(Json(EmotionResponse {
        text: input.text,
        emotions,
        telemetry: EmotionTelemetry {
            emotion_processing_time_ms: elapsed,
        },
    }))
}

/// Sentiment classification endpoint
#[utoipa::path(
    post,
    path = "/sentiment",
    tag = "analysis",
    summary = "Sentiment classification",
    request_body = TextInput,
    responses(
        (status = 200, description = "Highest-scoring sentiment label", body = SentimentResponse),
        (status = 400, description = "Malformed JSON body", body = ErrorDetail),
        (status = 401, description = "Missing API key", body = ErrorDetail),
        (status = 403, description = "Invalid API key", body = ErrorDetail),
        (status = 415, description = "Body is not application/json", body = ErrorDetail),
        (status = 422, description = "Missing, mistyped or empty `text`", body = ErrorDetail),
        (status = 500, description = "Model failed to load or run", body = ErrorDetail)
    ),
    security(("ApiKeyAuth" = []))
)]
pub async fn sentiment_handler(
    State(state): State<Arc<HandlerState>>,
    ValidatedText(input): ValidatedText,
) -> Result<Json<SentimentResponse>, ApiError> {
    let request_id = Uuid::new_v4().to_string();
    debug!(request_id = %request_id, chars = char_count(&input.text), "Processing sentiment request");

    let (sentiment, elapsed) = classify(&state.sentiment, &input.text, &request_id).await?;

    Ok(Json(SentimentResponse {
        text: input.text,
        sentiment,
        telemetry: SentimentTelemetry {
            sentiment_processing_time_ms: elapsed,
        },
    }))
}

/// Combined endpoint. Emotion runs first; sentiment starts after it returns.
#[utoipa::path(
    post,
    path = "/analyze",
    tag = "analysis",
    summary = "Emotion and sentiment classification",
    request_body = TextInput,
    responses(
        (status = 200, description = "Emotion distribution and sentiment label", body = CombinedResponse),
        (status = 400, description = "Malformed JSON body", body = ErrorDetail),
        (status = 401, description = "Missing API key", body = ErrorDetail),
        (status = 403, description = "Invalid API key", body = ErrorDetail),
        (status = 415, description = "Body is not application/json", body = ErrorDetail),
        (status = 422, description = "Missing, mistyped or empty `text`", body = ErrorDetail),
        (status = 500, description = "Model failed to load or run", body = ErrorDetail)
    ),
    security(("ApiKeyAuth" = []))
)]
pub async fn analyze_handler(
    State(state): State<Arc<HandlerState>>,
    ValidatedText(input): ValidatedText,
) -> Result<Json<CombinedResponse>, ApiError> {
    let request_id = Uuid::new_v4().to_string();
    debug!(request_id = %request_id, chars = char_count(&input.text), "Processing combined request");

    let start = Instant::now();
    let (emotions, emotion_ms) = classify(&state.emotion, &input.text, &request_id).await?;
    let (sentiment, sentiment_ms) = classify(&state.sentiment, &input.text, &request_id).await?;
    let total_ms = elapsed_ms(start);

    Ok(Json(CombinedResponse {
        text: input.text,
        emotions,
        sentiment,
        telemetry: CombinedTelemetry {
            emotion_processing_time_ms: emotion_ms,
            sentiment_processing_time_ms: sentiment_ms,
            total_processing_time_ms: total_ms,
        },
    }))
}

/// Length in characters, not UTF-8 bytes.
fn char_count(text: &str) -> usize {
    text.chars().count()
}

async fn classify(
    service: &TextClassifierService,
    text: &str,
    request_id: &str,
) -> Result<(crate::classifier::ClassificationResult, f64), ApiError> {
    service.classify(text).await.map_err(|e| {
        error!(
            request_id = %request_id,
            service = service.name(),
            model_id = %service.model_id(),
            error = %e,
            "Classification failed"
        );
        ApiError::analysis(service.name(), e)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{LabelScore, ModelLoader, SequenceClassifier};
    use crate::error::ModelError;

    struct Fixed(Vec<LabelScore>);

    impl SequenceClassifier for Fixed {
        fn predict(&self, _text: &str) -> Result<Vec<LabelScore>, ModelError> {
            Ok(self.0.clone())
        }
    }

    fn loader(scores: Vec<LabelScore>) -> Arc<dyn ModelLoader> {
        let model: Arc<dyn SequenceClassifier> = Arc::new(Fixed(scores));
        Arc::new(move || -> Result<Arc<dyn SequenceClassifier>, ModelError> { Ok(model.clone()) })
    }

    fn state() -> HandlerState {
        HandlerState::new(
            Arc::new(TextClassifierService::emotion(
                "emotion",
                loader(vec![LabelScore::new("joy", 0.8), LabelScore::new("fear", 0.2)]),
            )),
            Arc::new(TextClassifierService::sentiment(
                "sentiment",
                loader(vec![LabelScore::new("positive", 0.6), LabelScore::new("negative", 0.4)]),
            )),
        )
    }

    #[test]
    fn test_char_count_counts_characters() {
        assert_eq!(char_count("happy"), 5);
        assert_eq!(char_count("¡Qué alegría! 😀"), 15);
        assert_eq!(char_count(""), 0);
    }

    #[tokio::test]
    async fn test_models_loaded_requires_both() {
        let state = state();
        assert!(!state.models_loaded());

        state.emotion.load().await.unwrap();
        assert!(!state.models_loaded());

        state.sentiment.load().await.unwrap();
        assert!(state.models_loaded());
    }

    #[tokio::test]
    async fn test_classify_wraps_failure_with_stage_name() {
        let failing: Arc<dyn ModelLoader> = Arc::new(|| -> Result<Arc<dyn SequenceClassifier>, ModelError> {
            Err(ModelError::Load("no such repo".to_string()))
        });
        let service = TextClassifierService::sentiment("missing/model", failing);

        let err = classify(&service, "text", "req-1").await.unwrap_err();
        assert_eq!(err.to_string(), "Error analyzing sentiment: no such repo");
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
