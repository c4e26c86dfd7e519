//! Analyzer Service Server
//!
//! HTTP server exposing the emotion and sentiment endpoints. Owns the startup
//! sequence (eager model load, then bind) and graceful shutdown on signals.

use std::future::Future;
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};

use super::{
    auth::{self, ApiKeyGate},
    config::AnalyzerServiceConfig,
    docs,
    handlers::{self, HandlerState},
};
use crate::classifier::{CandleLoader, TextClassifierService};
use crate::error::ConfigError;

/// Analyzer Service Server
pub struct AnalyzerServer {
    config: AnalyzerServiceConfig,
    gate: Arc<ApiKeyGate>,
    emotion: Arc<TextClassifierService>,
    sentiment: Arc<TextClassifierService>,
}

impl AnalyzerServer {
    /// Create a new AnalyzerServer backed by Candle models.
    ///
    /// Fails if no API key is configured. Models are not loaded here; see
    /// [`AnalyzerServer::load_models`].
    pub fn new(config: AnalyzerServiceConfig) -> Result<Self, ConfigError> {
        info!("Initializing AnalyzerServer");

        let gate = ApiKeyGate::from_config_value(&config.api_keys).map_err(|e| {
            error!(error = %e, "Invalid API key configuration");
            e
        })?;
        info!(keys = gate.key_count(), "API key gate configured");

        let emotion = TextClassifierService::emotion(
            config.emotion_model.clone(),
            Arc::new(CandleLoader::new(
                config.emotion_model.clone(),
                config.max_sequence_length,
            )),
        );
        let sentiment = TextClassifierService::sentiment(
            config.sentiment_model.clone(),
            Arc::new(CandleLoader::new(
                config.sentiment_model.clone(),
                config.max_sequence_length,
            )),
        );

        Ok(Self::with_components(
            config,
            Arc::new(gate),
            Arc::new(emotion),
            Arc::new(sentiment),
        ))
    }

    /// Create with pre-initialized components (for testing or custom setup)
    pub fn with_components(
        config: AnalyzerServiceConfig,
        gate: Arc<ApiKeyGate>,
        emotion: Arc<TextClassifierService>,
        sentiment: Arc<TextClassifierService>,
    ) -> Self {
        Self {
            config,
            gate,
            emotion,
            sentiment,
        }
    }

    /// Eagerly load both models, emotion first.
    ///
    /// A failure is logged and left for the lazy path in
    /// [`TextClassifierService::classify`] to retry.
    pub async fn load_models(&self) {
        for service in [&self.emotion, &self.sentiment] {
            if let Err(e) = service.load().await {
                warn!(
                    service = service.name(),
                    model_id = %service.model_id(),
                    error = %e,
                    "Eager model load failed; will retry on first request"
                );
            }
        }
    }

    /// Build the Axum router
    pub fn build_router(&self) -> Router {
        let state = Arc::new(HandlerState::new(
            self.emotion.clone(),
            self.sentiment.clone(),
        ));

        // CORS configuration
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        let router = Router::new()
            .route("/health", get(handlers::health_handler))
            .route("/emotion", post(handlers::emotion_handler))
            .route("/sentiment", post(handlers::sentiment_handler))
            .route("/analyze", post(handlers::analyze_handler))
            .with_state(state)
            .merge(docs::docs_router())
            .layer(middleware::from_fn_with_state(
                self.gate.clone(),
                auth::require_api_key,
            ));

        let router = if self.config.log_requests {
            router.layer(TraceLayer::new_for_http())
        } else {
            router
        };

        router.layer(cors)
    }

    /// Load models, then serve until SIGINT or SIGTERM.
    pub async fn serve(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.serve_with_shutdown(shutdown_signal()).await
    }

    /// Load models, then serve until `shutdown` resolves. Resolving during
    /// the load skips binding.
    pub async fn serve_with_shutdown<F>(
        self,
        shutdown: F,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.config.http_bind_addr();

        // Polled from here on, so a signal during a slow load is not lost.
        let mut shutdown = Box::pin(shutdown);
        tokio::select! {
            _ = self.load_models() => {}
            _ = &mut shutdown => {
                warn!("Shutdown requested while loading models; not starting server");
                return Ok(());
            }
        }
        info!(
            models_loaded = self.emotion.is_loaded() && self.sentiment.is_loaded(),
            "Starting AnalyzerServer on {}",
            addr
        );

        let router = self.build_router();

        let listener = TcpListener::bind(&addr).await.map_err(|e| {
            error!(addr = %addr, error = %e, "Failed to bind");
            ConfigError::InvalidBindAddr {
                addr: addr.clone(),
                reason: e.to_string(),
            }
        })?;
        info!("AnalyzerServer listening on {}", addr);

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| format!("Server error: {}", e))?;

        info!("AnalyzerServer stopped");
        Ok(())
    }

    pub fn emotion(&self) -> &Arc<TextClassifierService> {
        &self.emotion
    }

    pub fn sentiment(&self) -> &Arc<TextClassifierService> {
        &self.sentiment
    }
}

/// Resolves on Ctrl+C or, on Unix, SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
