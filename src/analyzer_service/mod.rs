//! Analyzer Service module - HTTP front end for the text classifiers
//!
//! This module provides a standalone service that:
//! 1. Receives client requests over HTTP
//! 2. Handles authentication (shared-secret `X-API-Key` header)
//! 3. Runs the emotion and/or sentiment classifier on the submitted text
//! 4. Returns the results together with per-stage latency telemetry
//!
//! # Architecture
//!
//! ```text
//! Client → Auth Gate → Handlers → Emotion / Sentiment TextClassifierService → Model
//! ```
//!
//! # Testing
//!
//! ## Unit Tests
//!
//! ```bash
//! cargo test analyzer_service --lib
//! ```
//!
//! The unit tests cover:
//! - Configuration builder pattern and bind address
//! - API key parsing, public paths, 401 vs 403 handling
//! - Request validation and error mapping
//! - Startup with failing model loads
//!
//! ## Manual Testing
//!
//! 1. Start the service:
//!    ```bash
//!    API_KEYS=dev-key cargo run -- --port 8000
//!    ```
//! 2. Send a request:
//!    ```bash
//!    curl -X POST http://localhost:8000/analyze \
//!      -H "Content-Type: application/json" \
//!      -H "X-API-Key: dev-key" \
//!      -d '{"text": "I am thrilled about this!"}'
//!    ```

pub mod auth;
pub mod config;
pub mod docs;
pub mod handlers;
pub mod server;

pub use auth::ApiKeyGate;
pub use config::AnalyzerServiceConfig;
pub use server::AnalyzerServer;
