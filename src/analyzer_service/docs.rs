//! OpenAPI document and the HTML viewers that render it.

use std::sync::Arc;

use axum::{
    response::{Html, IntoResponse},
    routing::get,
    Json, Router,
};
use utoipa::{
    openapi::security::{ApiKey, ApiKeyValue, SecurityScheme},
    Modify, OpenApi,
};

use super::{auth::API_KEY_HEADER, handlers};
use crate::{
    classifier::BestLabel,
    protocols::{
        CombinedResponse, CombinedTelemetry, EmotionResponse, EmotionTelemetry, ErrorDetail,
        HealthResponse, HealthStatus, SentimentResponse, SentimentTelemetry, TextInput,
    },
};

pub const OPENAPI_PATH: &str = "/openapi.json";

const TITLE: &str = "PulseChamp Emotion & Sentiment Analyzer";

/// Registers the `X-API-Key` header scheme the analysis paths refer to.
struct ApiKeyAuth;

impl Modify for ApiKeyAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "ApiKeyAuth",
            SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new(API_KEY_HEADER))),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "PulseChamp Emotion & Sentiment Analyzer",
        description = "Microservice for analyzing emotions and sentiment in text"
    ),
    paths(
        handlers::health_handler,
        handlers::emotion_handler,
        handlers::sentiment_handler,
        handlers::analyze_handler
    ),
    components(schemas(
        TextInput,
        EmotionResponse,
        SentimentResponse,
        CombinedResponse,
        EmotionTelemetry,
        SentimentTelemetry,
        CombinedTelemetry,
        BestLabel,
        HealthResponse,
        HealthStatus,
        ErrorDetail
    )),
    modifiers(&ApiKeyAuth),
    tags(
        (name = "analysis", description = "Emotion and sentiment classification"),
        (name = "service", description = "Service status")
    )
)]
pub struct ApiDoc;

fn viewer_page(body: &str) -> Html<String> {
    Html(format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<title>{TITLE}</title>\n<meta charset=\"utf-8\"/>\n</head>\n<body>\n{body}\n</body>\n</html>\n"
    ))
}

async fn swagger_ui() -> impl IntoResponse {
    viewer_page(&format!(
        "<div id=\"swagger-ui\"></div>\n\
         <script src=\"https://cdn.jsdelivr.net/npm/swagger-ui-dist@5/swagger-ui-bundle.js\"></script>\n\
         <script>SwaggerUIBundle({{url: '{OPENAPI_PATH}', dom_id: '#swagger-ui'}});</script>"
    ))
}

async fn redoc() -> impl IntoResponse {
    viewer_page(&format!(
        "<redoc spec-url=\"{OPENAPI_PATH}\"></redoc>\n\
         <script src=\"https://cdn.jsdelivr.net/npm/redoc@2/bundles/redoc.standalone.js\"></script>"
    ))
}

/// Router serving `/openapi.json`, `/docs` and `/redoc`.
pub fn docs_router() -> Router {
    let document = Arc::new(ApiDoc::openapi());

    Router::new()
        .route(
            OPENAPI_PATH,
            get(move || {
                let document = document.clone();
                async move { Json(document.as_ref().clone()) }
            }),
        )
        .route("/docs", get(swagger_ui))
        .route("/redoc", get(redoc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer_service::auth::PUBLIC_PATHS;

    fn document() -> serde_json::Value {
        serde_json::to_value(ApiDoc::openapi()).unwrap()
    }

    #[test]
    fn test_document_lists_every_route() {
        let doc = document();
        let paths = doc["paths"].as_object().unwrap();

        for path in ["/health", "/emotion", "/sentiment", "/analyze"] {
            assert!(paths.contains_key(path), "missing {}", path);
        }
        assert!(doc["paths"]["/emotion"]["post"]["security"].is_array());
        assert!(doc["paths"]["/health"]["get"].get("security").is_none());
        assert_eq!(doc["info"]["title"], TITLE);
        assert_eq!(doc["info"]["version"], env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn test_analysis_paths_document_validation_statuses() {
        let doc = document();

        for path in ["/emotion", "/sentiment", "/analyze"] {
            let responses = doc["paths"][path]["post"]["responses"].as_object().unwrap();
            for status in ["200", "400", "401", "403", "415", "422", "500"] {
                assert!(responses.contains_key(status), "{} lacks {}", path, status);
            }
        }
    }

    #[test]
    fn test_schemas_follow_wire_types() {
        let doc = document();
        let schemas = &doc["components"]["schemas"];

        assert_eq!(schemas["TextInput"]["required"], serde_json::json!(["text"]));
        assert_eq!(schemas["TextInput"]["properties"]["text"]["minLength"], 1);
        assert!(schemas["ErrorDetail"]["properties"]["detail"].is_object());
        assert!(schemas["EmotionResponse"]["properties"]["emotions"]["additionalProperties"].is_object());
        assert_eq!(
            schemas["HealthStatus"]["enum"],
            serde_json::json!(["healthy", "loading"])
        );

        let scheme = &doc["components"]["securitySchemes"]["ApiKeyAuth"];
        assert_eq!(scheme["type"], "apiKey");
        assert_eq!(scheme["in"], "header");
        assert_eq!(scheme["name"], API_KEY_HEADER);
    }

    #[test]
    fn test_docs_paths_are_public() {
        for path in [OPENAPI_PATH, "/docs", "/redoc"] {
            assert!(PUBLIC_PATHS.contains(&path));
        }
    }

    #[tokio::test]
    async fn test_viewer_pages_reference_document() {
        let html = swagger_ui().await.into_response();
        let body = axum::body::to_bytes(html.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = String::from_utf8(body.to_vec()).unwrap();
        assert!(body.contains(OPENAPI_PATH));
    }
}
