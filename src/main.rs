use clap::Parser;

use emotion_gateway::{
    analyzer_service::config::{DEFAULT_EMOTION_MODEL, DEFAULT_SENTIMENT_MODEL},
    classifier::candle::{DEFAULT_MAX_SEQUENCE_LENGTH, MIN_SEQUENCE_LENGTH},
    AnalyzerServer, AnalyzerServiceConfig,
};

#[derive(Parser)]
#[command(
    name = "emotion-gateway",
    version,
    about = "Microservice for analyzing emotions and sentiment in text"
)]
struct Args {
    /// Comma-separated list of accepted X-API-Key values
    #[arg(long, env = "API_KEYS", default_value = "", hide_env_values = true)]
    api_keys: String,

    /// Host for the HTTP service
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: String,

    /// Port number for the HTTP service
    #[arg(short, long, env = "PORT", default_value_t = 8000)]
    port: u16,

    /// Emotion model (HuggingFace model ID or local directory)
    #[arg(long, env = "EMOTION_MODEL", default_value = DEFAULT_EMOTION_MODEL)]
    emotion_model: String,

    /// Sentiment model (HuggingFace model ID or local directory)
    #[arg(long, env = "SENTIMENT_MODEL", default_value = DEFAULT_SENTIMENT_MODEL)]
    sentiment_model: String,

    /// Maximum number of tokens fed to each model
    #[arg(
        long,
        env = "MAX_SEQUENCE_LENGTH",
        default_value_t = DEFAULT_MAX_SEQUENCE_LENGTH,
        value_parser = sequence_length_parser()
    )]
    max_sequence_length: usize,

    /// Log every HTTP request and response
    #[arg(long, env = "LOG_REQUESTS", default_value_t = true, action = clap::ArgAction::Set)]
    log_requests: bool,
}

fn sequence_length_parser() -> clap::builder::RangedU64ValueParser<usize> {
    clap::builder::RangedU64ValueParser::<usize>::new()
        .range(MIN_SEQUENCE_LENGTH as u64..=DEFAULT_MAX_SEQUENCE_LENGTH as u64)
}

impl From<Args> for AnalyzerServiceConfig {
    fn from(args: Args) -> Self {
        AnalyzerServiceConfig::new(args.api_keys)
            .with_host(args.host)
            .with_http_port(args.port)
            .with_emotion_model(args.emotion_model)
            .with_sentiment_model(args.sentiment_model)
            .with_max_sequence_length(args.max_sequence_length)
            .with_log_requests(args.log_requests)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = AnalyzerServiceConfig::from(Args::parse());

    tracing::info!(
        host = %config.host,
        port = config.http_port,
        emotion_model = %config.emotion_model,
        sentiment_model = %config.sentiment_model,
        "Starting emotion & sentiment analyzer"
    );

    let server = AnalyzerServer::new(config)?;
    server.serve().await.map_err(|e| anyhow::anyhow!(e))?;

    Ok(())
}
