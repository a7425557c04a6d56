use chat_service::config::ChatConfig;
use chat_service::handlers::health::SERVICE_NAME;
use chat_service::services::metrics::init_metrics;
use chat_service::startup::Application;
use service_core::error::set_expose_details;
use service_core::observability::init_tracing;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let config = match ChatConfig::load() {
        Ok(config) => config,
        Err(e) => {
            init_tracing(SERVICE_NAME, "info", None);
            tracing::error!("Failed to load configuration: {}", e);
            return Err(std::io::Error::other(format!("Configuration error: {}", e)));
        }
    };

    init_tracing(
        SERVICE_NAME,
        &config.common.log_level,
        config.otlp_endpoint.as_deref(),
    );
    set_expose_details(config.common.debug);
    init_metrics();

    tracing::info!(
        debug = config.common.debug,
        store = ?config.mongodb.backend,
        provider = ?config.openai.provider,
        "Starting chat-service"
    );

    let application = Application::build(config).await.map_err(|e| {
        tracing::error!("Failed to build application: {}", e);
        std::io::Error::other(format!("Startup error: {}", e))
    })?;

    application.run_until_stopped().await
}
