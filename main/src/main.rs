use api_router::{api_state::ApiState, nexus_routes};
use axum::Router;
use common::config::get_config;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .try_init()
        .ok();

    let config = get_config()?;
    config.validate()?;

    info!(
        mode = config.mode.as_str(),
        llm_provider = config.llm_provider.as_str(),
        embed_provider = config.embed_provider.as_str(),
        "starting NEXUS"
    );

    let bind_address = format!("{}:{}", config.http_host, config.http_port);
    let api_state = ApiState::new(config).await?;

    let app: Router = nexus_routes(&api_state)
        .with_state(api_state)
        .layer(TraceLayer::new_for_http());

    info!(address = %bind_address, "listening");
    let listener = tokio::net::TcpListener::bind(&bind_address).await?;

    if let Err(err) = axum::serve(listener, app).await {
        error!(error = %err, "server error");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use common::config::{EmbedProvider, LlmProvider, NexusMode};
    use tower::ServiceExt;
    use uuid::Uuid;

    fn smoke_test_config() -> common::config::NexusConfig {
        let suffix = Uuid::new_v4();
        common::config::NexusConfig {
            mode: NexusMode::Local,
            llm_provider: LlmProvider::Ollama,
            embed_provider: EmbedProvider::Ollama,
            chunk_size: 1000,
            chunk_overlap: 200,
            hybrid_safe_mode: true,
            max_snippet_length: 4000,
            chroma_path: std::env::temp_dir()
                .join(format!("nexus-smoke-chroma-{suffix}"))
                .to_string_lossy()
                .to_string(),
            ledger_path: std::env::temp_dir()
                .join(format!("nexus-smoke-ledger-{suffix}.db"))
                .to_string_lossy()
                .to_string(),
            cache_dir: std::env::temp_dir()
                .join(format!("nexus-smoke-cache-{suffix}"))
                .to_string_lossy()
                .to_string(),
            ollama_base_url: "http://localhost:11434".to_string(),
            ollama_model: "llama3".to_string(),
            anthropic_api_key: None,
            anthropic_model: "claude".to_string(),
            openai_api_key: None,
            openai_model: "gpt".to_string(),
            vertex_project_id: None,
            vertex_model: "gemini".to_string(),
            http_host: "0.0.0.0".to_string(),
            http_port: 0,
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn smoke_banner_and_health_respond() {
        let api_state = ApiState::new(smoke_test_config()).await.expect("api state should build");
        let app = nexus_routes(&api_state).with_state(api_state);

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/").body(Body::empty()).expect("request"))
            .await
            .expect("banner response");
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).expect("request"))
            .await
            .expect("health response");
        assert_eq!(response.status(), StatusCode::OK);
    }
}
