use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use ai_assistant::agent::{OllamaAgentService, DEFAULT_MODEL};
use ai_assistant::routes::ask_routes;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present (development convenience)
    dotenvy::dotenv().ok();

    // Initialise tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ai_assistant=debug,tower_http=debug".into()),
        )
        .init();

    // ── Agent ─────────────────────────────────────────────────────────────────
    let ollama_base_url = std::env::var("OLLAMA_API_BASE_URL")
        .unwrap_or_else(|_| "http://localhost:11434".to_string());
    let model = std::env::var("AI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

    let agent = OllamaAgentService::new(&ollama_base_url, &model)?;
    info!("Answering with model '{model}' at {ollama_base_url}");

    // ── Router ────────────────────────────────────────────────────────────────
    let app = ask_routes::router(Arc::new(agent))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    // ── Listen ────────────────────────────────────────────────────────────────
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on http://{addr}/");

    axum::serve(listener, app).await?;
    Ok(())
}
