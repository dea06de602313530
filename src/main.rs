use std::sync::Arc;

use anyhow::{Context, Result};
use rmcp::transport::streamable_http_server::{
    StreamableHttpService, session::local::LocalSessionManager,
};
use tower_http::services::ServeDir;
use tracing::info;
use tracing_subscriber::EnvFilter;

use video_prompt_rmcp::{
    config::Settings,
    mcp_server::VideoPromptServer,
    orchestrator::PromptOrchestrator,
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = Arc::new(Settings::from_env()?);
    tokio::fs::create_dir_all(&settings.output_dir)
        .await
        .with_context(|| format!("cannot create output directory {}", settings.output_dir.display()))?;

    let orchestrator = Arc::new(PromptOrchestrator::from_settings(&settings));
    let service = {
        let orchestrator = orchestrator.clone();
        let settings = settings.clone();
        StreamableHttpService::new(
            move || Ok(VideoPromptServer::new(orchestrator.clone(), settings.clone())),
            LocalSessionManager::default().into(),
            Default::default(),
        )
    };

    let mcp_path = settings.mcp_path();
    let router = axum::Router::new()
        .nest_service(&mcp_path, service)
        .nest_service("/media", ServeDir::new(&settings.output_dir));

    let bind_address = settings.bind_address();
    let tcp_listener = tokio::net::TcpListener::bind(&bind_address).await?;
    info!(
        address = %bind_address,
        mcp_path = %mcp_path,
        media = %settings.media_base_url,
        "video prompt MCP server started"
    );

    axum::serve(tcp_listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    Ok(())
}
