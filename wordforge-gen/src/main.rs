//! wordforge-gen - Article-to-document generation service
//!
//! HTTP service that turns topic lists into rendered Word documents:
//! article text from a Gemini-style API, images resolved through a
//! prioritized source chain, conversion through pandoc.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use wordforge_common::Settings;
use wordforge_gen::document::PandocRenderer;
use wordforge_gen::providers::{build_chain, FallbackResolver};
use wordforge_gen::services::text_generator::GeminiTextGenerator;
use wordforge_gen::tasks::{ArticleWorker, TaskCoordinator, TaskRegistry};
use wordforge_gen::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting wordforge-gen");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    // Optional config path as the first argument, otherwise env/defaults.
    let config_arg = std::env::args().nth(1).map(PathBuf::from);
    let settings = Settings::load(config_arg.as_deref()).context("failed to load configuration")?;
    settings.validate().context("invalid configuration")?;
    let settings = Arc::new(settings);

    let output_dir = PathBuf::from(&settings.output.directory);
    let uploads_dir = PathBuf::from(&settings.output.uploads_dir);
    tokio::fs::create_dir_all(&output_dir)
        .await
        .with_context(|| format!("cannot create output directory {}", output_dir.display()))?;
    tokio::fs::create_dir_all(&uploads_dir)
        .await
        .with_context(|| format!("cannot create uploads directory {}", uploads_dir.display()))?;

    let text = Arc::new(GeminiTextGenerator::new(settings.text.clone()));
    let renderer = Arc::new(PandocRenderer::new(
        settings.renderer.clone(),
        output_dir,
        settings.images.enabled,
    ));
    let chain = build_chain(&settings);
    info!(sources = chain.len(), "Image source chain ready");
    let resolver = FallbackResolver::new(chain);

    let worker = Arc::new(ArticleWorker::new(
        text,
        renderer,
        resolver,
        settings.images.count,
        settings.images.enabled,
    ));
    let coordinator = Arc::new(TaskCoordinator::new(
        Arc::new(TaskRegistry::new()),
        worker,
        settings.tasks.max_concurrent_articles,
        settings.tasks.max_retry_attempts,
    ));

    let state = AppState::new(settings.clone(), coordinator);
    let app = wordforge_gen::build_router(state);

    let listener = tokio::net::TcpListener::bind(&settings.server.bind_addr)
        .await
        .with_context(|| format!("cannot bind {}", settings.server.bind_addr))?;
    info!("Listening on http://{}", settings.server.bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}
