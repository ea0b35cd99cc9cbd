use std::sync::Arc;

use anyhow::Context;
use tracing::info;

mod catalog;
mod chat;
mod config;
mod error;
mod provider;
mod reassembler;
mod routes;
mod segment;
mod settings;
mod state;
mod store;
mod thinking;

use config::Config;
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	tracing_subscriber::fmt()
		.with_env_filter(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("ustadz=info")),
		)
		.init();

	let config = Config::from_env()?;
	let (bind, port) = (config.bind, config.port);

	if config.fallback_api_key.is_some() {
		info!("using OPENROUTER_API_KEY when settings carry no key");
	}

	let state = Arc::new(AppState::load(config).context("failed to load chat store")?);
	let app = routes::router(state);

	let listener = tokio::net::TcpListener::bind((bind, port))
		.await
		.with_context(|| format!("failed to bind {bind}:{port}"))?;

	info!(%bind, port, "ustadz listening");

	axum::serve(listener, app).await.context("server error")?;
	Ok(())
}
