use anyhow::{Context, Result};
use handmatd::config::{Config, LogFormat};
use handmatd::{build_router, AppState};
use tracing_subscriber::EnvFilter;

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(true)
            .init(),
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load().context("failed to load configuration")?;
    init_tracing(config.log_format);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        model_dir = %config.model_dir.display(),
        mock_fallback = config.mock_fallback,
        "handmatd starting"
    );

    let bind_addr = config.bind_addr.clone();
    let state = AppState::from_config(config).context("failed to start recognition engines")?;
    tracing::info!(
        hand = ?state.hand.availability(),
        face = ?state.face.availability(),
        language = ?state.composer.availability(),
        "backends selected"
    );

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    tracing::info!(addr = %bind_addr, "handmatd ready");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("handmatd shutting down");
        })
        .await?;

    Ok(())
}
