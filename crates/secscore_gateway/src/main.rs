//! Entry point: loads settings, wires the composition root, and serves the
//! four SecScore endpoints over axum.

mod al_params;
mod captcha;
mod error;
mod health;
mod orchestrator;
mod rate_limit;
mod routes;
mod state;
mod validation;

use std::net::SocketAddr;

use secscore_config::Settings;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,secscore_gateway=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path = std::env::var("SECSCORE_CONFIG_PATH").ok().map(Into::into);
    let settings = Settings::load(config_path)?;

    for warning in settings.validate() {
        tracing::warn!("{warning}");
    }

    let bind_host = settings.server.host.clone();
    let bind_port = settings.server.port;

    tracing::info!("starting secscore_gateway");
    let state = AppState::new(settings);
    let app = routes::build_router(state);

    let addr: SocketAddr = format!("{bind_host}:{bind_port}").parse()?;
    tracing::info!(%addr, "listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
