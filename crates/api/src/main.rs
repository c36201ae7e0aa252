use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use regdesk_app::spawn_default_workers;
use regdesk_auth::Hs256JwtValidator;
use regdesk_infra::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    regdesk_observability::init();

    let config = Config::load().context("invalid configuration")?;
    let services = regdesk_api::app::services::build_services(&config)
        .await
        .context("failed to initialize services")?;
    let workers = spawn_default_workers(&services, &config.workers);

    let jwt = Arc::new(Hs256JwtValidator::new(config.auth.jwt_secret.clone().into_bytes()));
    let app = regdesk_api::app::build_app(Arc::new(services), jwt);

    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;
    info!(address = %listener.local_addr()?, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    for worker in workers {
        worker.stop().await;
    }
    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
