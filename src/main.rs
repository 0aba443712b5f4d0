//! autocrud server: load the resource spec, connect services, serve.

use autocrud::{build_router, load_from_path, ServiceRegistry, Settings};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("autocrud=info,tower_http=info")),
        )
        .init();

    let settings = Settings::from_env()?;
    let spec = load_from_path(&settings.spec_path).await?;
    tracing::info!(
        spec = %settings.spec_path.display(),
        services = spec.services.len(),
        resources = spec.resources.len(),
        "specification loaded"
    );

    let services = ServiceRegistry::connect(&spec, &settings).await?;
    let http = reqwest::Client::builder()
        .timeout(settings.statement_timeout)
        .build()?;
    let app = build_router(&spec, &services, &settings, http)?;

    let listener = TcpListener::bind(settings.bind).await?;
    tracing::info!("listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    services.close_all().await;
    tracing::info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
