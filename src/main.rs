use axum::Router;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use warden::app::lifecycle::{LifecycleEngine, ProposalStore};
use warden::app::locks::UserLocks;
use warden::config::AppConfig;
use warden::infra::{db::Db, gateway::GatewaySink};
use warden::{http, jobs, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;

    let db = Db::open(&config.database_url).await?;
    let gateway = GatewaySink::new(config.gateway_webhook_url.clone())?;
    let locks = UserLocks::new();
    let proposals = ProposalStore::new();

    let state = AppState {
        db: db.clone(),
        gateway: gateway.clone(),
        locks: locks.clone(),
        proposals: proposals.clone(),
        gateway_token: config.gateway_token.clone(),
        confirm_ttl_seconds: config.confirm_ttl_seconds,
        appeal_cooldown_days: config.appeal_cooldown_days,
        page_size: config.page_size,
    };

    let engine = LifecycleEngine::new(
        db.clone(),
        locks.clone(),
        proposals.clone(),
        config.confirm_ttl_seconds,
    );
    let sweeper = tokio::spawn(jobs::expiry_sweeper::run(
        db.clone(),
        engine,
        gateway.clone(),
        config.sweep_interval_seconds,
    ));

    let app: Router = http::router(state).layer(TraceLayer::new_for_http());
    let listener = tokio::net::TcpListener::bind(&config.http_addr).await?;
    tracing::info!("listening on {}", config.http_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.abort();
    db.close().await;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
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
