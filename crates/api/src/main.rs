//! ICVK registration API server binary entrypoint.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::signal;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use icvk_common::config::AppConfig;
use icvk_common::db::{create_pool, run_migrations};
use icvk_notifier::{DeliveryChannel, Dispatcher, MailConfig, MailSession, RetryPolicy, SmtpChannel};

use icvk_api::routes::create_router;
use icvk_api::state::AppState;
use icvk_api::store::PgRegistrationStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("icvk_api=debug,icvk_notifier=debug,tower_http=debug")
        }))
        .init();

    tracing::info!("Starting ICVK registration API...");

    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url, config.db_max_connections).await?;
    run_migrations(&pool).await?;

    let channel = build_mail_channel(&config).await;
    let policy = RetryPolicy::from_config(&config);
    tracing::info!(
        max_attempts = policy.max_attempts,
        retry_delay_ms = policy.delay.as_millis() as u64,
        "Notification dispatcher ready"
    );
    let dispatcher = Dispatcher::new(channel, policy);

    if config.cloudinary_cloud_name.is_none() {
        tracing::warn!("CLOUDINARY_CLOUD_NAME is not set, registrations will be refused");
    }

    let store = Arc::new(PgRegistrationStore::new(pool.clone()));
    let port = config.server_port;
    let state = AppState::new(store, dispatcher, config);
    let server_id = state.server_id;

    let app = create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(%addr, server_id, "API server listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pool.close().await;
    tracing::info!("Server stopped; in-flight notifications were abandoned");

    Ok(())
}

/// Create the process-wide mail session and verify it against the relay.
///
/// Missing credentials or a failed verification do not stop the server;
/// registrations are still accepted and dispatches fail or retry on their own.
async fn build_mail_channel(config: &AppConfig) -> Arc<dyn DeliveryChannel> {
    let Some(mail_config) = MailConfig::from_app_config(config) else {
        tracing::warn!("EMAIL_USER or EMAIL_PASS missing, confirmation emails are disabled");
        return Arc::new(SmtpChannel::unconfigured());
    };

    match MailSession::connect(mail_config) {
        Ok(session) => {
            if let Err(e) = session.verify().await {
                tracing::warn!(error = %e, "Mail relay verification failed, sends will be retried");
            }
            Arc::new(SmtpChannel::new(session))
        }
        Err(e) => {
            tracing::error!(error = %e, "Mail session could not be created");
            Arc::new(SmtpChannel::unconfigured())
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
