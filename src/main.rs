use review_board::{
    AppState,
    config::{AppConfig, Env},
    create_router,
    repository::{PostgresRepository, RepositoryState},
};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::{net::TcpListener, signal};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Upper bound for reaching the database at startup. Exceeding it aborts the process.
const STARTUP_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// main
///
/// Loads configuration, initializes logging, connects to Postgres and serves HTTP.
/// Any failure before the listener is up is fatal: the process never starts serving
/// with a missing key or an unreachable store.
#[tokio::main]
async fn main() {
    // 1. Configuration (fail-fast)
    dotenv::dotenv().ok();
    let config = AppConfig::from_env().unwrap_or_else(|e| panic!("FATAL: {e}"));

    // 2. Logging
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "review_board=debug,tower_http=info".into());

    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // 3. Database
    let mut connect_options: PgConnectOptions = config
        .db_addr
        .parse()
        .unwrap_or_else(|e| panic!("FATAL: GUESTBOOK_DB_ADDR is not a valid Postgres URL: {e}"));
    if let Some((user, password)) = config.db_credentials() {
        connect_options = connect_options.username(user).password(password);
    }

    let pool = tokio::time::timeout(
        STARTUP_CONNECT_TIMEOUT,
        PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(STARTUP_CONNECT_TIMEOUT)
            .connect_with(connect_options),
    )
    .await
    .unwrap_or_else(|_| panic!("FATAL: Postgres not reachable within {STARTUP_CONNECT_TIMEOUT:?}"))
    .unwrap_or_else(|e| panic!("FATAL: Failed to connect to Postgres: {e}"));
    tracing::info!("Successfully connected to Postgres");

    let repository = PostgresRepository::new(pool);
    repository
        .ensure_schema()
        .await
        .unwrap_or_else(|e| panic!("FATAL: Failed to prepare schema: {e}"));
    let repo = Arc::new(repository) as RepositoryState;

    // 4. State and router
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let app = create_router(AppState::new(config, repo));

    // 5. Serve
    let listener = TcpListener::bind(addr)
        .await
        .unwrap_or_else(|e| panic!("FATAL: Failed to bind {addr}: {e}"));
    tracing::info!("App listening on {addr}");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %e, "server terminated with an error");
    }
}

/// Resolves on Ctrl-C or SIGTERM so in-flight requests can finish.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl-C");
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
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
