//! API server entry point.

use api::config::Config;
use domain::{Money, NewProduct};
use fulfillment::{Pay0Gateway, PaymentGateway};
use metrics_exporter_prometheus::PrometheusHandle;
use sqlx::postgres::PgPoolOptions;
use store::{Catalog, InMemoryLedger, Ledger, PostgresLedger};
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let registry = tracing_subscriber::registry().with(filter);

    if config.json_logs() {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn serve<L, G>(ledger: L, gateway: G, config: &Config, metrics_handle: PrometheusHandle)
where
    L: Ledger + Clone + 'static,
    G: PaymentGateway + Clone + 'static,
{
    let state = api::create_state(ledger, gateway, config);
    let app = api::create_app(state, metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");
}

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    // 1. Initialize tracing
    init_tracing(&config);

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Gateway client
    let gateway = Pay0Gateway::new(config.pay0()).expect("failed to build gateway client");
    if config.admin_token.is_none() {
        tracing::warn!("ADMIN_TOKEN not set, admin routes are unguarded");
    }

    // 4. Ledger, then serve until shutdown
    match config.database_url.as_deref() {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(config.database_max_connections)
                .connect(url)
                .await
                .expect("failed to connect to PostgreSQL");
            let ledger = PostgresLedger::new(pool);
            ledger
                .run_migrations()
                .await
                .expect("failed to run migrations");
            tracing::info!("using PostgreSQL ledger");
            serve(ledger, gateway, &config, metrics_handle).await;
        }
        None => {
            let ledger = InMemoryLedger::new();
            let demo = ledger
                .create_product(NewProduct::new("Demo License", Money::from_major(99)))
                .await
                .expect("failed to seed demo product");
            tracing::warn!(
                product_id = %demo.id,
                "DATABASE_URL not set, using in-memory ledger; data is lost on exit"
            );
            serve(ledger, gateway, &config, metrics_handle).await;
        }
    }

    tracing::info!("server shut down gracefully");
}
