use std::sync::Arc;
use std::time::Duration;

use axum::{http::HeaderValue, routing::get, Router};
use plantpulse_server::care::Calendar;
use plantpulse_server::config::Settings;
use plantpulse_server::notifications::LocalNotifier;
use plantpulse_server::reminders::{BatchActionCoordinator, ReminderLifecycleController};
use plantpulse_server::store::SeaOrmStore;
use plantpulse_server::{api, migrator};
use sea_orm::Database;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() {
    // Load .env if present (dotenvy)
    dotenvy::dotenv().ok();

    plantpulse_server::telemetry::init_telemetry("plantpulse-server");

    let settings = Settings::from_env().expect("Invalid configuration");

    let (prometheus_layer, metric_handle) = axum_prometheus::PrometheusMetricLayer::pair();

    let db = Database::connect(&settings.database_url)
        .await
        .expect("Failed to connect to database");

    use sea_orm_migration::MigratorTrait;
    migrator::Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");

    let shutdown = CancellationToken::new();
    let store = Arc::new(SeaOrmStore::new(db));
    let poller = store.spawn_poller(settings.store_poll_interval, shutdown.clone());

    plantpulse_server::metrics::init_metrics(store.as_ref()).await;

    let coordinator = Arc::new(
        BatchActionCoordinator::new(
            store.clone(),
            store.clone(),
            Arc::new(LocalNotifier::new()),
            Calendar::local(),
        )
        .with_min_lead_minutes(settings.min_lead_minutes),
    );
    let controller = Arc::new(
        ReminderLifecycleController::new(coordinator.clone())
            .with_refresh_interval(settings.refresh_interval),
    );
    let refresher = controller
        .start()
        .await
        .expect("Failed to load reminders and plants");

    let app = app(
        api::router(controller),
        &settings,
        prometheus_layer,
        metric_handle,
    );

    tracing::info!("listening on {}", settings.bind_addr);
    let listener = tokio::net::TcpListener::bind(settings.bind_addr)
        .await
        .expect("Failed to bind to address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    tracing::info!("Server stopped accepting connections, cleaning up");
    refresher.shutdown().await;
    shutdown.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(5), poller).await;
    if tokio::time::timeout(Duration::from_secs(5), coordinator.flush_side_effects())
        .await
        .is_err()
    {
        tracing::warn!("Gave up waiting for notification side effects");
    }
    tracing::info!("Graceful shutdown complete");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received SIGINT, starting graceful shutdown"),
        () = terminate => tracing::info!("Received SIGTERM, starting graceful shutdown"),
    }
}

fn app(
    routes: Router,
    settings: &Settings,
    prometheus_layer: axum_prometheus::PrometheusMetricLayer<'static>,
    metric_handle: metrics_exporter_prometheus::PrometheusHandle,
) -> Router {
    let cors_origin = settings
        .cors_origin
        .parse::<HeaderValue>()
        .unwrap_or_else(|e| panic!("Invalid CORS origin '{}': {e}", settings.cors_origin));

    api::layers::with_http_layers(routes.layer(prometheus_layer), cors_origin)
        .route("/metrics", get(|| async move { metric_handle.render() }))
}
