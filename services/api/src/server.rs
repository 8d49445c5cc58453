use crate::cli::ServeArgs;
use crate::infra::{in_memory_services, Adapters, AppState};
use crate::routes::with_service_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use hireloop::config::AppConfig;
use hireloop::error::AppError;
use hireloop::telemetry;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    if config.billing.webhook_secret.is_none() {
        warn!("BILLING_WEBHOOK_SECRET is unset; billing webhooks will be refused");
    }

    let adapters = Adapters::from_config(&config)?;
    let (services, _subscriptions) = in_memory_services(&config, adapters)?;
    let shutdown = services.shutdown.clone();

    let app = with_service_routes(services)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "hireloop api ready");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                error!(error = %err, "failed to listen for ctrl-c; serving until the process is killed");
                std::future::pending::<()>().await;
            }
            info!("shutdown requested; cancelling batch rescoring");
            shutdown.cancel();
        })
        .await?;
    Ok(())
}
