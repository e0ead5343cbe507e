use crate::cli::ServeArgs;
use crate::infra::{build_service, stats_cache, AppState};
use crate::routes::with_commission_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use course_commission::commission::{spawn_status_sweep, SeedImporter, SystemClock};
use course_commission::config::AppConfig;
use course_commission::error::AppError;
use course_commission::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }
    if let Some(seed_csv) = args.seed_csv.take() {
        config.commission.seed_csv = Some(seed_csv);
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let service = Arc::new(build_service(&config.commission, Arc::new(SystemClock)));
    if let Some(seed_csv) = &config.commission.seed_csv {
        let summary = SeedImporter::from_path(seed_csv, service.as_ref())?;
        info!(
            path = %seed_csv.display(),
            headers = summary.headers_created(),
            details = summary.details_created,
            "commission seed loaded"
        );
    }
    let _sweep = spawn_status_sweep(service.clone(), config.commission.sweep_interval);
    let stats = Arc::new(stats_cache(&config.commission));

    let app = with_commission_routes(service, stats)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "course commission service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
