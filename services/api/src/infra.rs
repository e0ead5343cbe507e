use chrono::{DateTime, Utc};
use course_commission::commission::{
    import, Clock, CommissionService, InMemoryCommissionRepository, StatsCache,
};
use course_commission::config::CommissionConfig;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) type ApiService = CommissionService<InMemoryCommissionRepository>;

pub(crate) fn build_service(config: &CommissionConfig, clock: Arc<dyn Clock>) -> ApiService {
    CommissionService::new(Arc::new(InMemoryCommissionRepository::new()), clock)
        .with_default_status(config.default_header_status)
}

pub(crate) fn stats_cache(config: &CommissionConfig) -> StatsCache {
    let window = chrono::Duration::from_std(config.stats_cache_window)
        .unwrap_or_else(|_| chrono::Duration::weeks(52));
    StatsCache::new(window)
}

/// CLI value parser for RFC 3339 timestamps or `YYYY-MM-DD` dates.
pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    match import::parse_timestamp("at", Some(raw.trim())) {
        Ok(Some(at)) => Ok(at),
        Ok(None) => Err("a timestamp is required".to_string()),
        Err(err) => Err(err.to_string()),
    }
}
