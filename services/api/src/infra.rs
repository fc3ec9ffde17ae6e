use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use heat_intake::config::AppConfig;
use heat_intake::error::AppError;
use heat_intake::intake::{FileDraftFactory, HttpRelay, IntakeSessions};
use metrics_exporter_prometheus::PrometheusHandle;
use tracing::warn;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Session registry wired to the configured relay and file-backed drafts.
pub(crate) fn build_sessions(config: &AppConfig) -> Result<Arc<IntakeSessions>, AppError> {
    let relay = HttpRelay::new(&config.relay)?;
    if config.relay.access_key.is_none() {
        warn!("RELAY_ACCESS_KEY is not set; submissions will be refused");
    }

    Ok(Arc::new(IntakeSessions::new(
        Arc::new(FileDraftFactory::new(config.drafts.dir.clone())),
        Arc::new(relay),
        config.relay.access_key.clone(),
    )
    .with_idle_ttl(Duration::from_secs(config.sessions.idle_secs))))
}
