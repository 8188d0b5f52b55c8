//! Shared state for the HTTP handlers.

use flume_core::{ExporterConfig, UpstreamClient};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub(crate) inner: Arc<AppStateInner>,
}

pub struct AppStateInner {
    pub config: ExporterConfig,
    pub client: Arc<UpstreamClient>,
    pub metrics: PrometheusHandle,
}

impl AppState {
    pub fn new(config: ExporterConfig, client: Arc<UpstreamClient>, metrics: PrometheusHandle) -> Self {
        Self { inner: Arc::new(AppStateInner { config, client, metrics }) }
    }

    pub fn config(&self) -> &ExporterConfig {
        &self.inner.config
    }

    pub fn client(&self) -> &Arc<UpstreamClient> {
        &self.inner.client
    }

    pub fn render_metrics(&self) -> String {
        self.inner.metrics.render()
    }
}
