//! Metrics collection and Prometheus export.
//!
//! Installs the global `metrics` recorder and renders the /metrics payload.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

/// Coupon validations by result (`valid`, `invalid`, `not_found`, `error`).
pub const COUPON_VALIDATIONS_TOTAL: &str = "coupon_validations_total";

/// Applicable-coupon lookups and how many coupons each returned.
pub const APPLICABLE_LOOKUPS_TOTAL: &str = "coupon_applicable_lookups_total";
pub const APPLICABLE_COUPONS_RETURNED: &str = "coupon_applicable_coupons_returned";

/// Coupon store query latency by operation.
pub const DB_QUERY_DURATION: &str = "coupon_db_query_duration_seconds";

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder once per process.
///
/// Later calls reuse the first handle. If another recorder is already
/// installed globally, metrics are still rendered from our handle but
/// nothing is recorded into it.
pub fn init_metrics() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let recorder = PrometheusBuilder::new().build_recorder();
            let handle = recorder.handle();
            if let Err(e) = metrics::set_global_recorder(recorder) {
                tracing::warn!(error = %e, "Metrics recorder already installed");
            }
            handle
        })
        .clone()
}

/// Current metrics in Prometheus text format.
pub fn get_metrics() -> String {
    METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_else(|| "# Metrics recorder not initialized".to_string())
}
