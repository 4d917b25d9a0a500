//! Metric emission for synthetic probes.

// std
#[cfg(feature = "prometheus")] use std::sync::OnceLock;
// crates.io
#[cfg(feature = "prometheus")]
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
// self
#[cfg(feature = "prometheus")] use crate::_prelude::*;

/// Sink accepting named numeric measurements.
///
/// The probe monitor reports one measurement per successful probe; values are
/// response times in milliseconds.
pub trait MetricsSink: Send + Sync {
	/// Record `value` under the metric `name`.
	fn put(&self, name: &str, value: f64);
}

/// Sink forwarding measurements to the `metrics` facade as gauges.
///
/// Pair with [`install_default_exporter`] (or any recorder the application
/// installs) to surface probe latencies.
#[derive(Clone, Copy, Debug, Default)]
pub struct FacadeSink;
impl MetricsSink for FacadeSink {
	fn put(&self, name: &str, value: f64) {
		metrics::gauge!(name.to_owned()).set(value);
	}
}

/// Shared Prometheus handle installed by [`install_default_exporter`].
#[cfg(feature = "prometheus")]
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the default Prometheus recorder backed by `metrics`.
///
/// Multiple invocations are safe; subsequent calls become no-ops once the
/// recorder is installed.
#[cfg(feature = "prometheus")]
pub fn install_default_exporter() -> Result<()> {
	if PROMETHEUS_HANDLE.get().is_some() {
		return Ok(());
	}

	let handle =
		PrometheusBuilder::new().install_recorder().map_err(|err| Error::Metrics(err.to_string()))?;
	let _ = PROMETHEUS_HANDLE.set(handle);

	Ok(())
}

/// Access the global Prometheus exporter handle when installed.
#[cfg(feature = "prometheus")]
pub fn prometheus_handle() -> Option<&'static PrometheusHandle> {
	PROMETHEUS_HANDLE.get()
}
