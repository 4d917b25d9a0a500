//! Synthetic probes exercising OIDC flows and reporting latency metrics.
//!
//! Probe methods never fail: every client-layer error is caught at the probe
//! boundary, logged, and converted into an [`ProbeStatus::Error`] outcome so
//! an unattended harness keeps running through individual failures.

// std
use std::fmt::{Debug, Formatter, Result as FmtResult};
// crates.io
use serde::{Deserialize, Serialize};
// self
use crate::{
	_prelude::*,
	credentials::BasicCredentials,
	metrics::MetricsSink,
	oidc::{ClaimSet, OidcClient},
};

/// Metric name for the password-grant probe.
pub const METRIC_ROPC: &str = "idp-ropc-response";
/// Metric name for the client-credentials probe.
pub const METRIC_CLIENT_CREDENTIALS: &str = "idp-client-credentials-response";
/// Metric name for the claims-validation probe.
pub const METRIC_SCOPES: &str = "idp-scopes-response";

/// Tagged probe outcome status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProbeStatus {
	/// The probed flow completed and validated.
	#[serde(rename = "OK")]
	Ok,
	/// The probed flow failed; details are in the log, not the outcome.
	#[serde(rename = "ERROR")]
	Error,
}

/// Uniform result of a single probe invocation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProbeOutcome {
	/// Pass/fail tag.
	pub status: ProbeStatus,
	/// Elapsed time of the probed operation in milliseconds; present only on
	/// success.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub response_time: Option<f64>,
}
impl ProbeOutcome {
	/// Whether the probe passed.
	pub fn is_ok(&self) -> bool {
		self.status == ProbeStatus::Ok
	}

	fn ok(elapsed: Duration) -> Self {
		Self { status: ProbeStatus::Ok, response_time: Some(elapsed.as_secs_f64() * 1_000.0) }
	}

	fn error() -> Self {
		Self { status: ProbeStatus::Error, response_time: None }
	}
}

/// Synthetic-monitoring harness around one [`OidcClient`].
///
/// Owns the client and a metrics sink for its whole lifetime; holds no other
/// state, so an external scheduler can drive probes concurrently.
pub struct ProbeMonitor {
	oidc: OidcClient,
	credentials: BasicCredentials,
	sink: Arc<dyn MetricsSink>,
}
impl ProbeMonitor {
	/// Build a monitor over an already-connected client.
	pub fn new(oidc: OidcClient, credentials: BasicCredentials, sink: Arc<dyn MetricsSink>) -> Self {
		Self { oidc, credentials, sink }
	}

	/// Run a password-grant probe with the caller-supplied form payload.
	pub async fn ropc(&self, payload: &[(&str, &str)]) -> ProbeOutcome {
		tracing::info!("starting ROPC probe");

		self.timed_grant(METRIC_ROPC, payload).await
	}

	/// [`Self::ropc`] with `grant_type=password` and `scope=openid` fixed.
	pub async fn default_ropc(&self, username: &str, password: &str) -> ProbeOutcome {
		self.ropc(&[
			("grant_type", "password"),
			("username", username),
			("password", password),
			("scope", "openid"),
		])
		.await
	}

	/// Run a client-credentials-grant probe.
	pub async fn client_credentials(&self) -> ProbeOutcome {
		tracing::info!("starting client_credentials probe");

		self.timed_grant(METRIC_CLIENT_CREDENTIALS, &[("grant_type", "client_credentials")]).await
	}

	/// Run a password grant with the given scopes, then validate the claims
	/// of the token carried in `token_field` (`id_token` when unspecified).
	///
	/// A failed claim validation is reported exactly like a thrown error.
	pub async fn claims_validation(
		&self,
		scopes: &[&str],
		username: &str,
		password: &str,
		claim_set: &ClaimSet,
		token_field: Option<&str>,
	) -> ProbeOutcome {
		let token_field = token_field.unwrap_or("id_token");

		tracing::info!(token_field, "starting claims validation probe");

		let scope = scopes.join(" ");
		let payload = [
			("grant_type", "password"),
			("username", username),
			("password", password),
			("scope", scope.as_str()),
		];
		let start = Instant::now();
		let token = match self.oidc.request_token(&self.credentials, &payload).await {
			Ok(token) => token,
			Err(err) => {
				tracing::error!(?err, "claims validation probe failed");

				return ProbeOutcome::error();
			},
		};
		let elapsed = start.elapsed();
		let Some(jwt) = token.field(token_field) else {
			tracing::error!(token_field, "token response does not carry the requested field");

			return ProbeOutcome::error();
		};

		if self.oidc.validate_claims(claim_set, jwt) {
			let outcome = ProbeOutcome::ok(elapsed);

			tracing::info!(response_time = ?outcome.response_time, "claims validation probe OK");
			self.emit(METRIC_SCOPES, &outcome);

			outcome
		} else {
			tracing::error!("invalid JWT");

			ProbeOutcome::error()
		}
	}

	async fn timed_grant(&self, metric: &'static str, payload: &[(&str, &str)]) -> ProbeOutcome {
		let start = Instant::now();

		match self.oidc.request_token(&self.credentials, payload).await {
			Ok(token) => {
				let outcome = ProbeOutcome::ok(start.elapsed());

				tracing::info!(
					metric,
					response_time = ?outcome.response_time,
					token_type = ?token.token_type,
					"probe OK"
				);
				self.emit(metric, &outcome);

				outcome
			},
			Err(err) => {
				tracing::error!(metric, ?err, "probe failed");

				ProbeOutcome::error()
			},
		}
	}

	fn emit(&self, metric: &str, outcome: &ProbeOutcome) {
		if let Some(response_time) = outcome.response_time {
			self.sink.put(metric, response_time);
		}
	}
}
impl Debug for ProbeMonitor {
	fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
		f.debug_struct("ProbeMonitor").field("oidc", &self.oidc).finish_non_exhaustive()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn error_outcome_serializes_without_response_time() {
		let json = serde_json::to_value(ProbeOutcome::error()).unwrap();

		assert_eq!(json, serde_json::json!({ "status": "ERROR" }));
	}

	#[test]
	fn ok_outcome_serializes_with_milliseconds() {
		let json = serde_json::to_value(ProbeOutcome::ok(Duration::from_millis(250))).unwrap();

		assert_eq!(json["status"], "OK");
		assert!((json["response_time"].as_f64().unwrap() - 250.0).abs() < f64::EPSILON);
	}
}
