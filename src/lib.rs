//! Async OIDC/UMA 2.0 client with synthetic identity-provider probes — token
//! grants, RPT ticket exchange, and latency metrics.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod credentials;
pub mod http;
pub mod metrics;
pub mod monitor;
pub mod oidc;
pub mod uma;

mod error;
mod _prelude {
	pub use std::{sync::Arc, time::Duration};

	pub use tokio::time::Instant;

	pub use crate::{Error, Result};
}

pub use crate::{
	credentials::BasicCredentials,
	error::{Error, Result},
	metrics::{FacadeSink, MetricsSink},
	monitor::{ProbeMonitor, ProbeOutcome, ProbeStatus},
	oidc::{ClaimSet, OidcClient, ProviderMetadata, TokenResponse},
	uma::{UMA_TICKET_GRANT, UmaClient, exchange_ticket_for_token},
};
#[cfg(feature = "prometheus")] pub use crate::metrics::install_default_exporter;
