//! HTTP gateway shared by the OIDC and UMA clients.
//!
//! Every protocol failure in the crate surfaces through [`ensure_success`],
//! which classifies responses by status code and converts non-2xx outcomes
//! into [`Error::HttpStatus`].

// crates.io
use http::HeaderMap;
use reqwest::{Client, Method, Response};
use tokio::time;
use url::Url;
// self
use crate::_prelude::*;

/// Thin wrapper over [`reqwest::Client`] carrying the TLS-verification switch.
#[derive(Clone, Debug)]
pub struct Gateway {
	client: Client,
}
impl Gateway {
	/// Build a gateway; `verify_tls = false` accepts invalid certificates,
	/// mirroring probes run against test deployments with self-signed chains.
	pub fn new(verify_tls: bool) -> Result<Self> {
		let client = Client::builder().danger_accept_invalid_certs(!verify_tls).build()?;

		Ok(Self { client })
	}

	/// Issue a request with the given method, optional raw body, and headers.
	pub async fn request(
		&self,
		method: Method,
		url: &Url,
		body: Option<String>,
		headers: HeaderMap,
	) -> Result<Response> {
		tracing::trace!(%method, %url, "dispatching request");

		let mut builder = self.client.request(method, url.clone()).headers(headers);

		if let Some(body) = body {
			builder = builder.body(body);
		}

		Ok(builder.send().await?)
	}

	/// Convenience `GET` without body or extra headers.
	pub async fn get(&self, url: &Url) -> Result<Response> {
		self.request(Method::GET, url, None, HeaderMap::new()).await
	}
}

/// Pass the response through when its status is 2xx; otherwise drain the body
/// for diagnostics (closing the connection) and fail with the formatted
/// context message.
pub async fn ensure_success(response: Response, context: &str) -> Result<Response> {
	let status = response.status();

	if status.is_success() {
		return Ok(response);
	}

	let url = response.url().clone();
	let body = response.text().await.ok();

	tracing::error!(%status, %url, context, "request failed");

	Err(Error::HttpStatus { status, url, body })
}

/// Poll `GET url` until a 2xx response arrives, sleeping `interval` between
/// attempts, for at most `iterations` attempts.
///
/// Transport errors during an attempt are logged and retried; exhaustion of
/// the attempt budget fails with [`Error::EndpointUnavailable`].
pub async fn wait_for_endpoint(
	gateway: &Gateway,
	url: &Url,
	iterations: u32,
	interval: Duration,
) -> Result<()> {
	for iteration in 0..iterations {
		tracing::debug!(iteration, %url, "probing endpoint availability");

		match gateway.get(url).await {
			Ok(response) if response.status().is_success() => {
				tracing::debug!(%url, status = %response.status(), "endpoint is up");

				return Ok(());
			},
			Ok(response) => {
				tracing::trace!(%url, status = %response.status(), "endpoint not ready");
			},
			Err(err) => {
				tracing::debug!(%url, ?err, "endpoint unreachable");
			},
		}

		if iteration + 1 < iterations {
			tracing::info!(%url, interval = ?interval, "waiting before next attempt");
			time::sleep(interval).await;
		}
	}

	Err(Error::EndpointUnavailable { url: url.clone(), attempts: iterations })
}
