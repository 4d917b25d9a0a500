//! UMA 2.0 client: permission-ticket challenge, RPT exchange, and authorized
//! resource calls.
//!
//! Each RPT acquisition restarts from scratch; no ticket or token survives a
//! call, so there is no partial-success state to resume and callers needing
//! resilience retry the whole sequence.

// crates.io
use http::{
	HeaderMap, HeaderValue, StatusCode,
	header::{AUTHORIZATION, CACHE_CONTROL, CONNECTION, CONTENT_TYPE, WWW_AUTHENTICATE},
};
use reqwest::Method;
use serde_json::{Map, Value};
use url::Url;
// self
use crate::{
	_prelude::*,
	credentials::BasicCredentials,
	http::{Gateway, ensure_success},
	oidc::OidcClient,
};

/// Grant type exchanging a permission ticket for an RPT.
pub const UMA_TICKET_GRANT: &str = "urn:ietf:params:oauth:grant-type:uma-ticket";

/// Client for a UMA-protected resource API.
///
/// Holds only immutable configuration; concurrent calls from independent
/// tasks are safe.
#[derive(Clone, Debug)]
pub struct UmaClient {
	api_base: Url,
	credentials: BasicCredentials,
	verify_tls: bool,
	gateway: Gateway,
}
impl UmaClient {
	/// Build a client for the protected API rooted at `api_base`.
	pub fn new(
		api_base: impl AsRef<str>,
		credentials: BasicCredentials,
		verify_tls: bool,
	) -> Result<Self> {
		let api_base = Url::parse(api_base.as_ref())?;

		if api_base.host_str().is_none() {
			return Err(Error::Validation {
				field: "api_base",
				reason: "Must include a host component.".into(),
			});
		}

		let gateway = Gateway::new(verify_tls)?;

		Ok(Self { api_base, credentials, verify_tls, gateway })
	}

	/// Acquire an RPT for `path`.
	///
	/// Issues an unauthenticated request expecting a 401 challenge whose
	/// `WWW-Authenticate` header carries a `ticket` attribute, then exchanges
	/// the ticket at the identity provider derived from the resource base's
	/// scheme and authority. Any other challenge status is a protocol
	/// violation reported through [`Error::TicketExchange`].
	pub async fn acquire_rpt(&self, path: &str, method: Method) -> Result<String> {
		let url = self.resource_url(path)?;

		tracing::trace!(%url, %method, "starting RPT acquisition");

		let response =
			self.gateway.request(method, &url, Some(String::new()), bearer_headers("")?).await?;
		let status = response.status();

		if status != StatusCode::UNAUTHORIZED {
			drop(response);

			tracing::error!(%status, "expected a 401 ticket challenge");

			return Err(Error::TicketExchange { status });
		}

		let ticket = response
			.headers()
			.get(WWW_AUTHENTICATE)
			.and_then(|value| value.to_str().ok())
			.and_then(extract_ticket)
			.ok_or_else(|| Error::Validation {
				field: "www_authenticate",
				reason: "Challenge carries no ticket attribute.".into(),
			})?;

		tracing::trace!(%ticket, "ticket value extracted");
		drop(response);

		let idp_url = authority_base(&self.api_base)?;

		exchange_ticket_for_token(&idp_url, &self.credentials, &ticket, self.verify_tls).await
	}

	/// Execute an authorized call against the protected API.
	///
	/// Acquires a fresh RPT when none is supplied. The response body is
	/// returned as parsed JSON of whatever shape the API produced; a body
	/// that does not parse as JSON yields an empty object rather than an
	/// error.
	pub async fn execute(
		&self,
		method: Method,
		path: &str,
		body: Option<&Value>,
		rpt: Option<&str>,
	) -> Result<Value> {
		let url = self.resource_url(path)?;
		let rpt = match rpt {
			Some(rpt) => rpt.to_string(),
			None => self.acquire_rpt(path, method.clone()).await?,
		};
		let payload = body.map(serde_json::to_string).transpose()?.unwrap_or_default();

		tracing::debug!(%method, %url, %payload, "UMA request");

		let response =
			self.gateway.request(method, &url, Some(payload), bearer_headers(&rpt)?).await?;
		let response = ensure_success(response, "UMA execute failed").await?;

		Ok(response.json().await.unwrap_or_else(|_| Value::Object(Map::new())))
	}

	/// `GET` forwarder onto [`Self::execute`].
	pub async fn get(&self, path: &str) -> Result<Value> {
		self.execute(Method::GET, path, None, None).await
	}

	/// `POST` forwarder onto [`Self::execute`].
	pub async fn post(&self, path: &str, body: &Value) -> Result<Value> {
		self.execute(Method::POST, path, Some(body), None).await
	}

	/// `PUT` forwarder onto [`Self::execute`].
	pub async fn put(&self, path: &str, body: &Value) -> Result<Value> {
		self.execute(Method::PUT, path, Some(body), None).await
	}

	/// `DELETE` forwarder onto [`Self::execute`].
	pub async fn delete(&self, path: &str) -> Result<Value> {
		self.execute(Method::DELETE, path, None, None).await
	}

	fn resource_url(&self, path: &str) -> Result<Url> {
		let base = self.api_base.as_str().trim_end_matches('/');

		Ok(Url::parse(&format!("{base}/{}", path.trim_start_matches('/')))?)
	}
}

/// Exchange a permission ticket for an RPT access token at the given identity
/// provider.
///
/// Stateless by construction: performs discovery, runs the UMA-ticket grant,
/// and extracts `access_token`, holding nothing across calls.
pub async fn exchange_ticket_for_token(
	idp_url: &Url,
	credentials: &BasicCredentials,
	ticket: &str,
	verify_tls: bool,
) -> Result<String> {
	tracing::trace!(%idp_url, "exchanging ticket for an RPT");

	let oidc = OidcClient::connect(idp_url.as_str(), verify_tls).await?;
	let token = oidc
		.request_token(credentials, &[("grant_type", UMA_TICKET_GRANT), ("ticket", ticket)])
		.await?;

	Ok(token.require_access_token()?.to_string())
}

/// Pull the `ticket` attribute out of a `WWW-Authenticate` challenge header.
///
/// The attribute list is comma-separated with whitespace around keys and
/// optional quoting around values; both the observed bare format and
/// RFC-style quoting are accepted.
fn extract_ticket(header: &str) -> Option<String> {
	header.split(',').find_map(|attribute| {
		let (key, value) = attribute.split_once('=')?;

		(key.trim() == "ticket").then(|| value.trim().trim_matches('"').to_string())
	})
}

/// Scheme+authority of a URL, dropping any path.
fn authority_base(url: &Url) -> Result<Url> {
	Ok(Url::parse(&url.origin().ascii_serialization())?)
}

fn bearer_headers(token: &str) -> Result<HeaderMap> {
	let mut headers = HeaderMap::with_capacity(4);

	headers.insert(
		AUTHORIZATION,
		HeaderValue::from_str(&format!("Bearer {token}")).map_err(http::Error::from)?,
	);
	headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
	headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
	headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));

	Ok(headers)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn extract_ticket_handles_bare_and_quoted_values() {
		assert_eq!(
			extract_ticket("Bearer realm=\"x\", ticket=abc123"),
			Some("abc123".to_string())
		);
		assert_eq!(
			extract_ticket("UMA realm=\"rs\", as_uri=\"https://idp\", ticket=\"t-1\""),
			Some("t-1".to_string())
		);
		assert_eq!(extract_ticket("Bearer realm=\"x\""), None);
		assert_eq!(extract_ticket(""), None);
	}

	#[test]
	fn authority_base_strips_the_path() {
		let api = Url::parse("https://myidp.org.com/identity/restv1/api/v1").unwrap();

		assert_eq!(authority_base(&api).unwrap().as_str(), "https://myidp.org.com/");
	}

	#[test]
	fn resource_url_joins_without_duplicate_slashes() {
		let client = UmaClient::new(
			"https://rs.example/api/v1/",
			BasicCredentials::encode("id", "secret"),
			true,
		)
		.unwrap();

		assert_eq!(
			client.resource_url("/orders/1").unwrap().as_str(),
			"https://rs.example/api/v1/orders/1"
		);
		assert_eq!(
			client.resource_url("orders/1").unwrap().as_str(),
			"https://rs.example/api/v1/orders/1"
		);
	}
}
