//! Crate-wide error types and `Result` alias.

/// Library-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for the OIDC/UMA client crate.
#[allow(missing_docs)]
#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Http(#[from] http::Error),
	#[error(transparent)]
	Jsonwebtoken(#[from] jsonwebtoken::errors::Error),
	#[error(transparent)]
	Reqwest(#[from] reqwest::Error),
	#[error(transparent)]
	Serde(#[from] serde_json::Error),
	#[error(transparent)]
	Url(#[from] url::ParseError),

	#[error("Upstream HTTP status {status} from {url}: {body:?}")]
	HttpStatus { status: http::StatusCode, url: url::Url, body: Option<String> },
	#[error("Endpoint {url} still unavailable after {attempts} attempts.")]
	EndpointUnavailable { url: url::Url, attempts: u32 },
	#[error("Metrics error: {0}")]
	Metrics(String),
	#[error("Token response is missing the '{field}' field.")]
	MissingField { field: &'static str },
	#[error("Ticket exchange failed with HTTP status {status}, UMA may not be enabled.")]
	TicketExchange { status: http::StatusCode },
	#[error("Token endpoint rejected payload '{payload}' with HTTP status {status}.")]
	TokenEndpoint { status: http::StatusCode, payload: String },
	#[error("Validation failed for {field}: {reason}")]
	Validation { field: &'static str, reason: String },
}
