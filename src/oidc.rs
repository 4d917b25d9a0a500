//! OpenID Connect client: discovery, token grants, and claims validation.

// crates.io
use base64::prelude::*;
use http::{
	HeaderMap, HeaderValue,
	header::{AUTHORIZATION, CACHE_CONTROL, CONNECTION, CONTENT_TYPE},
};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;
// self
use crate::{
	_prelude::*,
	credentials::BasicCredentials,
	http::{Gateway, ensure_success},
};

/// Discovery document fields fetched from the provider's well-known endpoint.
///
/// Fetched once at client construction and treated as immutable for the
/// client's lifetime; fields beyond the ones the crate consumes are retained
/// verbatim.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProviderMetadata {
	/// Issuer identifier asserted by the provider.
	pub issuer: String,
	/// Endpoint accepting OAuth2/OIDC token grants.
	pub token_endpoint: Url,
	/// Endpoint publishing the provider's signing keys, when advertised.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub jwks_uri: Option<Url>,
	/// Remaining discovery fields, keyed by field name.
	#[serde(flatten)]
	pub extra: Map<String, Value>,
}

/// Parsed body of a successful token-endpoint response.
///
/// Ephemeral; consumed immediately by the caller and never cached by the
/// client.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TokenResponse {
	/// Bearer token authorizing resource access.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub access_token: Option<String>,
	/// OIDC identity token, when the grant's scope requested one.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub id_token: Option<String>,
	/// Token type reported by the provider, typically `Bearer`.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub token_type: Option<String>,
	/// Lifetime of the access token in seconds.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub expires_in: Option<u64>,
	/// Remaining response fields, keyed by field name.
	#[serde(flatten)]
	pub extra: Map<String, Value>,
}
impl TokenResponse {
	/// Look up a token field by name, covering both the typed fields and any
	/// extras carried in the response.
	pub fn field(&self, name: &str) -> Option<&str> {
		match name {
			"access_token" => self.access_token.as_deref(),
			"id_token" => self.id_token.as_deref(),
			"token_type" => self.token_type.as_deref(),
			_ => self.extra.get(name).and_then(Value::as_str),
		}
	}

	/// The `access_token` field, or an error when the provider omitted it.
	pub fn require_access_token(&self) -> Result<&str> {
		self.access_token.as_deref().ok_or(Error::MissingField { field: "access_token" })
	}
}

/// Required claim names plus an optional error-claim name whose presence
/// signals a provider-reported error encoded inside the token body.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ClaimSet {
	/// Claim names that must all be present in the decoded token body.
	pub required: Vec<String>,
	/// Claim name whose presence marks the token as erroneous.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error_claim: Option<String>,
}
impl ClaimSet {
	/// Build a claim set from the required claim names.
	pub fn new<I, S>(required: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self { required: required.into_iter().map(Into::into).collect(), error_claim: None }
	}

	/// Attach an error-claim name.
	pub fn with_error_claim(mut self, claim: impl Into<String>) -> Self {
		self.error_claim = Some(claim.into());

		self
	}

	fn check(&self, body: &Map<String, Value>) -> bool {
		for claim in &self.required {
			if !body.contains_key(claim) {
				tracing::error!(%claim, "required claim is not included in the token body");

				return false;
			}
		}

		if let Some(error_claim) = &self.error_claim
			&& body.contains_key(error_claim)
		{
			tracing::error!(claim = %error_claim, "error claim present in the token body");

			return false;
		}

		true
	}
}

/// OpenID Connect client bound to a single identity provider.
///
/// Discovery runs once at construction; afterwards the client holds no
/// mutable state, so concurrent calls from independent tasks are safe.
#[derive(Clone, Debug)]
pub struct OidcClient {
	base: Url,
	gateway: Gateway,
	metadata: ProviderMetadata,
}
impl OidcClient {
	/// Connect to the identity provider at `idp_url` and snapshot its
	/// discovery document.
	pub async fn connect(idp_url: impl AsRef<str>, verify_tls: bool) -> Result<Self> {
		let base = Url::parse(idp_url.as_ref())?;

		if base.host_str().is_none() {
			return Err(Error::Validation {
				field: "idp_url",
				reason: "Must include a host component.".into(),
			});
		}

		let gateway = Gateway::new(verify_tls)?;
		let metadata = fetch_metadata(&gateway, &base).await?;

		Ok(Self { base, gateway, metadata })
	}

	/// The discovery snapshot taken at construction.
	pub fn metadata(&self) -> &ProviderMetadata {
		&self.metadata
	}

	/// Fetch the provider's well-known discovery document.
	///
	/// Idempotent; re-fetches on every call without touching the snapshot
	/// taken at construction.
	pub async fn discover(&self) -> Result<ProviderMetadata> {
		fetch_metadata(&self.gateway, &self.base).await
	}

	/// Re-run discovery and report whether the returned `issuer` matches the
	/// configured base URL.
	///
	/// Discovery failures propagate as errors rather than `false`.
	pub async fn validate_issuer(&self) -> Result<bool> {
		tracing::trace!(base = %self.base, "validating identity provider issuer");

		let metadata = self.discover().await?;

		Ok(metadata.issuer.trim_end_matches('/') == self.base.as_str().trim_end_matches('/'))
	}

	/// POST a grant request to the discovered token endpoint, authenticating
	/// the client with Basic credentials.
	///
	/// A non-2xx response fails with [`Error::TokenEndpoint`] carrying the
	/// attempted form payload and the observed status.
	pub async fn request_token(
		&self,
		credentials: &BasicCredentials,
		params: &[(&str, &str)],
	) -> Result<TokenResponse> {
		let payload = form_encode(params);

		tracing::trace!(endpoint = %self.metadata.token_endpoint, %payload, "requesting token");

		let headers = token_headers(credentials)?;
		let response = self
			.gateway
			.request(Method::POST, &self.metadata.token_endpoint, Some(payload.clone()), headers)
			.await?;
		let status = response.status();

		if !status.is_success() {
			let body = response.text().await.ok();

			tracing::error!(%status, body = ?body, "token endpoint rejected the grant");

			return Err(Error::TokenEndpoint { status, payload });
		}

		let token: TokenResponse = response.json().await?;

		tracing::debug!(token_type = ?token.token_type, expires_in = ?token.expires_in, "token grant succeeded");

		Ok(token)
	}

	/// Validate token claims against the claim set, decoding the JWT body
	/// **without signature verification**.
	///
	/// A malformed token is a logged validation failure, never an error; use
	/// [`Self::verified_claims`] when signature checking is required.
	pub fn validate_claims(&self, claim_set: &ClaimSet, token: &str) -> bool {
		tracing::debug!(required = ?claim_set.required, error_claim = ?claim_set.error_claim, "validating token claims");

		let Some(body) = decode_unverified(token) else {
			return false;
		};

		tracing::trace!(claims = ?body.keys().collect::<Vec<_>>(), "decoded token body");

		claim_set.check(&body)
	}

	/// Decode a token with full signature verification against the provider's
	/// published JWKS.
	///
	/// Opt-in counterpart to [`Self::validate_claims`]; no expiry or audience
	/// policy is applied, only the signature check.
	pub async fn verified_claims(&self, token: &str) -> Result<Map<String, Value>> {
		let Some(jwks_uri) = &self.metadata.jwks_uri else {
			return Err(Error::Validation {
				field: "jwks_uri",
				reason: "Discovery document does not advertise a JWKS endpoint.".into(),
			});
		};
		let response = self.gateway.get(jwks_uri).await?;
		let response =
			ensure_success(response, &format!("Can not fetch JWKS document from {jwks_uri}"))
				.await?;
		let jwks: jsonwebtoken::jwk::JwkSet = response.json().await?;
		let header = jsonwebtoken::decode_header(token)?;
		let jwk = match &header.kid {
			Some(kid) => jwks.find(kid),
			None => jwks.keys.first(),
		}
		.ok_or_else(|| Error::Validation {
			field: "kid",
			reason: "No matching key in the provider JWKS.".into(),
		})?;
		let key = jsonwebtoken::DecodingKey::from_jwk(jwk)?;
		let mut validation = jsonwebtoken::Validation::new(header.alg);

		validation.validate_exp = false;
		validation.validate_aud = false;
		validation.required_spec_claims.clear();

		let data = jsonwebtoken::decode::<Map<String, Value>>(token, &key, &validation)?;

		Ok(data.claims)
	}
}

async fn fetch_metadata(gateway: &Gateway, base: &Url) -> Result<ProviderMetadata> {
	let url = well_known_url(base)?;

	tracing::trace!(%url, "GET request to the well-known endpoint");

	let response = gateway.get(&url).await?;
	let response = ensure_success(
		response,
		&format!("Can not reach well-known endpoint for {base}, DNS or host file?"),
	)
	.await?;
	let metadata: ProviderMetadata = response.json().await?;

	tracing::trace!(issuer = %metadata.issuer, "obtained well-known metadata");

	Ok(metadata)
}

fn well_known_url(base: &Url) -> Result<Url> {
	let base = base.as_str().trim_end_matches('/');

	Ok(Url::parse(&format!("{base}/.well-known/openid-configuration"))?)
}

/// Decode the payload segment of a JWT without verifying its signature.
fn decode_unverified(token: &str) -> Option<Map<String, Value>> {
	let payload = token.split('.').nth(1)?;
	let bytes = match BASE64_URL_SAFE_NO_PAD.decode(payload) {
		Ok(bytes) => bytes,
		Err(err) => {
			tracing::error!(?err, "could not decode token payload");

			return None;
		},
	};

	match serde_json::from_slice(&bytes) {
		Ok(body) => Some(body),
		Err(err) => {
			tracing::error!(?err, "token payload is not a JSON object");

			None
		},
	}
}

fn form_encode(params: &[(&str, &str)]) -> String {
	url::form_urlencoded::Serializer::new(String::new()).extend_pairs(params).finish()
}

fn token_headers(credentials: &BasicCredentials) -> Result<HeaderMap> {
	let mut headers = HeaderMap::with_capacity(4);

	headers.insert(
		AUTHORIZATION,
		HeaderValue::from_str(&credentials.authorization_value()).map_err(http::Error::from)?,
	);
	headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/x-www-form-urlencoded"));
	headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
	headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));

	Ok(headers)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn client_with_metadata() -> OidcClient {
		OidcClient {
			base: Url::parse("https://idp.example").unwrap(),
			gateway: Gateway::new(true).unwrap(),
			metadata: ProviderMetadata {
				issuer: "https://idp.example".into(),
				token_endpoint: Url::parse("https://idp.example/token").unwrap(),
				jwks_uri: None,
				extra: Map::new(),
			},
		}
	}

	fn unsigned_token(body: &Value) -> String {
		let header = BASE64_URL_SAFE_NO_PAD.encode(r#"{"alg":"none","typ":"JWT"}"#);
		let payload = BASE64_URL_SAFE_NO_PAD.encode(serde_json::to_vec(body).unwrap());

		format!("{header}.{payload}.")
	}

	#[test]
	fn validate_claims_accepts_complete_claim_set() {
		let client = client_with_metadata();
		let token = unsigned_token(&serde_json::json!({ "sub": "u1", "scope": "openid" }));
		let claim_set = ClaimSet::new(["sub", "scope"]);

		assert!(client.validate_claims(&claim_set, &token));
	}

	#[test]
	fn validate_claims_rejects_missing_required_claim() {
		let client = client_with_metadata();
		let token = unsigned_token(&serde_json::json!({ "sub": "u1" }));
		let claim_set = ClaimSet::new(["sub", "scope"]);

		assert!(!client.validate_claims(&claim_set, &token));
	}

	#[test]
	fn validate_claims_rejects_present_error_claim() {
		let client = client_with_metadata();
		let token =
			unsigned_token(&serde_json::json!({ "sub": "u1", "scope": "openid", "error": "bad" }));
		let claim_set = ClaimSet::new(["sub", "scope"]).with_error_claim("error");

		assert!(!client.validate_claims(&claim_set, &token));
	}

	#[test]
	fn validate_claims_treats_malformed_token_as_failure() {
		let client = client_with_metadata();
		let claim_set = ClaimSet::new(["sub"]);

		assert!(!client.validate_claims(&claim_set, "not-a-jwt"));
		assert!(!client.validate_claims(&claim_set, "a.%%%.c"));
	}

	#[test]
	fn token_response_field_covers_typed_and_extra_fields() {
		let token = TokenResponse {
			access_token: Some("tok".into()),
			id_token: Some("idt".into()),
			extra: serde_json::json!({ "refresh_token": "rt" })
				.as_object()
				.cloned()
				.unwrap_or_default(),
			..Default::default()
		};

		assert_eq!(token.field("access_token"), Some("tok"));
		assert_eq!(token.field("id_token"), Some("idt"));
		assert_eq!(token.field("refresh_token"), Some("rt"));
		assert_eq!(token.field("absent"), None);
	}

	#[test]
	fn well_known_url_tolerates_trailing_slash() {
		let with = Url::parse("https://idp.example/").unwrap();
		let without = Url::parse("https://idp.example").unwrap();

		assert_eq!(well_known_url(&with).unwrap(), well_known_url(&without).unwrap());
		assert_eq!(
			well_known_url(&with).unwrap().as_str(),
			"https://idp.example/.well-known/openid-configuration"
		);
	}

	#[test]
	fn form_encode_joins_pairs_with_ampersands() {
		let payload = form_encode(&[("grant_type", "password"), ("scope", "openid profile")]);

		assert_eq!(payload, "grant_type=password&scope=openid+profile");
	}
}
