//! Client credential material for Basic-auth protected endpoints.

// std
use std::fmt::{Debug, Formatter, Result as FmtResult};
// crates.io
use base64::prelude::*;
use serde::{Deserialize, Serialize};
// self
use crate::_prelude::*;

/// Pre-encoded `client_id:client_secret` pair for HTTP Basic authentication.
///
/// The value is owned by the caller and passed by reference into every client
/// operation that needs it; it is never mutated after construction.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BasicCredentials {
	encoded: Arc<str>,
}
impl BasicCredentials {
	/// Encode a `client_id`/`client_secret` pair into Basic-auth form.
	pub fn encode(client_id: &str, client_secret: &str) -> Self {
		let encoded = BASE64_STANDARD.encode(format!("{client_id}:{client_secret}"));

		Self { encoded: Arc::from(encoded) }
	}

	/// Wrap an already base64-encoded `client_id:client_secret` string.
	pub fn from_encoded(value: impl Into<String>) -> Result<Self> {
		let value = value.into();

		if value.trim().is_empty() {
			return Err(Error::Validation {
				field: "credentials",
				reason: "Must not be empty.".into(),
			});
		}
		if BASE64_STANDARD.decode(value.trim()).is_err() {
			return Err(Error::Validation {
				field: "credentials",
				reason: "Must be valid base64.".into(),
			});
		}

		Ok(Self { encoded: Arc::from(value.trim()) })
	}

	/// The base64-encoded credential string.
	pub fn as_encoded(&self) -> &str {
		&self.encoded
	}

	/// Full `Authorization` header value for Basic client authentication.
	pub fn authorization_value(&self) -> String {
		format!("Basic {}", self.encoded)
	}
}
impl Debug for BasicCredentials {
	fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
		write!(f, "BasicCredentials(<redacted>)")
	}
}
impl TryFrom<String> for BasicCredentials {
	type Error = Error;

	fn try_from(value: String) -> Result<Self> {
		Self::from_encoded(value)
	}
}
impl From<BasicCredentials> for String {
	fn from(value: BasicCredentials) -> Self {
		value.encoded.to_string()
	}
}
