//! Crate-level error types shared across flows, transports, and stores.

// self
use crate::{
	_prelude::*,
	auth::{AccountId, ExternalAccountId, IdentifierError, TokenRecordBuilderError},
	provider::{GrantType, ProviderDescriptorError, ProviderErrorKind},
};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
///
/// Use [`Error::requires_reauthorization`] and [`Error::is_transient`] to decide between
/// re-running the authorize redirect and retrying the call.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Token endpoint rejected the exchange or answered with an unusable body.
	#[error(transparent)]
	Upstream(#[from] UpstreamError),

	/// No account is registered under the requested external identifier.
	#[error("No account is registered for `{external_id}`.")]
	NoAccount {
		/// External identifier that was looked up.
		external_id: ExternalAccountId,
	},
	/// The account exists but holds no token record.
	#[error("Account `{account}` has no stored token record.")]
	NoToken {
		/// Internal account identifier.
		account: AccountId,
	},
	/// The stored token is stale and no refresh token is available to renew it.
	#[error("Stored token for account `{account}` is stale and carries no refresh token.")]
	NoRefreshToken {
		/// Internal account identifier.
		account: AccountId,
	},
	/// Concurrent writers kept replacing the record with stale tokens during a refresh.
	#[error("Token record for account `{account}` kept changing while storing a refresh.")]
	WriteContention {
		/// Internal account identifier.
		account: AccountId,
	},
	/// The authorization callback arrived without a usable code.
	#[error("Authorization callback did not include a code.")]
	MissingCode,
	/// The authorization callback echoed a `state` that was never issued.
	#[error("Authorization callback state does not match the issued session.")]
	StateMismatch,
	/// A bounded wait elapsed before the operation completed.
	#[error("Timed out while waiting for the {operation}.")]
	Timeout {
		/// Label of the operation that timed out.
		operation: &'static str,
	},
	/// The partner API answered a bearer-authenticated request with a non-success status.
	#[error("Partner API returned HTTP {status}: {body}")]
	Api {
		/// HTTP status code.
		status: u16,
		/// Raw response body.
		body: String,
	},
	/// The partner API returned a body that does not match the expected shape.
	#[error("Partner API returned malformed JSON.")]
	ApiDecode {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
}
impl Error {
	/// Returns `true` when only a fresh authorization-code grant can resolve the failure.
	pub fn requires_reauthorization(&self) -> bool {
		match self {
			Self::NoAccount { .. }
			| Self::NoToken { .. }
			| Self::NoRefreshToken { .. }
			| Self::StateMismatch => true,
			Self::Upstream(err) => err.requires_reauthorization(),
			_ => false,
		}
	}

	/// Returns `true` when the failure is an infrastructure fault that is safe to retry.
	pub fn is_transient(&self) -> bool {
		match self {
			Self::Storage(_)
			| Self::Transport(_)
			| Self::Timeout { .. }
			| Self::WriteContention { .. } => true,
			Self::Upstream(err) => err.is_transient(),
			Self::Api { status, .. } => *status == 429 || *status >= 500,
			_ => false,
		}
	}
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// A required setting is absent or empty.
	#[error("Missing required setting `{name}`.")]
	MissingSetting {
		/// Setting (environment variable) name.
		name: &'static str,
	},
	/// A setting is present but cannot be parsed.
	#[error("Setting `{name}` is invalid: {reason}.")]
	InvalidSetting {
		/// Setting (environment variable) name.
		name: &'static str,
		/// Parser-supplied reason string.
		reason: String,
	},
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// Token request body could not be encoded.
	#[error("Token request body could not be encoded.")]
	RequestEncoding {
		/// Underlying serializer failure.
		#[source]
		source: serde_json::Error,
	},
	/// Provider descriptor failed validation.
	#[error(transparent)]
	InvalidDescriptor(#[from] ProviderDescriptorError),
	/// Redirect URI cannot be parsed.
	#[error("Redirect URI is invalid.")]
	InvalidRedirect {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// A partner API path cannot be resolved against the base URL.
	#[error("Partner API path `{path}` is invalid.")]
	InvalidApiPath {
		/// Path that failed to resolve.
		path: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// An identifier failed validation.
	#[error(transparent)]
	InvalidIdentifier(#[from] IdentifierError),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Token endpoint failures; the raw status and body are preserved for diagnosis.
#[derive(Debug, ThisError)]
pub enum UpstreamError {
	/// Token endpoint answered with a non-success status.
	#[error("Token endpoint rejected the {grant} grant with HTTP {status}: {body}")]
	Rejected {
		/// Grant that was attempted.
		grant: GrantType,
		/// HTTP status code.
		status: u16,
		/// Raw response body, verbatim.
		body: String,
		/// OAuth `error` code parsed from the body, when present.
		oauth_error: Option<String>,
		/// Strategy classification of the failure.
		kind: ProviderErrorKind,
	},
	/// Token endpoint returned a success status with a body that is not a token response.
	#[error("Token endpoint returned malformed JSON for the {grant} grant (HTTP {status}).")]
	Malformed {
		/// Grant that was attempted.
		grant: GrantType,
		/// HTTP status code.
		status: u16,
		/// Raw response body, verbatim.
		body: String,
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// Token endpoint response omitted `access_token`.
	#[error("Token endpoint response for the {grant} grant is missing access_token: {body}")]
	MissingAccessToken {
		/// Grant that was attempted.
		grant: GrantType,
		/// HTTP status code.
		status: u16,
		/// Raw response body, verbatim.
		body: String,
	},
	/// Token endpoint reported a lifetime that cannot be represented as a future instant.
	#[error("Token endpoint returned unusable expires_in `{value}` for the {grant} grant.")]
	InvalidExpiresIn {
		/// Grant that was attempted.
		grant: GrantType,
		/// Reported lifetime in seconds.
		value: i64,
	},
	/// Token endpoint answered with values that do not form a storable token record.
	#[error("Token endpoint response for the {grant} grant cannot be stored.")]
	UnusableGrant {
		/// Grant that was attempted.
		grant: GrantType,
		/// Record validation failure.
		#[source]
		source: TokenRecordBuilderError,
	},
}
impl UpstreamError {
	/// Grant that produced the failure.
	pub fn grant(&self) -> GrantType {
		match self {
			Self::Rejected { grant, .. }
			| Self::Malformed { grant, .. }
			| Self::MissingAccessToken { grant, .. }
			| Self::InvalidExpiresIn { grant, .. }
			| Self::UnusableGrant { grant, .. } => *grant,
		}
	}

	/// HTTP status returned by the token endpoint, if one was observed.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Rejected { status, .. }
			| Self::Malformed { status, .. }
			| Self::MissingAccessToken { status, .. } => Some(*status),
			Self::InvalidExpiresIn { .. } | Self::UnusableGrant { .. } => None,
		}
	}

	/// Raw response body returned by the token endpoint, if one was observed.
	pub fn body(&self) -> Option<&str> {
		match self {
			Self::Rejected { body, .. }
			| Self::Malformed { body, .. }
			| Self::MissingAccessToken { body, .. } => Some(body.as_str()),
			Self::InvalidExpiresIn { .. } | Self::UnusableGrant { .. } => None,
		}
	}

	/// Returns `true` when the grant itself was refused (revoked or consumed).
	pub fn requires_reauthorization(&self) -> bool {
		matches!(self, Self::Rejected { kind: ProviderErrorKind::InvalidGrant, .. })
	}

	/// Returns `true` when the token endpoint signalled a temporary condition.
	pub fn is_transient(&self) -> bool {
		matches!(self, Self::Rejected { kind: ProviderErrorKind::Transient, .. })
	}
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling {target}.")]
	Network {
		/// Endpoint family that was being called.
		target: &'static str,
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the token endpoint.")]
	Io(#[from] std::io::Error),
	/// HTTP client failed without a structured error.
	#[error("HTTP client error occurred while calling the token endpoint: {message}.")]
	Other {
		/// Client-supplied message.
		message: String,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error raised while calling the token endpoint.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { target: "the token endpoint", source: Box::new(src) }
	}

	/// Wraps a transport-specific network error raised while calling the partner API.
	pub fn api(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { target: "the partner API", source: Box::new(src) }
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::store::StoreError;

	fn rejected(kind: ProviderErrorKind) -> Error {
		UpstreamError::Rejected {
			grant: GrantType::RefreshToken,
			status: 400,
			body: "{\"error\":\"invalid_grant\"}".into(),
			oauth_error: Some("invalid_grant".into()),
			kind,
		}
		.into()
	}

	#[test]
	fn rejected_grant_keeps_raw_body_in_message() {
		let err = rejected(ProviderErrorKind::InvalidGrant);

		assert!(err.to_string().contains("invalid_grant"));
		assert!(err.to_string().contains("HTTP 400"));
		assert!(err.requires_reauthorization());
		assert!(!err.is_transient());
	}

	#[test]
	fn infrastructure_failures_are_transient() {
		let store: Error = StoreError::Backend { message: "connection reset".into() }.into();
		let timeout = Error::Timeout { operation: "credential store read" };

		assert!(store.is_transient());
		assert!(!store.requires_reauthorization());
		assert!(timeout.is_transient());
		assert!(rejected(ProviderErrorKind::Transient).is_transient());
	}

	#[test]
	fn missing_state_requires_reauthorization() {
		let err = Error::NoAccount {
			external_id: ExternalAccountId::new("default-account")
				.expect("External account fixture should be valid."),
		};

		assert!(err.requires_reauthorization());
		assert!(!Error::MissingCode.is_transient());
	}

	#[test]
	fn upstream_accessors_expose_diagnostics() {
		let Error::Upstream(err) = rejected(ProviderErrorKind::InvalidClient) else {
			panic!("Rejected fixture should convert into Error::Upstream.");
		};

		assert_eq!(err.grant(), GrantType::RefreshToken);
		assert_eq!(err.status(), Some(400));
		assert_eq!(err.body(), Some("{\"error\":\"invalid_grant\"}"));
		assert!(!err.requires_reauthorization());
	}
}
