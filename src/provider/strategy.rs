//! Provider strategy hooks that customize token exchanges.
//!
//! Implementations decorate outgoing JSON token requests and normalize error mapping
//! without tying the authorization client to any particular HTTP stack.

// crates.io
use serde_json::{Map, Value};
// self
use crate::{_prelude::*, provider::descriptor::GrantType};

/// Strategy hook that allows providers to decorate requests and classify errors.
///
/// Implementors are required to be `Send + Sync`. Only `classify_token_error` is
/// mandatory; `augment_token_request` defaults to a no-op.
pub trait ProviderStrategy: Send + Sync {
	/// Maps a rejected token response into the crate's error taxonomy.
	fn classify_token_error(&self, ctx: &ProviderErrorContext) -> ProviderErrorKind;

	/// Adds provider-specific fields to the JSON body before it is sent.
	fn augment_token_request(&self, _grant: GrantType, _body: &mut Map<String, Value>) {}
}

/// Canonical provider error categories used by strategies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderErrorKind {
	/// Provider rejected the grant (bad, replayed, or revoked code/refresh token).
	InvalidGrant,
	/// Client authentication or client configuration was rejected.
	InvalidClient,
	/// Failure is temporary and may succeed on a later call.
	Transient,
}

/// Context passed to provider strategies when classifying token errors.
///
/// Only primitive data is carried here so strategies stay decoupled from the HTTP
/// client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderErrorContext {
	/// Grant type associated with the failing request.
	pub grant_type: GrantType,
	/// HTTP status code returned by the provider.
	pub http_status: Option<u16>,
	/// Provider-supplied OAuth `error` field.
	pub oauth_error: Option<String>,
	/// Provider-supplied OAuth `error_description` field.
	pub error_description: Option<String>,
	/// Truncated preview of the response body.
	pub body_preview: Option<String>,
}
impl ProviderErrorContext {
	const BODY_PREVIEW_LIMIT: usize = 256;

	/// Creates a new context scoped to the provided grant type.
	pub fn new(grant_type: GrantType) -> Self {
		Self {
			grant_type,
			http_status: None,
			oauth_error: None,
			error_description: None,
			body_preview: None,
		}
	}

	/// Adds an HTTP status code.
	pub fn with_http_status(mut self, status: u16) -> Self {
		self.http_status = Some(status);

		self
	}

	/// Adds the OAuth error code string returned by the provider.
	pub fn with_oauth_error(mut self, error: impl Into<String>) -> Self {
		self.oauth_error = Some(error.into());

		self
	}

	/// Adds the OAuth `error_description` field.
	pub fn with_error_description(mut self, description: impl Into<String>) -> Self {
		self.error_description = Some(description.into());

		self
	}

	/// Adds a body preview, truncated to a bounded number of characters.
	pub fn with_body_preview(mut self, body: impl Into<String>) -> Self {
		self.body_preview = Some(truncate_preview(body.into()));

		self
	}
}

/// Default strategy that applies RFC 6749 guided heuristics.
///
/// Structured OAuth fields win, then body text hints, then the HTTP status code.
#[derive(Debug, Default)]
pub struct DefaultProviderStrategy;
impl Display for DefaultProviderStrategy {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("default-provider-strategy")
	}
}
impl ProviderStrategy for DefaultProviderStrategy {
	fn classify_token_error(&self, ctx: &ProviderErrorContext) -> ProviderErrorKind {
		if let Some(kind) =
			classify_oauth_error(ctx.oauth_error.as_deref(), ctx.error_description.as_deref())
		{
			return kind;
		}
		if let Some(kind) = classify_body(ctx.body_preview.as_deref()) {
			return kind;
		}

		classify_status(ctx.http_status)
	}
}

fn truncate_preview(body: String) -> String {
	if body.chars().count() <= ProviderErrorContext::BODY_PREVIEW_LIMIT {
		return body;
	}

	let mut buf = body.chars().take(ProviderErrorContext::BODY_PREVIEW_LIMIT).collect::<String>();

	buf.push('…');

	buf
}

fn classify_oauth_error(
	oauth_error: Option<&str>,
	error_description: Option<&str>,
) -> Option<ProviderErrorKind> {
	oauth_error
		.and_then(match_exact_value)
		.or_else(|| error_description.and_then(match_exact_value))
		.or_else(|| classify_body(error_description))
}

fn match_exact_value(value: &str) -> Option<ProviderErrorKind> {
	const INVALID_GRANT: [&str; 2] = ["invalid_grant", "access_denied"];
	const INVALID_CLIENT: [&str; 5] = [
		"invalid_client",
		"unauthorized_client",
		"unsupported_grant_type",
		"invalid_scope",
		"insufficient_scope",
	];
	const TRANSIENT: [&str; 2] = ["temporarily_unavailable", "server_error"];

	let matches = |set: &[&str]| set.iter().any(|candidate| value.eq_ignore_ascii_case(candidate));

	if matches(&INVALID_GRANT) {
		Some(ProviderErrorKind::InvalidGrant)
	} else if matches(&INVALID_CLIENT) {
		Some(ProviderErrorKind::InvalidClient)
	} else if matches(&TRANSIENT) {
		Some(ProviderErrorKind::Transient)
	} else {
		None
	}
}

fn classify_body(body: Option<&str>) -> Option<ProviderErrorKind> {
	let lowered = body?.to_ascii_lowercase();

	match lowered.as_str() {
		text if text.contains("invalid_grant") => Some(ProviderErrorKind::InvalidGrant),
		text if text.contains("invalid_client") || text.contains("invalid_scope") =>
			Some(ProviderErrorKind::InvalidClient),
		text if text.contains("temporarily_unavailable") || text.contains("retry") =>
			Some(ProviderErrorKind::Transient),
		_ => None,
	}
}

fn classify_status(status: Option<u16>) -> ProviderErrorKind {
	match status {
		Some(400 | 404 | 410) => ProviderErrorKind::InvalidGrant,
		Some(401 | 403) => ProviderErrorKind::InvalidClient,
		_ => ProviderErrorKind::Transient,
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn classify(ctx: ProviderErrorContext) -> ProviderErrorKind {
		DefaultProviderStrategy.classify_token_error(&ctx)
	}

	#[test]
	fn oauth_error_field_takes_priority_over_status() {
		let ctx = ProviderErrorContext::new(GrantType::RefreshToken)
			.with_http_status(503)
			.with_oauth_error("invalid_grant");

		assert_eq!(classify(ctx), ProviderErrorKind::InvalidGrant);
	}

	#[test]
	fn body_hint_is_used_without_structured_fields() {
		let ctx = ProviderErrorContext::new(GrantType::AuthorizationCode)
			.with_http_status(500)
			.with_body_preview("upstream says: invalid_client");

		assert_eq!(classify(ctx), ProviderErrorKind::InvalidClient);
	}

	#[test]
	fn status_fallbacks_follow_the_documented_table() {
		let base = ProviderErrorContext::new(GrantType::RefreshToken);

		assert_eq!(classify(base.clone().with_http_status(400)), ProviderErrorKind::InvalidGrant);
		assert_eq!(classify(base.clone().with_http_status(401)), ProviderErrorKind::InvalidClient);
		assert_eq!(classify(base.clone().with_http_status(429)), ProviderErrorKind::Transient);
		assert_eq!(classify(base.with_http_status(502)), ProviderErrorKind::Transient);
	}

	#[test]
	fn long_bodies_are_truncated() {
		let ctx =
			ProviderErrorContext::new(GrantType::RefreshToken).with_body_preview("x".repeat(300));
		let preview = ctx.body_preview.expect("Preview should be recorded.");

		assert_eq!(preview.chars().count(), ProviderErrorContext::BODY_PREVIEW_LIMIT + 1);
		assert!(preview.ends_with('…'));
	}
}
