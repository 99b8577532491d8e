//! Structured lifecycle events; no-ops unless the `tracing` feature is enabled.
//!
//! Events carry identifiers and instants only. Token material never reaches them.

// self
use crate::{_prelude::*, auth::AccountId};

/// A stored token was still fresh and was returned without a refresh.
pub fn token_reused(account: &AccountId, expires_at: OffsetDateTime) {
	#[cfg(feature = "tracing")]
	tracing::debug!(account = %account, expires_at = %expires_at, "stored access token is fresh");
	#[cfg(not(feature = "tracing"))]
	let _ = (account, expires_at);
}

/// A refresh exchange is about to be issued.
pub fn refresh_started(account: &AccountId, expires_at: OffsetDateTime, forced: bool) {
	#[cfg(feature = "tracing")]
	tracing::info!(account = %account, expires_at = %expires_at, forced, "refreshing access token");
	#[cfg(not(feature = "tracing"))]
	let _ = (account, expires_at, forced);
}

/// The refreshed token expires earlier than the one it replaces.
pub fn expiry_regressed(account: &AccountId, previous: OffsetDateTime, current: OffsetDateTime) {
	#[cfg(feature = "tracing")]
	tracing::warn!(
		account = %account,
		previous = %previous,
		current = %current,
		"refreshed token expires earlier than the record it replaces"
	);
	#[cfg(not(feature = "tracing"))]
	let _ = (account, previous, current);
}

/// Another writer replaced the record while this refresh was in flight.
pub fn refresh_superseded(account: &AccountId) {
	#[cfg(feature = "tracing")]
	tracing::warn!(account = %account, "token record was replaced concurrently; keeping it");
	#[cfg(not(feature = "tracing"))]
	let _ = account;
}

/// A flow finished with an error that is about to be returned.
pub fn flow_failed(error: &Error) {
	#[cfg(feature = "tracing")]
	tracing::warn!(
		error = %error,
		reauthorize = error.requires_reauthorization(),
		transient = error.is_transient(),
		"token lifecycle flow failed"
	);
	#[cfg(not(feature = "tracing"))]
	let _ = error;
}

/// The partner API rejected the bearer token; the request is retried once.
pub fn api_retrying(path: &str, status: u16) {
	#[cfg(feature = "tracing")]
	tracing::info!(path, status, "partner API rejected the bearer token; refreshing and retrying");
	#[cfg(not(feature = "tracing"))]
	let _ = (path, status);
}
