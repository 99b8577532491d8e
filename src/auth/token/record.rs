//! Persisted token record, freshness evaluation, and builder.

// self
use crate::{
	_prelude::*,
	auth::{AccountId, token::secret::TokenSecret},
};

/// Freshness of a token record relative to an instant and a safety margin.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenStatus {
	/// Token stays valid beyond the safety margin.
	Fresh,
	/// Token is still valid but expires within the safety margin.
	Expiring,
	/// Token exceeded its expiry instant.
	Expired,
}

/// Errors produced by [`TokenRecordBuilder`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum TokenRecordBuilderError {
	/// Issued when no access token value was provided.
	#[error("Access token is required.")]
	MissingAccessToken,
	/// Issued when no expiry (absolute or relative) was configured.
	#[error("Expiry must be supplied via expires_at or expires_in.")]
	MissingExpiry,
	/// Issued when `issued_at + expires_in` falls outside the representable range.
	#[error("Expiry lies outside the representable date range.")]
	ExpiryOutOfRange,
}

/// Current credential material for one account.
///
/// Records are overwritten, never versioned; the store keeps at most one per account.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct TokenRecord {
	/// Owning account.
	pub account: AccountId,
	/// Access token secret; callers must avoid logging it.
	pub access_token: TokenSecret,
	/// Refresh token secret, if the provider issued one.
	pub refresh_token: Option<TokenSecret>,
	/// Instant the token endpoint answered.
	pub issued_at: OffsetDateTime,
	/// Absolute expiry instant.
	pub expires_at: OffsetDateTime,
}
impl TokenRecord {
	/// Returns a builder for the provided account.
	pub fn builder(account: AccountId) -> TokenRecordBuilder {
		TokenRecordBuilder::new(account)
	}

	/// Computes freshness at `instant`, treating anything inside `margin` as expiring.
	pub fn status_at(&self, instant: OffsetDateTime, margin: Duration) -> TokenStatus {
		if instant >= self.expires_at {
			return TokenStatus::Expired;
		}
		if self.expires_at > instant + margin {
			return TokenStatus::Fresh;
		}

		TokenStatus::Expiring
	}

	/// Returns `true` if the token stays valid for longer than `margin` after `instant`.
	pub fn is_fresh_at(&self, instant: OffsetDateTime, margin: Duration) -> bool {
		matches!(self.status_at(instant, margin), TokenStatus::Fresh)
	}

	/// Returns `true` if the record has expired at the provided instant.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		instant >= self.expires_at
	}

	/// Time left before expiry; negative once expired.
	pub fn remaining_at(&self, instant: OffsetDateTime) -> Duration {
		self.expires_at - instant
	}
}
impl Debug for TokenRecord {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenRecord")
			.field("account", &self.account)
			.field("access_token", &"<redacted>")
			.field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
			.field("issued_at", &self.issued_at)
			.field("expires_at", &self.expires_at)
			.finish()
	}
}

/// Builder for [`TokenRecord`].
#[derive(Clone, Debug)]
pub struct TokenRecordBuilder {
	account: AccountId,
	access_token: Option<TokenSecret>,
	refresh_token: Option<TokenSecret>,
	issued_at: Option<OffsetDateTime>,
	expires_at: Option<OffsetDateTime>,
	expires_in: Option<Duration>,
}
impl TokenRecordBuilder {
	fn new(account: AccountId) -> Self {
		Self {
			account,
			access_token: None,
			refresh_token: None,
			issued_at: None,
			expires_at: None,
			expires_in: None,
		}
	}

	/// Sets the issued-at instant.
	pub fn issued_at(mut self, instant: OffsetDateTime) -> Self {
		self.issued_at = Some(instant);

		self
	}

	/// Sets an absolute expiry instant.
	pub fn expires_at(mut self, instant: OffsetDateTime) -> Self {
		self.expires_at = Some(instant);

		self
	}

	/// Sets a relative expiry duration from the issued instant.
	pub fn expires_in(mut self, duration: Duration) -> Self {
		self.expires_in = Some(duration);

		self
	}

	/// Provides the access token value.
	pub fn access_token(mut self, token: impl Into<String>) -> Self {
		self.access_token = Some(TokenSecret::new(token));

		self
	}

	/// Provides the refresh token value.
	pub fn refresh_token(mut self, token: impl Into<String>) -> Self {
		self.refresh_token = Some(TokenSecret::new(token));

		self
	}

	/// Provides an already wrapped refresh secret, or clears it with `None`.
	pub fn refresh_secret(mut self, secret: Option<TokenSecret>) -> Self {
		self.refresh_token = secret;

		self
	}

	/// Consumes the builder and produces a [`TokenRecord`].
	pub fn build(self) -> Result<TokenRecord, TokenRecordBuilderError> {
		let access_token = self
			.access_token
			.filter(|secret| !secret.is_empty())
			.ok_or(TokenRecordBuilderError::MissingAccessToken)?;
		let issued_at = self.issued_at.unwrap_or_else(OffsetDateTime::now_utc);
		let expires_at = match (self.expires_at, self.expires_in) {
			(Some(instant), _) => instant,
			(None, Some(delta)) =>
				issued_at.checked_add(delta).ok_or(TokenRecordBuilderError::ExpiryOutOfRange)?,
			(None, None) => return Err(TokenRecordBuilderError::MissingExpiry),
		};

		Ok(TokenRecord {
			account: self.account,
			access_token,
			refresh_token: self.refresh_token.filter(|secret| !secret.is_empty()),
			issued_at,
			expires_at,
		})
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	fn account() -> AccountId {
		AccountId::new("acct_fixture").expect("Account fixture should be valid.")
	}

	fn record_expiring_at(expires_at: OffsetDateTime) -> TokenRecord {
		TokenRecord::builder(account())
			.access_token("access")
			.refresh_token("refresh")
			.issued_at(macros::datetime!(2025-01-01 00:00 UTC))
			.expires_at(expires_at)
			.build()
			.expect("Token record builder should succeed.")
	}

	#[test]
	fn status_honors_safety_margin() {
		let record = record_expiring_at(macros::datetime!(2025-01-01 01:00 UTC));
		let margin = Duration::minutes(2);

		assert_eq!(
			record.status_at(macros::datetime!(2025-01-01 00:57 UTC), margin),
			TokenStatus::Fresh
		);
		assert_eq!(
			record.status_at(macros::datetime!(2025-01-01 00:58 UTC), margin),
			TokenStatus::Expiring,
			"Expiry exactly at now + margin is stale."
		);
		assert_eq!(
			record.status_at(macros::datetime!(2025-01-01 00:59 UTC), margin),
			TokenStatus::Expiring
		);
		assert_eq!(
			record.status_at(macros::datetime!(2025-01-01 01:00 UTC), margin),
			TokenStatus::Expired
		);
		assert!(record.is_expired_at(macros::datetime!(2025-01-01 01:30 UTC)));
		assert_eq!(
			record.remaining_at(macros::datetime!(2025-01-01 00:30 UTC)),
			Duration::minutes(30)
		);
	}

	#[test]
	fn builder_handles_relative_expiry() {
		let record = TokenRecord::builder(account())
			.access_token("secret")
			.issued_at(macros::datetime!(2025-01-01 00:00 UTC))
			.expires_in(Duration::minutes(30))
			.build()
			.expect("Token record builder should support relative expiry calculations.");

		assert_eq!(record.expires_at, macros::datetime!(2025-01-01 00:30 UTC));
		assert!(record.refresh_token.is_none());
	}

	#[test]
	fn builder_rejects_missing_material() {
		let missing_access = TokenRecord::builder(account())
			.access_token("")
			.expires_in(Duration::minutes(1))
			.build()
			.expect_err("Empty access tokens should be rejected.");

		assert_eq!(missing_access, TokenRecordBuilderError::MissingAccessToken);

		let missing_expiry = TokenRecord::builder(account())
			.access_token("access")
			.build()
			.expect_err("Records without expiry should be rejected.");

		assert_eq!(missing_expiry, TokenRecordBuilderError::MissingExpiry);

		let overflow = TokenRecord::builder(account())
			.access_token("access")
			.issued_at(macros::datetime!(2025-01-01 00:00 UTC))
			.expires_in(Duration::seconds(9_000_000_000_000))
			.build()
			.expect_err("Expiries past the representable range should be rejected.");

		assert_eq!(overflow, TokenRecordBuilderError::ExpiryOutOfRange);
	}

	#[test]
	fn empty_refresh_tokens_are_dropped() {
		let record = TokenRecord::builder(account())
			.access_token("access")
			.refresh_token("")
			.expires_in(Duration::hours(1))
			.build()
			.expect("Builder should accept an empty refresh token.");

		assert!(record.refresh_token.is_none());
	}

	#[test]
	fn debug_output_redacts_secrets() {
		let record = record_expiring_at(macros::datetime!(2025-01-01 01:00 UTC));
		let rendered = format!("{record:?}");

		assert!(!rendered.contains("\"access\""));
		assert!(rendered.contains("<redacted>"));
	}
}
