//! Normalized token endpoint response shared by both grant exchanges.

// self
use crate::{
	_prelude::*,
	auth::{AccountId, TokenRecord, TokenRecordBuilderError, TokenSecret},
};

/// Tokens returned by a successful authorization-code or refresh-token exchange.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenGrant {
	/// Newly issued access token.
	pub access_token: TokenSecret,
	/// Rotated refresh token, when the provider issued one.
	pub refresh_token: Option<TokenSecret>,
	/// Reported lifetime of the access token.
	pub expires_in: Option<Duration>,
}
impl TokenGrant {
	/// Lifetime assumed when the provider omits `expires_in`.
	pub const DEFAULT_LIFETIME: Duration = Duration::seconds(3_600);

	/// Creates a grant carrying only an access token.
	pub fn new(access_token: impl Into<String>) -> Self {
		Self { access_token: TokenSecret::new(access_token), refresh_token: None, expires_in: None }
	}

	/// Attaches a refresh token.
	pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
		self.refresh_token = Some(TokenSecret::new(refresh_token));

		self
	}

	/// Attaches a reported lifetime.
	pub fn with_expires_in(mut self, expires_in: Duration) -> Self {
		self.expires_in = Some(expires_in);

		self
	}

	/// Reported lifetime, or [`Self::DEFAULT_LIFETIME`] when the provider omitted it.
	pub fn lifetime(&self) -> Duration {
		self.expires_in.unwrap_or(Self::DEFAULT_LIFETIME)
	}

	/// Converts the grant into the record persisted for `account`.
	///
	/// `previous_refresh` is retained when the provider did not rotate the refresh token.
	pub fn into_record(
		self,
		account: AccountId,
		issued_at: OffsetDateTime,
		previous_refresh: Option<TokenSecret>,
	) -> Result<TokenRecord, TokenRecordBuilderError> {
		let lifetime = self.lifetime();
		let refresh = self.refresh_token.filter(|secret| !secret.is_empty()).or(previous_refresh);

		TokenRecord::builder(account)
			.access_token(self.access_token.expose())
			.refresh_secret(refresh)
			.issued_at(issued_at)
			.expires_in(lifetime)
			.build()
	}
}
