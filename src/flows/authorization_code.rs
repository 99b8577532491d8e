//! Authorization-code exchange performed when the consent callback arrives.

// self
use crate::{
	_prelude::*,
	auth::{ExternalAccountId, TokenRecord},
	error::UpstreamError,
	flows::{TokenManager, common},
	obs::{self, FlowKind, FlowOutcome, FlowSpan, events},
	provider::GrantType,
	store::CredentialStore,
};

impl TokenManager {
	/// Redeems `code` and persists the resulting token for `account`.
	///
	/// `redirect_uri` must be byte-identical to the one used in the authorize redirect;
	/// mismatches are rejected by the provider, not locally. The account is upserted only
	/// after the provider accepts the code, so a failed exchange writes nothing.
	///
	/// If the token write fails after the account was registered, the account is left
	/// without a token and [`TokenManager::access_token`] reports [`Error::NoToken`]
	/// until a later exchange with a fresh code succeeds; it reuses the same account.
	pub async fn exchange_code(
		&self,
		account: &ExternalAccountId,
		code: &str,
		redirect_uri: &Url,
	) -> Result<TokenRecord> {
		const KIND: FlowKind = FlowKind::AuthorizationCode;

		let span = FlowSpan::new(KIND, "exchange_code");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let code = code.trim();

				if code.is_empty() {
					return Err(Error::MissingCode);
				}

				let grant = common::bounded(
					"token endpoint",
					self.timeouts.upstream,
					self.client.exchange_code(code, redirect_uri),
				)
				.await?;
				let issued_at = OffsetDateTime::now_utc();
				let registered = common::bounded(
					"credential store write",
					self.timeouts.store,
					<dyn CredentialStore>::upsert_account(self.store.as_ref(), account),
				)
				.await?;
				let guard = common::refresh_guard(self, &registered.id);
				let _singleflight = guard.lock().await;
				let record = grant.into_record(registered.id, issued_at, None).map_err(|source| {
					UpstreamError::UnusableGrant { grant: GrantType::AuthorizationCode, source }
				})?;

				self.persist(record.clone()).await?;

				Ok(record)
			})
			.await;

		if let Err(err) = &result {
			events::flow_failed(err);
		}

		obs::record_result(KIND, result)
	}
}
