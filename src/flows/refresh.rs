//! Access token lookup with conditional refresh, singleflight guards, and CAS writes.
//!
//! [`TokenManager::access_token`] re-reads the store on every call and returns the
//! stored token while it stays valid past the safety margin. Otherwise it takes the
//! account's guard, re-checks the record, and performs a single
//! `grant_type=refresh_token` exchange. The new record is written with a
//! compare-and-swap keyed on the previous expiry so a newer record written elsewhere is
//! never clobbered. A record written concurrently is handed out only while it is still
//! fresh; a stale one becomes the new expected expiry for another swap attempt. Failed
//! exchanges leave the store untouched.

mod metrics;

pub use metrics::RefreshMetrics;

// self
use crate::{
	_prelude::*,
	auth::{AccountId, ExternalAccountId, TokenRecord, TokenSecret},
	error::UpstreamError,
	flows::{TokenManager, TokenRequest, common},
	obs::{self, FlowKind, FlowOutcome, FlowSpan, events},
	provider::GrantType,
	store::{CompareAndSwapOutcome, CredentialStore},
};

/// Compare-and-swap rounds attempted before a refresh gives up on a contended record.
const MAX_WRITE_ATTEMPTS: usize = 3;

impl TokenManager {
	/// Returns an access token valid for at least the safety margin, refreshing if needed.
	pub async fn access_token(&self, account: &ExternalAccountId) -> Result<TokenSecret> {
		self.access_token_with(TokenRequest::new(account.clone())).await
	}

	/// Same as [`TokenManager::access_token`] with per-call options.
	pub async fn access_token_with(&self, request: TokenRequest) -> Result<TokenSecret> {
		const KIND: FlowKind = FlowKind::AccessToken;

		let span = FlowSpan::new(KIND, "access_token");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);
		self.refresh_metrics.record_attempt();

		let result = span.instrument(self.resolve(request)).await;

		if let Err(err) = &result {
			self.refresh_metrics.record_failure();
			events::flow_failed(err);
		}

		obs::record_result(KIND, result.map(|record| record.access_token))
	}

	async fn resolve(&self, request: TokenRequest) -> Result<TokenRecord> {
		let store = self.store.as_ref();
		let account = common::bounded(
			"credential store read",
			self.timeouts.store,
			<dyn CredentialStore>::fetch_account(store, &request.account),
		)
		.await?
		.ok_or_else(|| Error::NoAccount { external_id: request.account.clone() })?;
		let current = self.load_token(&account.id).await?;

		if !request.should_refresh(&current, OffsetDateTime::now_utc(), self.safety_margin) {
			return Ok(self.reuse(current));
		}

		let guard = common::refresh_guard(self, &account.id);
		let _singleflight = guard.lock().await;
		// Another caller may have refreshed while this one waited for the guard.
		let current = self.load_token(&account.id).await?;

		if !request.should_refresh(&current, OffsetDateTime::now_utc(), self.safety_margin) {
			return Ok(self.reuse(current));
		}

		let refresh_token = current
			.refresh_token
			.clone()
			.ok_or_else(|| Error::NoRefreshToken { account: account.id.clone() })?;

		events::refresh_started(&current.account, current.expires_at, request.force);

		let grant = common::bounded(
			"token endpoint",
			self.timeouts.upstream,
			self.client.exchange_refresh_token(&refresh_token),
		)
		.await?;
		let updated = grant
			.into_record(account.id.clone(), OffsetDateTime::now_utc(), Some(refresh_token))
			.map_err(|source| UpstreamError::UnusableGrant {
				grant: GrantType::RefreshToken,
				source,
			})?;

		if updated.expires_at < current.expires_at {
			events::expiry_regressed(&account.id, current.expires_at, updated.expires_at);
		}

		let margin = request.safety_margin.unwrap_or(self.safety_margin);
		let resolved =
			self.store_refreshed(&account.id, current.expires_at, updated, margin).await?;

		self.refresh_metrics.record_refresh();

		Ok(resolved)
	}

	// Swaps `updated` in unless a concurrent writer already stored a fresh record.
	async fn store_refreshed(
		&self,
		account: &AccountId,
		mut expected: OffsetDateTime,
		updated: TokenRecord,
		margin: Duration,
	) -> Result<TokenRecord> {
		let store = self.store.as_ref();

		for _ in 0..MAX_WRITE_ATTEMPTS {
			let outcome = common::bounded(
				"credential store write",
				self.timeouts.store,
				<dyn CredentialStore>::compare_and_swap_token(
					store,
					account,
					expected,
					updated.clone(),
				),
			)
			.await?;

			match outcome {
				CompareAndSwapOutcome::Updated => return Ok(updated),
				CompareAndSwapOutcome::Missing => {
					self.persist(updated.clone()).await?;

					return Ok(updated);
				},
				CompareAndSwapOutcome::ExpiryMismatch => {
					events::refresh_superseded(account);

					match self.store_token(account).await? {
						Some(existing) if existing.is_fresh_at(OffsetDateTime::now_utc(), margin) =>
							return Ok(existing),
						Some(existing) => expected = existing.expires_at,
						None => {
							self.persist(updated.clone()).await?;

							return Ok(updated);
						},
					}
				},
			}
		}

		Err(Error::WriteContention { account: account.clone() })
	}

	async fn store_token(&self, account: &AccountId) -> Result<Option<TokenRecord>> {
		common::bounded(
			"credential store read",
			self.timeouts.store,
			<dyn CredentialStore>::fetch_token(self.store.as_ref(), account),
		)
		.await
	}

	async fn load_token(&self, account: &AccountId) -> Result<TokenRecord> {
		self.store_token(account)
			.await?
			.ok_or_else(|| Error::NoToken { account: account.clone() })
	}

	fn reuse(&self, record: TokenRecord) -> TokenRecord {
		self.refresh_metrics.record_cache_hit();
		events::token_reused(&record.account, record.expires_at);

		record
	}

	pub(crate) async fn persist(&self, record: TokenRecord) -> Result<()> {
		common::bounded(
			"credential store write",
			self.timeouts.store,
			<dyn CredentialStore>::upsert_token(self.store.as_ref(), record),
		)
		.await
	}
}
