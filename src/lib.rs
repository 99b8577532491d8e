//! Single-account OAuth 2.0 token keeper: store-backed freshness checks, singleflight
//! refreshes, and fail-closed grant exchanges so partner API callers always carry a valid
//! bearer token.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

#[cfg(feature = "reqwest")] pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod flows;
pub mod http;
pub mod oauth;
pub mod obs;
pub mod provider;
pub mod store;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// std
	use std::{
		collections::VecDeque,
		sync::atomic::{AtomicUsize, Ordering},
	};
	// crates.io
	use oauth2::{ClientId, ClientSecret};
	// self
	use crate::{
		auth::{Account, AccountId, ExternalAccountId, TokenGrant, TokenRecord, TokenSecret},
		error::UpstreamError,
		flows::TokenManager,
		http::ReqwestHttpClient,
		oauth::{AuthorizationClient, ExchangeFuture, HttpAuthorizationClient},
		provider::{DefaultProviderStrategy, GrantType, ProviderDescriptor, ProviderErrorKind},
		store::{CompareAndSwapOutcome, CredentialStore, MemoryStore, StoreError, StoreFuture},
	};

	/// Builds a reqwest HTTP client that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	pub fn test_reqwest_http_client() -> ReqwestHttpClient {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.redirect(reqwest::redirect::Policy::none())
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		ReqwestHttpClient::with_client(client)
	}

	/// Constructs a [`TokenManager`] backed by an in-memory store and the reqwest-backed
	/// authorization client used across integration tests.
	pub fn build_reqwest_test_manager(
		descriptor: ProviderDescriptor,
		client_id: &str,
		client_secret: &str,
	) -> (TokenManager, Arc<MemoryStore>) {
		let store_backend = Arc::new(MemoryStore::default());
		let store: Arc<dyn CredentialStore> = store_backend.clone();
		let client = HttpAuthorizationClient::with_http_client(
			descriptor,
			Arc::new(DefaultProviderStrategy),
			ClientId::new(client_id.to_owned()),
			ClientSecret::new(client_secret.to_owned()),
			test_reqwest_http_client(),
		);

		(TokenManager::new(store, Arc::new(client)), store_backend)
	}

	/// Seeds an account plus token record into `store`, returning the created account.
	pub async fn seed_account(
		store: &dyn CredentialStore,
		external_id: &ExternalAccountId,
		access: &str,
		refresh: Option<&str>,
		expires_at: OffsetDateTime,
	) -> Account {
		let account = store
			.upsert_account(external_id)
			.await
			.expect("Failed to seed account into the store.");
		let mut builder = TokenRecord::builder(account.id.clone())
			.access_token(access)
			.issued_at(expires_at - Duration::hours(1))
			.expires_at(expires_at);

		if let Some(value) = refresh {
			builder = builder.refresh_token(value);
		}

		let record = builder.build().expect("Token record fixture should build successfully.");

		store.upsert_token(record).await.expect("Failed to seed token record into the store.");

		account
	}

	/// Scripted [`AuthorizationClient`] double that replays queued responses and counts calls.
	#[derive(Debug, Default)]
	pub struct ScriptedAuthorizationClient {
		code_responses: Mutex<VecDeque<Result<TokenGrant>>>,
		refresh_responses: Mutex<VecDeque<Result<TokenGrant>>>,
		refresh_tokens_seen: Mutex<Vec<String>>,
		code_calls: AtomicUsize,
		refresh_calls: AtomicUsize,
		delay: Option<std::time::Duration>,
	}
	impl ScriptedAuthorizationClient {
		/// Delays every scripted response, which widens race windows in concurrency tests.
		pub fn with_delay(mut self, delay: std::time::Duration) -> Self {
			self.delay = Some(delay);

			self
		}

		/// Queues a response for the next authorization-code exchange.
		pub fn push_code_response(&self, response: Result<TokenGrant>) {
			self.code_responses.lock().push_back(response);
		}

		/// Queues a response for the next refresh-token exchange.
		pub fn push_refresh_response(&self, response: Result<TokenGrant>) {
			self.refresh_responses.lock().push_back(response);
		}

		/// Number of authorization-code exchanges performed so far.
		pub fn code_calls(&self) -> usize {
			self.code_calls.load(Ordering::SeqCst)
		}

		/// Number of refresh-token exchanges performed so far.
		pub fn refresh_calls(&self) -> usize {
			self.refresh_calls.load(Ordering::SeqCst)
		}

		/// Refresh tokens presented to the double, in call order.
		pub fn refresh_tokens_seen(&self) -> Vec<String> {
			self.refresh_tokens_seen.lock().clone()
		}

		/// Builds the upstream rejection the real client reports for an HTTP 400 body.
		pub fn rejection(grant: GrantType, status: u16, body: &str) -> Error {
			UpstreamError::Rejected {
				grant,
				status,
				body: body.to_owned(),
				oauth_error: None,
				kind: ProviderErrorKind::InvalidGrant,
			}
			.into()
		}

		fn next(
			queue: &Mutex<VecDeque<Result<TokenGrant>>>,
			grant: GrantType,
		) -> Result<TokenGrant> {
			queue
				.lock()
				.pop_front()
				.unwrap_or_else(|| Err(Self::rejection(grant, 500, "no scripted response")))
		}
	}
	impl AuthorizationClient for ScriptedAuthorizationClient {
		fn exchange_code<'a>(
			&'a self,
			_code: &'a str,
			_redirect_uri: &'a Url,
		) -> ExchangeFuture<'a> {
			Box::pin(async move {
				self.code_calls.fetch_add(1, Ordering::SeqCst);

				if let Some(delay) = self.delay {
					tokio::time::sleep(delay).await;
				}

				Self::next(&self.code_responses, GrantType::AuthorizationCode)
			})
		}

		fn exchange_refresh_token<'a>(
			&'a self,
			refresh_token: &'a TokenSecret,
		) -> ExchangeFuture<'a> {
			Box::pin(async move {
				self.refresh_calls.fetch_add(1, Ordering::SeqCst);
				self.refresh_tokens_seen.lock().push(refresh_token.expose().to_owned());

				if let Some(delay) = self.delay {
					tokio::time::sleep(delay).await;
				}

				Self::next(&self.refresh_responses, GrantType::RefreshToken)
			})
		}
	}

	/// [`CredentialStore`] double over a [`MemoryStore`] that injects failed token writes
	/// and records written by a competing refresher.
	#[derive(Debug, Default)]
	pub struct ScriptedStore {
		/// Backing store holding the actual records.
		pub inner: MemoryStore,
		concurrent_writes: Mutex<VecDeque<TokenRecord>>,
		swap_outcomes: Mutex<VecDeque<CompareAndSwapOutcome>>,
		token_write_failures: AtomicUsize,
		swap_calls: AtomicUsize,
	}
	impl ScriptedStore {
		/// Stores `record` right before the next compare-and-swap is evaluated.
		pub fn push_concurrent_write(&self, record: TokenRecord) {
			self.concurrent_writes.lock().push_back(record);
		}

		/// Answers the next compare-and-swap with `outcome` without touching the records.
		pub fn push_swap_outcome(&self, outcome: CompareAndSwapOutcome) {
			self.swap_outcomes.lock().push_back(outcome);
		}

		/// Fails the next `count` token upserts with a backend error.
		pub fn fail_token_writes(&self, count: usize) {
			self.token_write_failures.store(count, Ordering::SeqCst);
		}

		/// Number of compare-and-swap calls received so far.
		pub fn swap_calls(&self) -> usize {
			self.swap_calls.load(Ordering::SeqCst)
		}
	}
	impl CredentialStore for ScriptedStore {
		fn fetch_account<'a>(
			&'a self,
			external_id: &'a ExternalAccountId,
		) -> StoreFuture<'a, Option<Account>> {
			self.inner.fetch_account(external_id)
		}

		fn upsert_account<'a>(
			&'a self,
			external_id: &'a ExternalAccountId,
		) -> StoreFuture<'a, Account> {
			self.inner.upsert_account(external_id)
		}

		fn fetch_token<'a>(
			&'a self,
			account: &'a AccountId,
		) -> StoreFuture<'a, Option<TokenRecord>> {
			self.inner.fetch_token(account)
		}

		fn upsert_token(&self, record: TokenRecord) -> StoreFuture<'_, ()> {
			let fail = self
				.token_write_failures
				.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
				.is_ok();

			if fail {
				return Box::pin(async {
					Err(StoreError::Backend { message: "scripted token write failure".into() })
				});
			}

			self.inner.upsert_token(record)
		}

		fn compare_and_swap_token<'a>(
			&'a self,
			account: &'a AccountId,
			expected_expires_at: OffsetDateTime,
			replacement: TokenRecord,
		) -> StoreFuture<'a, CompareAndSwapOutcome> {
			Box::pin(async move {
				self.swap_calls.fetch_add(1, Ordering::SeqCst);

				let scripted = self.swap_outcomes.lock().pop_front();

				if let Some(outcome) = scripted {
					return Ok(outcome);
				}

				let concurrent = self.concurrent_writes.lock().pop_front();

				if let Some(record) = concurrent {
					self.inner.upsert_token(record).await?;
				}

				self.inner.compare_and_swap_token(account, expected_expires_at, replacement).await
			})
		}
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
