//! Thread-safe in-memory [`CredentialStore`] implementation for local development and tests.

// self
use crate::{
	_prelude::*,
	auth::{Account, AccountId, ExternalAccountId, TokenRecord},
	store::{CompareAndSwapOutcome, CredentialStore, StoreFuture, StoreTables},
};

/// Thread-safe storage backend that keeps records in-process for tests and demos.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(Arc<RwLock<StoreTables>>);
impl MemoryStore {
	/// Number of registered accounts.
	pub fn account_count(&self) -> usize {
		self.0.read().account_count()
	}

	/// Number of stored token records.
	pub fn token_count(&self) -> usize {
		self.0.read().token_count()
	}
}
impl CredentialStore for MemoryStore {
	fn fetch_account<'a>(
		&'a self,
		external_id: &'a ExternalAccountId,
	) -> StoreFuture<'a, Option<Account>> {
		Box::pin(async move { Ok(self.0.read().account(external_id)) })
	}

	fn upsert_account<'a>(
		&'a self,
		external_id: &'a ExternalAccountId,
	) -> StoreFuture<'a, Account> {
		Box::pin(async move { Ok(self.0.write().upsert_account(external_id).0) })
	}

	fn fetch_token<'a>(&'a self, account: &'a AccountId) -> StoreFuture<'a, Option<TokenRecord>> {
		Box::pin(async move { Ok(self.0.read().token(account)) })
	}

	fn upsert_token(&self, record: TokenRecord) -> StoreFuture<'_, ()> {
		Box::pin(async move { self.0.write().upsert_token(record) })
	}

	fn compare_and_swap_token<'a>(
		&'a self,
		account: &'a AccountId,
		expected_expires_at: OffsetDateTime,
		replacement: TokenRecord,
	) -> StoreFuture<'a, CompareAndSwapOutcome> {
		Box::pin(async move {
			Ok(self.0.write().compare_and_swap_token(account, expected_expires_at, replacement))
		})
	}
}
