//! Storage contracts and built-in credential store implementations.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::{
	_prelude::*,
	auth::{Account, AccountId, ExternalAccountId, TokenRecord},
};

/// Boxed future returned by [`CredentialStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Durable keyed storage for connected accounts and their token records.
///
/// Implementations must make every operation atomic per key; the token manager layers
/// its own read-modify-write sequencing on top.
pub trait CredentialStore
where
	Self: Send + Sync,
{
	/// Fetches the account registered under `external_id`, if any.
	fn fetch_account<'a>(
		&'a self,
		external_id: &'a ExternalAccountId,
	) -> StoreFuture<'a, Option<Account>>;

	/// Returns the account for `external_id`, registering it on first use.
	///
	/// Repeated calls with the same identifier return the same account.
	fn upsert_account<'a>(&'a self, external_id: &'a ExternalAccountId) -> StoreFuture<'a, Account>;

	/// Fetches the token record owned by `account`, if any.
	fn fetch_token<'a>(&'a self, account: &'a AccountId) -> StoreFuture<'a, Option<TokenRecord>>;

	/// Inserts or overwrites the token record of `record.account`.
	fn upsert_token(&self, record: TokenRecord) -> StoreFuture<'_, ()>;

	/// Replaces the token record only if its current expiry equals `expected_expires_at`.
	fn compare_and_swap_token<'a>(
		&'a self,
		account: &'a AccountId,
		expected_expires_at: OffsetDateTime,
		replacement: TokenRecord,
	) -> StoreFuture<'a, CompareAndSwapOutcome>;
}

/// Result of a token compare-and-swap attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareAndSwapOutcome {
	/// The stored expiry matched and the record was replaced.
	Updated,
	/// A record exists but another writer already replaced it.
	ExpiryMismatch,
	/// The account holds no token record.
	Missing,
}

/// Error type produced by [`CredentialStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
	/// A token record referenced an account the store has never registered.
	#[error("Token record references unknown account `{account}`.")]
	UnknownAccount {
		/// Account identifier carried by the rejected record.
		account: String,
	},
}

/// In-process tables shared by the built-in stores.
#[derive(Clone, Debug, Default)]
pub(crate) struct StoreTables {
	accounts: HashMap<ExternalAccountId, Account>,
	tokens: HashMap<AccountId, TokenRecord>,
}
impl StoreTables {
	pub(crate) fn account(&self, external_id: &ExternalAccountId) -> Option<Account> {
		self.accounts.get(external_id).cloned()
	}

	pub(crate) fn upsert_account(&mut self, external_id: &ExternalAccountId) -> (Account, bool) {
		if let Some(existing) = self.accounts.get(external_id) {
			return (existing.clone(), false);
		}

		let account = Account::register(external_id.clone(), OffsetDateTime::now_utc());

		self.accounts.insert(external_id.clone(), account.clone());

		(account, true)
	}

	pub(crate) fn token(&self, account: &AccountId) -> Option<TokenRecord> {
		self.tokens.get(account).cloned()
	}

	pub(crate) fn upsert_token(&mut self, record: TokenRecord) -> Result<(), StoreError> {
		if !self.accounts.values().any(|account| account.id == record.account) {
			return Err(StoreError::UnknownAccount { account: record.account.to_string() });
		}

		self.tokens.insert(record.account.clone(), record);

		Ok(())
	}

	pub(crate) fn compare_and_swap_token(
		&mut self,
		account: &AccountId,
		expected_expires_at: OffsetDateTime,
		replacement: TokenRecord,
	) -> CompareAndSwapOutcome {
		match self.tokens.get_mut(account) {
			Some(existing) if existing.expires_at == expected_expires_at => {
				*existing = replacement;

				CompareAndSwapOutcome::Updated
			},
			Some(_) => CompareAndSwapOutcome::ExpiryMismatch,
			None => CompareAndSwapOutcome::Missing,
		}
	}

	pub(crate) fn account_count(&self) -> usize {
		self.accounts.len()
	}

	pub(crate) fn token_count(&self) -> usize {
		self.tokens.len()
	}
}

/// Serialized form of [`StoreTables`].
#[derive(Debug, Default, Serialize, Deserialize)]
pub(crate) struct StoreSnapshot {
	accounts: Vec<Account>,
	tokens: Vec<TokenRecord>,
}
impl From<&StoreTables> for StoreSnapshot {
	fn from(tables: &StoreTables) -> Self {
		Self {
			accounts: tables.accounts.values().cloned().collect(),
			tokens: tables.tokens.values().cloned().collect(),
		}
	}
}
impl From<StoreSnapshot> for StoreTables {
	fn from(snapshot: StoreSnapshot) -> Self {
		Self {
			accounts: snapshot
				.accounts
				.into_iter()
				.map(|account| (account.external_id.clone(), account))
				.collect(),
			tokens: snapshot
				.tokens
				.into_iter()
				.map(|token| (token.account.clone(), token))
				.collect(),
		}
	}
}
