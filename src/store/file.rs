//! File-backed [`CredentialStore`] whose snapshot is shared through the filesystem.

// std
use std::{
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	auth::{Account, AccountId, ExternalAccountId, TokenRecord},
	store::{
		CompareAndSwapOutcome, CredentialStore, StoreError, StoreFuture, StoreSnapshot, StoreTables,
	},
};

/// Persists accounts and token records to a JSON file after each mutation.
///
/// Every operation re-reads the snapshot, so records written through another handle or
/// process sharing the path are observed and a compare-and-swap never overwrites them.
/// Mutations are serialized per handle; separate processes are not locked against each
/// other between the read and the rename. Writes go to a sibling `.tmp` file that is
/// synced and renamed over the target, so a crash never leaves a half-written snapshot
/// behind.
#[derive(Clone, Debug)]
pub struct FileStore {
	path: PathBuf,
	write_lock: Arc<Mutex<()>>,
}
impl FileStore {
	/// Opens (or creates) a store at the provided path, validating any existing data.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();

		ensure_parent_exists(&path)?;
		load_snapshot(&path)?;

		Ok(Self { path, write_lock: Default::default() })
	}

	/// Location of the JSON snapshot.
	pub fn path(&self) -> &Path {
		&self.path
	}

	fn read<T>(&self, view: impl FnOnce(&StoreTables) -> T) -> Result<T, StoreError> {
		Ok(view(&load_snapshot(&self.path)?))
	}

	fn persist_locked(&self, tables: &StoreTables) -> Result<(), StoreError> {
		ensure_parent_exists(&self.path)?;

		let serialized = serde_json::to_vec_pretty(&StoreSnapshot::from(tables)).map_err(|e| {
			StoreError::Serialization { message: format!("Failed to serialize snapshot: {e}") }
		})?;
		let mut tmp_path = self.path.clone();

		tmp_path.set_extension("tmp");

		{
			let mut file = File::create(&tmp_path).map_err(|e| StoreError::Backend {
				message: format!("Failed to create {}: {e}", tmp_path.display()),
			})?;

			file.write_all(&serialized).map_err(|e| StoreError::Backend {
				message: format!("Failed to write {}: {e}", tmp_path.display()),
			})?;
			file.sync_all().map_err(|e| StoreError::Backend {
				message: format!("Failed to sync {}: {e}", tmp_path.display()),
			})?;
		}

		fs::rename(&tmp_path, &self.path).map_err(|e| StoreError::Backend {
			message: format!("Failed to replace {}: {e}", self.path.display()),
		})
	}

	// Applies `mutate` to the latest on-disk snapshot and publishes it only if it changed.
	fn mutate<T>(
		&self,
		mutate: impl FnOnce(&mut StoreTables) -> Result<(T, bool), StoreError>,
	) -> Result<T, StoreError> {
		let _guard = self.write_lock.lock();
		let mut staged = load_snapshot(&self.path)?;
		let (value, changed) = mutate(&mut staged)?;

		if changed {
			self.persist_locked(&staged)?;
		}

		Ok(value)
	}
}
impl CredentialStore for FileStore {
	fn fetch_account<'a>(
		&'a self,
		external_id: &'a ExternalAccountId,
	) -> StoreFuture<'a, Option<Account>> {
		Box::pin(async move { self.read(|tables| tables.account(external_id)) })
	}

	fn upsert_account<'a>(
		&'a self,
		external_id: &'a ExternalAccountId,
	) -> StoreFuture<'a, Account> {
		Box::pin(async move { self.mutate(|tables| Ok(tables.upsert_account(external_id))) })
	}

	fn fetch_token<'a>(&'a self, account: &'a AccountId) -> StoreFuture<'a, Option<TokenRecord>> {
		Box::pin(async move { self.read(|tables| tables.token(account)) })
	}

	fn upsert_token(&self, record: TokenRecord) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			self.mutate(|tables| tables.upsert_token(record).map(|()| ((), true)))
		})
	}

	fn compare_and_swap_token<'a>(
		&'a self,
		account: &'a AccountId,
		expected_expires_at: OffsetDateTime,
		replacement: TokenRecord,
	) -> StoreFuture<'a, CompareAndSwapOutcome> {
		Box::pin(async move {
			self.mutate(|tables| {
				let outcome =
					tables.compare_and_swap_token(account, expected_expires_at, replacement);

				Ok((outcome, outcome == CompareAndSwapOutcome::Updated))
			})
		})
	}
}

fn load_snapshot(path: &Path) -> Result<StoreTables, StoreError> {
	if !path.exists() {
		return Ok(StoreTables::default());
	}

	let bytes = fs::read(path).map_err(|e| StoreError::Backend {
		message: format!("Failed to read {}: {e}", path.display()),
	})?;

	if bytes.iter().all(u8::is_ascii_whitespace) {
		return Ok(StoreTables::default());
	}

	let snapshot: StoreSnapshot =
		serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
			message: format!("Failed to parse {}: {e}", path.display()),
		})?;

	Ok(snapshot.into())
}

fn ensure_parent_exists(path: &Path) -> Result<(), StoreError> {
	if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
		fs::create_dir_all(parent).map_err(|e| StoreError::Backend {
			message: format!("Failed to create store directory {}: {e}", parent.display()),
		})?;
	}

	Ok(())
}
