//! Connected partner account record.

// self
use crate::{
	_prelude::*,
	auth::{AccountId, ExternalAccountId},
};

/// A connected partner account; owns the lifetime of its token record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
	/// Store-assigned internal identifier.
	pub id: AccountId,
	/// Partner-side identifier the account is upserted by.
	pub external_id: ExternalAccountId,
	/// Instant the account was first registered.
	pub created_at: OffsetDateTime,
}
impl Account {
	/// Creates a new account with a freshly generated internal identifier.
	pub fn register(external_id: ExternalAccountId, created_at: OffsetDateTime) -> Self {
		Self { id: AccountId::generate(), external_id, created_at }
	}
}
