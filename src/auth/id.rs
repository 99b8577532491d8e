//! Strongly typed identifiers for accounts and providers.

// std
use std::{borrow::Borrow, ops::Deref};
// crates.io
use rand::{Rng, distr::Alphanumeric};
// self
use crate::_prelude::*;

macro_rules! def_id {
	($name:ident, $doc:literal, $kind:literal) => {
		#[doc = $doc]
		#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		#[serde(try_from = "String", into = "String")]
		pub struct $name(String);
		impl $name {
			/// Creates a new identifier after validation.
			pub fn new(value: impl AsRef<str>) -> Result<Self, IdentifierError> {
				let view = value.as_ref();

				validate_view($kind, view)?;

				Ok(Self(view.to_owned()))
			}
		}
		impl Deref for $name {
			type Target = str;

			fn deref(&self) -> &Self::Target {
				&self.0
			}
		}
		impl AsRef<str> for $name {
			fn as_ref(&self) -> &str {
				&self.0
			}
		}
		impl From<$name> for String {
			fn from(value: $name) -> Self {
				value.0
			}
		}
		impl TryFrom<String> for $name {
			type Error = IdentifierError;

			fn try_from(value: String) -> Result<Self, Self::Error> {
				validate_view($kind, &value)?;

				Ok(Self(value))
			}
		}
		impl Borrow<str> for $name {
			fn borrow(&self) -> &str {
				&self.0
			}
		}
		impl Debug for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				write!(f, concat!($kind, "({})"), self.0)
			}
		}
		impl Display for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				f.write_str(&self.0)
			}
		}
		impl FromStr for $name {
			type Err = IdentifierError;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				Self::new(s)
			}
		}
	};
}

const IDENTIFIER_MAX_LEN: usize = 128;
const ACCOUNT_ID_PREFIX: &str = "acct_";
const ACCOUNT_ID_ENTROPY: usize = 20;

/// Error returned when identifier validation fails.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum IdentifierError {
	/// The identifier was empty.
	#[error("{kind} identifier cannot be empty.")]
	Empty {
		/// Kind of identifier (account, external account, provider).
		kind: &'static str,
	},
	/// The identifier contains whitespace characters.
	#[error("{kind} identifier contains whitespace.")]
	ContainsWhitespace {
		/// Kind of identifier (account, external account, provider).
		kind: &'static str,
	},
	/// The identifier exceeded the allowed character count.
	#[error("{kind} identifier exceeds {max} characters.")]
	TooLong {
		/// Kind of identifier (account, external account, provider).
		kind: &'static str,
		/// Maximum permitted character count.
		max: usize,
	},
}

def_id! { AccountId, "Opaque, store-assigned identifier of a connected account.", "Account" }
def_id! { ExternalAccountId, "Partner-side key of a connected account.", "ExternalAccount" }
def_id! { ProviderId, "Identifier for an OAuth provider descriptor.", "Provider" }

impl AccountId {
	/// Generates a fresh random identifier for stores without their own key generator.
	pub fn generate() -> Self {
		let entropy = rand::rng()
			.sample_iter(Alphanumeric)
			.take(ACCOUNT_ID_ENTROPY)
			.map(char::from)
			.collect::<String>();

		Self(format!("{ACCOUNT_ID_PREFIX}{entropy}"))
	}
}

impl ExternalAccountId {
	/// Identifier used by single-account deployments that never configure one.
	pub const DEFAULT: &'static str = "default-account";

	/// Returns the single-account default identifier.
	pub fn default_account() -> Self {
		Self(Self::DEFAULT.to_owned())
	}
}

fn validate_view(kind: &'static str, view: &str) -> Result<(), IdentifierError> {
	if view.is_empty() {
		return Err(IdentifierError::Empty { kind });
	}
	if view.chars().any(char::is_whitespace) {
		return Err(IdentifierError::ContainsWhitespace { kind });
	}
	if view.len() > IDENTIFIER_MAX_LEN {
		return Err(IdentifierError::TooLong { kind, max: IDENTIFIER_MAX_LEN });
	}

	Ok(())
}
