//! Token lifecycle orchestration: freshness checks, singleflight refreshes, and the
//! authorization-code exchange.

pub mod authorization_code;
pub mod authorize;
pub mod common;
pub mod refresh;

pub use authorize::*;
pub use common::*;
pub use refresh::*;

// self
use crate::{
	_prelude::*,
	auth::AccountId,
	oauth::AuthorizationClient,
	store::CredentialStore,
};
#[cfg(feature = "reqwest")]
use crate::{
	config::Config,
	oauth::HttpAuthorizationClient,
	provider::DefaultProviderStrategy,
	store::FileStore,
};

/// Hands out access tokens that stay valid for at least the safety margin.
///
/// The manager owns no configuration of its own: the store and the authorization client
/// are injected, and every call re-reads the store so concurrent callers observe the
/// latest persisted record. Refreshes are serialized per account.
#[derive(Clone)]
pub struct TokenManager {
	/// Credential store shared with the authorization callback.
	pub store: Arc<dyn CredentialStore>,
	/// Token endpoint client used for both grant exchanges.
	pub client: Arc<dyn AuthorizationClient>,
	/// Window before expiry inside which a stored token counts as stale.
	pub safety_margin: Duration,
	/// Bounds applied to store operations and upstream calls.
	pub timeouts: Timeouts,
	/// Shared counters for access token lookups.
	pub refresh_metrics: Arc<RefreshMetrics>,
	refresh_guards: Arc<Mutex<HashMap<AccountId, Arc<AsyncMutex<()>>>>>,
}
impl TokenManager {
	/// Default safety margin applied by [`TokenManager::access_token`].
	pub const DEFAULT_SAFETY_MARGIN: Duration = Duration::minutes(2);

	/// Creates a manager over the provided store and authorization client.
	pub fn new(store: Arc<dyn CredentialStore>, client: Arc<dyn AuthorizationClient>) -> Self {
		Self {
			store,
			client,
			safety_margin: Self::DEFAULT_SAFETY_MARGIN,
			timeouts: Timeouts::default(),
			refresh_metrics: Default::default(),
			refresh_guards: Default::default(),
		}
	}

	/// Overrides the default safety margin; negative values clamp to zero.
	pub fn with_safety_margin(mut self, margin: Duration) -> Self {
		self.safety_margin = if margin.is_negative() { Duration::ZERO } else { margin };

		self
	}

	/// Overrides the store and upstream timeouts.
	pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
		self.timeouts = timeouts;

		self
	}
}
#[cfg(feature = "reqwest")]
impl TokenManager {
	/// Wires a file-backed store and a reqwest-backed authorization client from `config`.
	pub fn from_config(config: &Config) -> Result<Self> {
		let store = FileStore::open(&config.store_path)?;
		let client = HttpAuthorizationClient::new(
			config.descriptor()?,
			Arc::new(DefaultProviderStrategy),
			config.client_id.clone(),
			config.client_secret.clone(),
		)?;

		Ok(Self::new(Arc::new(store), Arc::new(client))
			.with_safety_margin(config.safety_margin)
			.with_timeouts(config.timeouts))
	}
}
impl Debug for TokenManager {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenManager")
			.field("safety_margin", &self.safety_margin)
			.field("timeouts", &self.timeouts)
			.field("refresh_metrics", &self.refresh_metrics)
			.finish_non_exhaustive()
	}
}
