//! Shared helpers for flow implementations (request options, timeouts, guards).

// self
use crate::{
	_prelude::*,
	auth::{AccountId, ExternalAccountId, TokenRecord},
	flows::TokenManager,
};

/// Options for a single [`TokenManager::access_token_with`] call.
#[derive(Clone, Debug)]
pub struct TokenRequest {
	/// Account whose token is requested.
	pub account: ExternalAccountId,
	/// Skips the freshness check and always refreshes.
	pub force: bool,
	/// Per-call override of the manager's safety margin.
	pub safety_margin: Option<Duration>,
}
impl TokenRequest {
	/// Creates a request that follows the manager's defaults.
	pub fn new(account: ExternalAccountId) -> Self {
		Self { account, force: false, safety_margin: None }
	}

	/// Forces a refresh even if the stored token is fresh.
	pub fn force_refresh(mut self) -> Self {
		self.force = true;

		self
	}

	/// Overrides the force flag.
	pub fn with_force(mut self, force: bool) -> Self {
		self.force = force;

		self
	}

	/// Overrides the safety margin for this call; negative values clamp to zero.
	pub fn with_safety_margin(mut self, margin: Duration) -> Self {
		self.safety_margin = Some(if margin.is_negative() { Duration::ZERO } else { margin });

		self
	}

	/// Determines whether `record` must be refreshed at `now` given `default_margin`.
	pub fn should_refresh(
		&self,
		record: &TokenRecord,
		now: OffsetDateTime,
		default_margin: Duration,
	) -> bool {
		self.force || !record.is_fresh_at(now, self.safety_margin.unwrap_or(default_margin))
	}
}

/// Upper bounds for the suspending steps of a flow.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Timeouts {
	/// Applied to each credential store operation.
	pub store: Duration,
	/// Applied to each token endpoint exchange.
	pub upstream: Duration,
}
impl Default for Timeouts {
	fn default() -> Self {
		Self { store: Duration::seconds(10), upstream: Duration::seconds(30) }
	}
}

/// Returns (and creates on demand) the singleflight guard for an account.
pub(crate) fn refresh_guard(manager: &TokenManager, account: &AccountId) -> Arc<AsyncMutex<()>> {
	let mut guards = manager.refresh_guards.lock();

	guards.entry(account.clone()).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
}

/// Awaits `fut` for at most `limit`, mapping elapsed waits to [`Error::Timeout`].
pub(crate) async fn bounded<T, E, Fut>(
	operation: &'static str,
	limit: Duration,
	fut: Fut,
) -> Result<T>
where
	Fut: Future<Output = Result<T, E>>,
	Error: From<E>,
{
	match tokio::time::timeout(limit.unsigned_abs(), fut).await {
		Ok(result) => result.map_err(Error::from),
		Err(_) => Err(Error::Timeout { operation }),
	}
}
