// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for access token lookups.
#[derive(Debug, Default)]
pub struct RefreshMetrics {
	attempts: AtomicU64,
	cache_hits: AtomicU64,
	refreshes: AtomicU64,
	failures: AtomicU64,
}
impl RefreshMetrics {
	/// Returns the total number of access token lookups.
	pub fn attempts(&self) -> u64 {
		self.attempts.load(Ordering::Relaxed)
	}

	/// Returns the number of lookups answered from the stored record.
	pub fn cache_hits(&self) -> u64 {
		self.cache_hits.load(Ordering::Relaxed)
	}

	/// Returns the number of successful refresh exchanges.
	pub fn refreshes(&self) -> u64 {
		self.refreshes.load(Ordering::Relaxed)
	}

	/// Returns the number of lookups that ended in an error.
	pub fn failures(&self) -> u64 {
		self.failures.load(Ordering::Relaxed)
	}

	pub(crate) fn record_attempt(&self) {
		self.attempts.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_cache_hit(&self) {
		self.cache_hits.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_refresh(&self) {
		self.refreshes.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_failure(&self) {
		self.failures.fetch_add(1, Ordering::Relaxed);
	}
}
