//! Optional observability helpers for token lifecycle flows.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `token_lifecycle.flow` with the `flow` and
//!   `stage` fields, plus the lifecycle events in [`events`].
//! - Enable `metrics` to increment the `token_lifecycle_flow_total` counter for every
//!   attempt/success/failure, labeled by `flow` + `outcome`.

pub mod events;

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Flows observed by the token manager.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// Authorization-code exchange performed by the callback.
	AuthorizationCode,
	/// Access token lookup, including the conditional refresh.
	AccessToken,
	/// Bearer-authenticated partner API request.
	PartnerApi,
}
impl FlowKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::AuthorizationCode => "authorization_code",
			FlowKind::AccessToken => "access_token",
			FlowKind::PartnerApi => "partner_api",
		}
	}
}
impl Display for FlowKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// Entry to a flow.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl FlowOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowOutcome::Attempt => "attempt",
			FlowOutcome::Success => "success",
			FlowOutcome::Failure => "failure",
		}
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
