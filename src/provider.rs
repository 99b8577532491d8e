//! Provider-facing descriptors (data) and strategies (behavior).
//!
//! `descriptor` exposes validated metadata (`ProviderDescriptor`) covering HTTPS-only
//! endpoints and the client authentication method the token endpoint expects.
//! `strategy` defines [`ProviderStrategy`], an HTTP-client-agnostic hook used by the
//! authorization client to augment outgoing JSON bodies and classify failures.

pub mod descriptor;
pub mod strategy;

pub use descriptor::*;
pub use strategy::*;
