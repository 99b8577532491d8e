//! Provider descriptor data structures shared by both grant exchanges.

/// Builder API for assembling provider descriptors.
pub mod builder;
/// Grant labels used in token requests and errors.
pub mod grant;

pub use builder::*;
pub use grant::*;

// self
use crate::{_prelude::*, auth::ProviderId};

/// How client credentials are presented to the token endpoint.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientAuthMethod {
	#[default]
	/// `client_id`/`client_secret` fields inside the JSON request body.
	RequestBody,
	/// HTTP Basic `Authorization` header.
	BasicHeader,
}

/// Endpoint set declared by a provider descriptor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderEndpoints {
	/// Authorization endpoint users are redirected to for consent.
	pub authorization: Url,
	/// Token endpoint used for code exchanges and refreshes.
	pub token: Url,
}

/// Immutable provider descriptor consumed by the authorization client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderDescriptor {
	/// Descriptor identifier.
	pub id: ProviderId,
	/// Endpoint definitions exposed by the provider.
	pub endpoints: ProviderEndpoints,
	/// Client authentication mechanism.
	pub client_auth_method: ClientAuthMethod,
}
impl ProviderDescriptor {
	/// Creates a new builder for the provided identifier.
	pub fn builder(id: ProviderId) -> ProviderDescriptorBuilder {
		ProviderDescriptorBuilder::new(id)
	}
}
