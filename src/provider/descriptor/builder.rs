// self
use crate::{
	_prelude::*,
	auth::ProviderId,
	provider::{ClientAuthMethod, ProviderDescriptor, ProviderEndpoints},
};

/// Errors raised while constructing or validating descriptors.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum ProviderDescriptorError {
	/// Authorization endpoint is required to build the consent redirect.
	#[error("Missing authorization endpoint.")]
	MissingAuthorizationEndpoint,
	/// Token endpoint is mandatory for both exchanges.
	#[error("Missing token endpoint.")]
	MissingTokenEndpoint,
	/// Endpoints must use HTTPS.
	#[error("The {endpoint} endpoint must use HTTPS: {url}.")]
	InsecureEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Endpoint URL that failed validation.
		url: String,
	},
	/// Endpoints cannot carry a fragment.
	#[error("The {endpoint} endpoint must not contain a fragment: {url}.")]
	FragmentInEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Endpoint URL that failed validation.
		url: String,
	},
}

/// Builder for [`ProviderDescriptor`] values.
#[derive(Debug)]
pub struct ProviderDescriptorBuilder {
	/// Identifier for the descriptor being constructed.
	pub id: ProviderId,
	/// Authorization endpoint.
	pub authorization_endpoint: Option<Url>,
	/// Token endpoint used for exchanges and refreshes.
	pub token_endpoint: Option<Url>,
	/// Client authentication method for the token endpoint.
	pub client_auth_method: ClientAuthMethod,
}
impl ProviderDescriptorBuilder {
	/// Creates a new builder seeded with the provided identifier.
	pub fn new(id: ProviderId) -> Self {
		Self {
			id,
			authorization_endpoint: None,
			token_endpoint: None,
			client_auth_method: ClientAuthMethod::default(),
		}
	}

	/// Sets the authorization endpoint.
	pub fn authorization_endpoint(mut self, url: Url) -> Self {
		self.authorization_endpoint = Some(url);

		self
	}

	/// Sets the token endpoint.
	pub fn token_endpoint(mut self, url: Url) -> Self {
		self.token_endpoint = Some(url);

		self
	}

	/// Overrides the client authentication method.
	pub fn client_auth_method(mut self, method: ClientAuthMethod) -> Self {
		self.client_auth_method = method;

		self
	}

	/// Consumes the builder and validates the resulting descriptor.
	pub fn build(self) -> Result<ProviderDescriptor, ProviderDescriptorError> {
		let authorization = self
			.authorization_endpoint
			.ok_or(ProviderDescriptorError::MissingAuthorizationEndpoint)?;
		let token = self.token_endpoint.ok_or(ProviderDescriptorError::MissingTokenEndpoint)?;

		validate_endpoint("authorization", &authorization)?;
		validate_endpoint("token", &token)?;

		Ok(ProviderDescriptor {
			id: self.id,
			endpoints: ProviderEndpoints { authorization, token },
			client_auth_method: self.client_auth_method,
		})
	}
}

fn validate_endpoint(name: &'static str, url: &Url) -> Result<(), ProviderDescriptorError> {
	if url.scheme() != "https" {
		return Err(ProviderDescriptorError::InsecureEndpoint {
			endpoint: name,
			url: url.to_string(),
		});
	}
	if url.fragment().is_some() {
		return Err(ProviderDescriptorError::FragmentInEndpoint {
			endpoint: name,
			url: url.to_string(),
		});
	}

	Ok(())
}
