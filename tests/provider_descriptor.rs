// crates.io
use url::Url;
// self
use token_lifecycle::{
	auth::ProviderId,
	provider::{
		ClientAuthMethod, ProviderDescriptor, ProviderDescriptorBuilder, ProviderDescriptorError,
	},
};

fn url(value: &str) -> Url {
	Url::parse(value).expect("Failed to parse mock provider URL.")
}

fn builder(id: &str) -> ProviderDescriptorBuilder {
	let provider_id =
		ProviderId::new(id).expect("Failed to build provider identifier for mock descriptor.");

	ProviderDescriptor::builder(provider_id)
}

#[test]
fn descriptor_requires_both_endpoints() {
	let err = builder("partner")
		.token_endpoint(url("https://partner.example.com/oauth/token"))
		.build()
		.expect_err("Descriptor builder should reject a missing authorization endpoint.");

	assert!(matches!(err, ProviderDescriptorError::MissingAuthorizationEndpoint));

	let err = builder("partner")
		.authorization_endpoint(url("https://partner.example.com/oauth/authorize"))
		.build()
		.expect_err("Descriptor builder should reject a missing token endpoint.");

	assert!(matches!(err, ProviderDescriptorError::MissingTokenEndpoint));
}

#[test]
fn descriptor_rejects_insecure_or_fragmented_endpoints() {
	let err = builder("partner")
		.authorization_endpoint(url("http://partner.example.com/oauth/authorize"))
		.token_endpoint(url("https://partner.example.com/oauth/token"))
		.build()
		.expect_err("Descriptor builder should reject plain HTTP endpoints.");

	assert!(matches!(
		err,
		ProviderDescriptorError::InsecureEndpoint { endpoint: "authorization", .. }
	));

	let err = builder("partner")
		.authorization_endpoint(url("https://partner.example.com/oauth/authorize"))
		.token_endpoint(url("https://partner.example.com/oauth/token#frag"))
		.build()
		.expect_err("Descriptor builder should reject endpoint fragments.");

	assert!(matches!(err, ProviderDescriptorError::FragmentInEndpoint { endpoint: "token", .. }));
}

#[test]
fn descriptor_defaults_to_body_credentials() {
	let descriptor = builder("sellerlegend")
		.authorization_endpoint(url("https://partner.example.com/oauth/authorize"))
		.token_endpoint(url("https://partner.example.com/oauth/token"))
		.build()
		.expect("Descriptor should build with HTTPS endpoints.");

	assert_eq!(descriptor.id.as_ref(), "sellerlegend");
	assert_eq!(descriptor.client_auth_method, ClientAuthMethod::RequestBody);
	assert_eq!(descriptor.endpoints.token.path(), "/oauth/token");

	let basic = builder("sellerlegend")
		.authorization_endpoint(url("https://partner.example.com/oauth/authorize"))
		.token_endpoint(url("https://partner.example.com/oauth/token"))
		.client_auth_method(ClientAuthMethod::BasicHeader)
		.build()
		.expect("Descriptor should accept an explicit auth method.");

	assert_eq!(basic.client_auth_method, ClientAuthMethod::BasicHeader);
}

#[test]
fn provider_identifiers_are_validated() {
	assert!(ProviderId::new("").is_err());
	assert!(ProviderId::new("seller legend").is_err());
	assert!(ProviderId::new("x".repeat(129)).is_err());
}
