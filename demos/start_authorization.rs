//! Walks through the consent redirect and the callback's authorization-code exchange
//! against a local mock token endpoint, then reads the stored token back.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use url::Url;
// self
use token_lifecycle::{
	auth::{ExternalAccountId, ProviderId},
	flows::TokenManager,
	http::ReqwestHttpClient,
	oauth::{
		HttpAuthorizationClient,
		oauth2::{ClientId, ClientSecret},
	},
	provider::{DefaultProviderStrategy, ProviderDescriptor},
	reqwest::Client,
	store::{CredentialStore, MemoryStore},
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token").body_includes("\"code\":\"abc\"");
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"access_token":"T1","refresh_token":"R1","expires_in":3600}"#);
		})
		.await;
	let descriptor = ProviderDescriptor::builder(ProviderId::new("demo-partner")?)
		.authorization_endpoint(Url::parse(&server.url("/oauth/authorize"))?)
		.token_endpoint(Url::parse(&server.url("/oauth/token"))?)
		.build()?;
	let http_client = ReqwestHttpClient::with_client(
		Client::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()?,
	);
	let client = Arc::new(HttpAuthorizationClient::with_http_client(
		descriptor,
		Arc::new(DefaultProviderStrategy),
		ClientId::new("demo-client".into()),
		ClientSecret::new("demo-secret".into()),
		http_client,
	));
	let store = Arc::new(MemoryStore::default());
	let manager = TokenManager::new(store.clone(), client.clone());
	let session =
		client.start_authorization(&Url::parse("https://app.example.com/api/sl/oauth/callback")?);

	println!("Send your user to {}.", &session.authorize_url);

	// Simulate the provider redirecting back with the issued state and a one-time code.
	let code = session.validate_callback(Some(session.state.as_str()), Some("abc"))?;
	let account = ExternalAccountId::default_account();
	let record = manager.exchange_code(&account, code, &session.redirect_uri).await?;

	println!("Stored a token for {} expiring at {}.", record.account, record.expires_at);

	let token = manager.access_token(&account).await?;
	let registered = store.fetch_account(&account).await?;

	println!("Authorization header: {}.", token.bearer());
	println!("Registered account: {registered:?}.");

	token_mock.assert_async().await;

	Ok(())
}
