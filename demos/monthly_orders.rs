//! Fetches the current month's orders from a mocked partner API with a token that the
//! partner rejects once, showing the forced refresh and single retry.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use time::{Duration, OffsetDateTime};
use url::Url;
// self
use token_lifecycle::{
	api::{OrderFilter, PartnerClient},
	auth::{ExternalAccountId, ProviderId, TokenRecord},
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
	let refresh_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token").body_includes(r#""refresh_token":"R1""#);
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"access_token":"T2","refresh_token":"R2","expires_in":3600}"#);
		})
		.await;
	let rejected_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/v2/orders").header("authorization", "Bearer T1");
			then.status(401).body(r#"{"message":"token revoked"}"#);
		})
		.await;
	let orders_mock = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/v2/orders")
				.header("authorization", "Bearer T2")
				.query_param_exists("start_date")
				.query_param_exists("end_date")
				.query_param("marketplace", "US");
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"orders":[{"sku":"SKU-1","units":3}]}"#);
		})
		.await;
	let descriptor = ProviderDescriptor::builder(ProviderId::new("demo-partner")?)
		.authorization_endpoint(Url::parse(&server.url("/oauth/authorize"))?)
		.token_endpoint(Url::parse(&server.url("/oauth/token"))?)
		.build()?;
	let insecure = Client::builder()
		.danger_accept_invalid_certs(true)
		.danger_accept_invalid_hostnames(true)
		.build()?;
	let client = HttpAuthorizationClient::with_http_client(
		descriptor,
		Arc::new(DefaultProviderStrategy),
		ClientId::new("demo-client".into()),
		ClientSecret::new("demo-secret".into()),
		ReqwestHttpClient::with_client(insecure.clone()),
	);
	let store = Arc::new(MemoryStore::default());
	let account = ExternalAccountId::default_account();
	let registered = store.upsert_account(&account).await?;

	// Still fresh locally, but the partner has already revoked it.
	store
		.upsert_token(
			TokenRecord::builder(registered.id)
				.access_token("T1")
				.refresh_token("R1")
				.expires_in(Duration::hours(1))
				.build()?,
		)
		.await?;

	let manager = TokenManager::new(store, Arc::new(client));
	let partner = PartnerClient::with_http_client(
		manager.clone(),
		account,
		Url::parse(&server.url("/v2"))?,
		insecure,
	);
	let filter = OrderFilter { marketplace: Some("US".into()), ..Default::default() };
	let orders = partner.monthly_orders("orders", &filter, OffsetDateTime::now_utc()).await?;

	println!("Orders this month: {orders}.");
	println!("Refresh stats: {:?}.", manager.refresh_metrics);

	rejected_mock.assert_async().await;
	refresh_mock.assert_async().await;
	orders_mock.assert_async().await;

	Ok(())
}
