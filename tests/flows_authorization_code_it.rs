#![cfg(all(feature = "reqwest", feature = "test"))]

// crates.io
use httpmock::prelude::*;
use serde_json::json;
// self
use token_lifecycle::{
	_preludet::*,
	auth::{ExternalAccountId, ProviderId, TokenGrant},
	error::UpstreamError,
	flows::TokenManager,
	provider::{GrantType, ProviderDescriptor},
	store::CredentialStore,
};

const CLIENT_ID: &str = "client-code";
const CLIENT_SECRET: &str = "secret-code";
const REDIRECT_URI: &str = "https://app.example.com/api/sl/oauth/callback";

fn build_descriptor(server: &MockServer) -> ProviderDescriptor {
	let provider_id =
		ProviderId::new("mock-code").expect("Provider identifier should be valid for code test.");

	ProviderDescriptor::builder(provider_id)
		.authorization_endpoint(
			Url::parse(&server.url("/authorize"))
				.expect("Mock authorize endpoint should parse successfully."),
		)
		.token_endpoint(
			Url::parse(&server.url("/token"))
				.expect("Mock token endpoint should parse successfully."),
		)
		.build()
		.expect("Provider descriptor should build successfully.")
}

fn redirect_uri() -> Url {
	Url::parse(REDIRECT_URI).expect("Redirect URI fixture should parse.")
}

#[tokio::test]
async fn code_exchange_registers_the_account_and_stores_the_token() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token").header("content-type", "application/json").json_body(
				json!({
					"grant_type": "authorization_code",
					"code": "abc",
					"redirect_uri": REDIRECT_URI,
					"client_id": CLIENT_ID,
					"client_secret": CLIENT_SECRET,
				}),
			);
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"access_token":"T1","refresh_token":"R1","expires_in":3600}"#);
		})
		.await;
	let (manager, store) =
		build_reqwest_test_manager(build_descriptor(&server), CLIENT_ID, CLIENT_SECRET);
	let account = ExternalAccountId::default_account();
	let before = OffsetDateTime::now_utc();
	let record = manager
		.exchange_code(&account, "abc", &redirect_uri())
		.await
		.expect("Authorization code exchange should succeed.");

	mock.assert_async().await;

	assert_eq!(store.account_count(), 1);
	assert_eq!(store.token_count(), 1);
	assert_eq!(record.access_token.expose(), "T1");
	assert_eq!(record.refresh_token.as_ref().map(|secret| secret.expose()), Some("R1"));
	assert!(record.expires_at >= before + Duration::seconds(3_600));
	assert!(record.expires_at <= OffsetDateTime::now_utc() + Duration::seconds(3_600));

	let registered = store
		.fetch_account(&account)
		.await
		.expect("Account fetch should succeed.")
		.expect("Account should be registered after the exchange.");
	let stored = store
		.fetch_token(&registered.id)
		.await
		.expect("Token fetch should succeed.")
		.expect("Token record should be stored after the exchange.");

	assert_eq!(stored, record);

	let token = manager.access_token(&account).await.expect("Stored token should be fresh.");

	assert_eq!(token.expose(), "T1");
}

#[tokio::test]
async fn replayed_code_surfaces_the_raw_rejection_and_writes_nothing() {
	let server = MockServer::start_async().await;
	let body = r#"{"error":"invalid_grant","error_description":"code already used"}"#;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(400).header("content-type", "application/json").body(body);
		})
		.await;
	let (manager, store) =
		build_reqwest_test_manager(build_descriptor(&server), CLIENT_ID, CLIENT_SECRET);
	let err = manager
		.exchange_code(&ExternalAccountId::default_account(), "abc", &redirect_uri())
		.await
		.expect_err("A consumed code must be rejected.");

	mock.assert_async().await;

	let Error::Upstream(upstream) = &err else {
		panic!("Expected an upstream error, got {err:?}.");
	};

	assert_eq!(upstream.grant(), GrantType::AuthorizationCode);
	assert_eq!(upstream.status(), Some(400));
	assert_eq!(upstream.body(), Some(body));
	assert!(err.requires_reauthorization());
	assert_eq!(store.account_count(), 0);
	assert_eq!(store.token_count(), 0);
}

#[tokio::test]
async fn success_without_access_token_is_rejected() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"refresh_token":"R1","expires_in":3600}"#);
		})
		.await;
	let (manager, store) =
		build_reqwest_test_manager(build_descriptor(&server), CLIENT_ID, CLIENT_SECRET);
	let err = manager
		.exchange_code(&ExternalAccountId::default_account(), "abc", &redirect_uri())
		.await
		.expect_err("Responses without access_token must fail.");

	mock.assert_async().await;

	assert!(matches!(err, Error::Upstream(UpstreamError::MissingAccessToken { status: 200, .. })));
	assert_eq!(store.account_count(), 0);
}

#[tokio::test]
async fn unrepresentable_lifetime_fails_closed() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"access_token":"T1","refresh_token":"R1","expires_in":9000000000000}"#);
		})
		.await;
	let (manager, store) =
		build_reqwest_test_manager(build_descriptor(&server), CLIENT_ID, CLIENT_SECRET);
	let err = manager
		.exchange_code(&ExternalAccountId::default_account(), "abc", &redirect_uri())
		.await
		.expect_err("An expiry past the representable range must fail.");

	mock.assert_async().await;

	assert!(matches!(
		err,
		Error::Upstream(UpstreamError::InvalidExpiresIn { grant: GrantType::AuthorizationCode, .. })
	));
	assert_eq!(store.account_count(), 0);
	assert_eq!(store.token_count(), 0);
}

#[tokio::test]
async fn failed_token_write_is_recovered_by_a_new_exchange() {
	let client = ScriptedAuthorizationClient::default();

	client.push_code_response(Ok(TokenGrant::new("T1").with_refresh_token("R1")));
	client.push_code_response(Ok(TokenGrant::new("T2").with_refresh_token("R2")));

	let store = Arc::new(ScriptedStore::default());
	let manager = TokenManager::new(store.clone(), Arc::new(client));
	let account = ExternalAccountId::default_account();

	store.fail_token_writes(1);

	let err = manager
		.exchange_code(&account, "first", &redirect_uri())
		.await
		.expect_err("A failed token write must fail the exchange.");

	assert!(matches!(err, Error::Storage(_)));
	assert!(err.is_transient());
	assert_eq!(store.inner.account_count(), 1);
	assert_eq!(store.inner.token_count(), 0);

	let err = manager.access_token(&account).await.expect_err("No token has been stored.");

	assert!(matches!(err, Error::NoToken { .. }));

	let record = manager
		.exchange_code(&account, "second", &redirect_uri())
		.await
		.expect("A later exchange should complete the connection.");
	let token = manager.access_token(&account).await.expect("Stored token should be fresh.");

	assert_eq!(record.access_token.expose(), "T2");
	assert_eq!(token.expose(), "T2");
	assert_eq!(store.inner.account_count(), 1);
	assert_eq!(store.inner.token_count(), 1);
}

#[tokio::test]
async fn blank_code_never_reaches_the_provider() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(500);
		})
		.await;
	let (manager, store) =
		build_reqwest_test_manager(build_descriptor(&server), CLIENT_ID, CLIENT_SECRET);
	let err = manager
		.exchange_code(&ExternalAccountId::default_account(), "   ", &redirect_uri())
		.await
		.expect_err("Blank codes must fail locally.");

	assert!(matches!(err, Error::MissingCode));
	assert_eq!(mock.hits_async().await, 0);
	assert_eq!(store.account_count(), 0);
}

#[tokio::test]
async fn reconnecting_reuses_the_account_and_replaces_the_token() {
	let server = MockServer::start_async().await;
	let mut first = server
		.mock_async(|when, then| {
			when.method(POST).path("/token").body_includes(r#""code":"first""#);
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"access_token":"T1","refresh_token":"R1","expires_in":3600}"#);
		})
		.await;
	let (manager, store) =
		build_reqwest_test_manager(build_descriptor(&server), CLIENT_ID, CLIENT_SECRET);
	let account = ExternalAccountId::default_account();
	let initial = manager
		.exchange_code(&account, "first", &redirect_uri())
		.await
		.expect("First exchange should succeed.");

	first.delete_async().await;

	let second = server
		.mock_async(|when, then| {
			when.method(POST).path("/token").body_includes(r#""code":"second""#);
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"access_token":"T2","expires_in":7200}"#);
		})
		.await;
	let replaced = manager
		.exchange_code(&account, "second", &redirect_uri())
		.await
		.expect("Second exchange should succeed.");

	second.assert_async().await;

	assert_eq!(initial.account, replaced.account);
	assert_eq!(replaced.access_token.expose(), "T2");
	assert!(replaced.refresh_token.is_none());
	assert_eq!(store.account_count(), 1);
	assert_eq!(store.token_count(), 1);
}
