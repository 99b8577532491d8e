//! Token endpoint client: JSON grant exchanges and response normalization.

pub use oauth2;

// crates.io
use base64::{Engine, engine::general_purpose::STANDARD};
use oauth2::{
	AsyncHttpClient, ClientId, ClientSecret, HttpClientError, HttpRequest, HttpResponse,
	http::{
		Method,
		header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
	},
};
use serde_json::{Map, Value};
use url::form_urlencoded;
// self
use crate::{
	_prelude::*,
	auth::{TokenGrant, TokenSecret},
	error::{ConfigError, TransportError, UpstreamError},
	flows::AuthorizationSession,
	http::TokenHttpClient,
	provider::{
		ClientAuthMethod, GrantType, ProviderDescriptor, ProviderErrorContext, ProviderStrategy,
	},
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestHttpClient;

/// Boxed future returned by [`AuthorizationClient`] exchanges.
pub type ExchangeFuture<'a> = Pin<Box<dyn Future<Output = Result<TokenGrant>> + 'a + Send>>;

/// Exchanges grants for tokens against a provider's token endpoint.
///
/// Implementations never touch storage; the token manager persists whatever they return.
pub trait AuthorizationClient: Send + Sync {
	/// Redeems a one-time authorization code.
	fn exchange_code<'a>(&'a self, code: &'a str, redirect_uri: &'a Url) -> ExchangeFuture<'a>;

	/// Redeems a refresh token for a new access token.
	fn exchange_refresh_token<'a>(&'a self, refresh_token: &'a TokenSecret) -> ExchangeFuture<'a>;
}

/// [`AuthorizationClient`] that speaks JSON to the token endpoint over a [`TokenHttpClient`].
pub struct HttpAuthorizationClient<C>
where
	C: TokenHttpClient,
{
	descriptor: ProviderDescriptor,
	strategy: Arc<dyn ProviderStrategy>,
	client_id: ClientId,
	client_secret: ClientSecret,
	http_client: Arc<C>,
}
impl<C> HttpAuthorizationClient<C>
where
	C: TokenHttpClient,
{
	/// Creates a client that issues requests through the provided transport.
	pub fn with_http_client(
		descriptor: ProviderDescriptor,
		strategy: Arc<dyn ProviderStrategy>,
		client_id: ClientId,
		client_secret: ClientSecret,
		http_client: impl Into<Arc<C>>,
	) -> Self {
		Self { descriptor, strategy, client_id, client_secret, http_client: http_client.into() }
	}

	/// Descriptor the client was built from.
	pub fn descriptor(&self) -> &ProviderDescriptor {
		&self.descriptor
	}

	/// Begins the consent step: generates a `state` value and the authorize URL to send
	/// the user to.
	pub fn start_authorization(&self, redirect_uri: &Url) -> AuthorizationSession {
		AuthorizationSession::new(
			&self.descriptor.endpoints.authorization,
			self.client_id.as_str(),
			redirect_uri,
		)
	}

	async fn exchange(&self, grant: GrantType, mut body: Map<String, Value>) -> Result<TokenGrant> {
		body.insert("grant_type".into(), Value::from(grant.as_str()));

		let request = self.token_request(grant, body)?;
		let handle = self.http_client.handle();
		let response =
			handle.call(request).await.map_err(|err| self.map_transport_error(err))?;

		parse_token_response(self.strategy.as_ref(), grant, response)
	}

	fn token_request(&self, grant: GrantType, mut body: Map<String, Value>) -> Result<HttpRequest> {
		let mut builder = oauth2::http::Request::builder()
			.method(Method::POST)
			.uri(self.descriptor.endpoints.token.as_str())
			.header(CONTENT_TYPE, "application/json")
			.header(ACCEPT, "application/json");

		match self.descriptor.client_auth_method {
			ClientAuthMethod::RequestBody => {
				body.insert("client_id".into(), Value::from(self.client_id.as_str()));
				body.insert(
					"client_secret".into(),
					Value::from(self.client_secret.secret().as_str()),
				);
			},
			ClientAuthMethod::BasicHeader => {
				builder = builder.header(AUTHORIZATION, self.basic_credentials());
			},
		}

		self.strategy.augment_token_request(grant, &mut body);

		let payload = serde_json::to_vec(&Value::Object(body))
			.map_err(|source| ConfigError::RequestEncoding { source })?;

		Ok(builder.body(payload).map_err(ConfigError::from)?)
	}

	// RFC 6749 2.3.1: both halves are form-encoded before base64.
	fn basic_credentials(&self) -> String {
		let id = form_urlencoded::byte_serialize(self.client_id.as_bytes()).collect::<String>();
		let secret = form_urlencoded::byte_serialize(self.client_secret.secret().as_bytes())
			.collect::<String>();

		format!("Basic {}", STANDARD.encode(format!("{id}:{secret}")))
	}

	fn map_transport_error(&self, err: HttpClientError<C::TransportError>) -> Error {
		match err {
			HttpClientError::Reqwest(inner) =>
				if self.http_client.is_timeout(&inner) {
					Error::Timeout { operation: "token endpoint" }
				} else {
					TransportError::network(*inner).into()
				},
			HttpClientError::Http(inner) => ConfigError::from(inner).into(),
			HttpClientError::Io(inner) => TransportError::Io(inner).into(),
			HttpClientError::Other(message) => TransportError::Other { message }.into(),
			_ => TransportError::Other { message: "unrecognized HTTP client failure".into() }
				.into(),
		}
	}
}
#[cfg(feature = "reqwest")]
impl HttpAuthorizationClient<ReqwestHttpClient> {
	/// Creates a client backed by a redirect-free reqwest transport.
	pub fn new(
		descriptor: ProviderDescriptor,
		strategy: Arc<dyn ProviderStrategy>,
		client_id: ClientId,
		client_secret: ClientSecret,
	) -> Result<Self> {
		let http_client = ReqwestHttpClient::new()?;

		Ok(Self::with_http_client(descriptor, strategy, client_id, client_secret, http_client))
	}
}
impl<C> AuthorizationClient for HttpAuthorizationClient<C>
where
	C: TokenHttpClient,
{
	fn exchange_code<'a>(&'a self, code: &'a str, redirect_uri: &'a Url) -> ExchangeFuture<'a> {
		Box::pin(async move {
			let mut body = Map::new();

			body.insert("code".into(), Value::from(code));
			body.insert("redirect_uri".into(), Value::from(redirect_uri.as_str()));

			self.exchange(GrantType::AuthorizationCode, body).await
		})
	}

	fn exchange_refresh_token<'a>(&'a self, refresh_token: &'a TokenSecret) -> ExchangeFuture<'a> {
		Box::pin(async move {
			let mut body = Map::new();

			body.insert("refresh_token".into(), Value::from(refresh_token.expose()));

			self.exchange(GrantType::RefreshToken, body).await
		})
	}
}
impl<C> Debug for HttpAuthorizationClient<C>
where
	C: TokenHttpClient,
{
	fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
		f.debug_struct("HttpAuthorizationClient")
			.field("descriptor", &self.descriptor)
			.field("client_id", &self.client_id)
			.finish_non_exhaustive()
	}
}

#[derive(Debug, Deserialize)]
struct RawTokenResponse {
	access_token: Option<String>,
	refresh_token: Option<String>,
	expires_in: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct RawErrorResponse {
	error: Option<String>,
	error_description: Option<String>,
}

fn parse_token_response(
	strategy: &dyn ProviderStrategy,
	grant: GrantType,
	response: HttpResponse,
) -> Result<TokenGrant> {
	let status = response.status();
	let body = String::from_utf8_lossy(response.body()).into_owned();

	if !status.is_success() {
		return Err(rejection(strategy, grant, status.as_u16(), body).into());
	}

	let status = status.as_u16();
	let mut deserializer = serde_json::Deserializer::from_str(&body);
	let raw: RawTokenResponse = match serde_path_to_error::deserialize(&mut deserializer) {
		Ok(raw) => raw,
		Err(source) => {
			return Err(UpstreamError::Malformed { grant, status, body, source }.into());
		},
	};
	let Some(access_token) = raw.access_token.filter(|token| !token.is_empty()) else {
		return Err(UpstreamError::MissingAccessToken { grant, status, body }.into());
	};
	let mut token = TokenGrant::new(access_token);

	if let Some(refresh) = raw.refresh_token.filter(|token| !token.is_empty()) {
		token = token.with_refresh_token(refresh);
	}
	if let Some(value) = raw.expires_in {
		let lifetime = Duration::seconds(value);

		if value <= 0 || OffsetDateTime::now_utc().checked_add(lifetime).is_none() {
			return Err(UpstreamError::InvalidExpiresIn { grant, value }.into());
		}

		token = token.with_expires_in(lifetime);
	}

	Ok(token)
}

fn rejection(
	strategy: &dyn ProviderStrategy,
	grant: GrantType,
	status: u16,
	body: String,
) -> UpstreamError {
	let parsed = serde_json::from_str::<RawErrorResponse>(&body).unwrap_or_default();
	let mut ctx =
		ProviderErrorContext::new(grant).with_http_status(status).with_body_preview(&*body);

	if let Some(error) = &parsed.error {
		ctx = ctx.with_oauth_error(error.as_str());
	}
	if let Some(description) = parsed.error_description {
		ctx = ctx.with_error_description(description);
	}

	let kind = strategy.classify_token_error(&ctx);

	UpstreamError::Rejected { grant, status, body, oauth_error: parsed.error, kind }
}
