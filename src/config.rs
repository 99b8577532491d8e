//! Startup configuration loaded from `SL_*` environment variables.
//!
//! Every required setting is checked once, at load time; a missing or unparsable value
//! is a [`ConfigError`], never a runtime failure inside a flow.

// std
use std::path::PathBuf;
// crates.io
use oauth2::{ClientId, ClientSecret};
// self
use crate::{
	_prelude::*,
	auth::{ExternalAccountId, ProviderId},
	error::ConfigError,
	flows::{TokenManager, Timeouts},
	provider::ProviderDescriptor,
};

const CLIENT_ID: &str = "SL_CLIENT_ID";
const CLIENT_SECRET: &str = "SL_CLIENT_SECRET";
const REDIRECT_BASE_URL: &str = "SL_REDIRECT_BASE_URL";
const AUTHORIZE_URL: &str = "SL_AUTHORIZE_URL";
const TOKEN_URL: &str = "SL_TOKEN_URL";
const STORE_PATH: &str = "SL_STORE_PATH";
const ACCOUNT_ID: &str = "SL_ACCOUNT_ID";
const CALLBACK_PATH: &str = "SL_CALLBACK_PATH";
const SAFETY_MARGIN_SECS: &str = "SL_SAFETY_MARGIN_SECS";
const STORE_TIMEOUT_SECS: &str = "SL_STORE_TIMEOUT_SECS";
const UPSTREAM_TIMEOUT_SECS: &str = "SL_UPSTREAM_TIMEOUT_SECS";
const API_BASE_URL: &str = "SL_API_BASE_URL";

/// Validated process configuration.
#[derive(Clone)]
pub struct Config {
	/// OAuth client identifier.
	pub client_id: ClientId,
	/// OAuth client secret.
	pub client_secret: ClientSecret,
	/// Public base URL of this application; the callback path is appended to it.
	pub redirect_base_url: Url,
	/// Path of the consent callback handler.
	pub callback_path: String,
	/// Provider authorization endpoint.
	pub authorization_endpoint: Url,
	/// Provider token endpoint.
	pub token_endpoint: Url,
	/// Location of the file-backed credential store.
	pub store_path: PathBuf,
	/// External identifier of the connected account.
	pub account: ExternalAccountId,
	/// Window before expiry inside which a stored token counts as stale.
	pub safety_margin: Duration,
	/// Bounds applied to store operations and upstream calls.
	pub timeouts: Timeouts,
	/// Partner API base URL, when API calls are made through this crate.
	pub api_base_url: Option<Url>,
}
impl Config {
	/// Default consent callback path.
	pub const DEFAULT_CALLBACK_PATH: &'static str = "/api/sl/oauth/callback";

	/// Loads configuration from the process environment.
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::from_lookup(|name| std::env::var(name).ok())
	}

	/// Loads configuration through `lookup`; empty values count as absent.
	pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let get = |name: &str| {
			lookup(name).map(|value| value.trim().to_owned()).filter(|value| !value.is_empty())
		};
		let require = |name: &'static str| get(name).ok_or(ConfigError::MissingSetting { name });
		let client_id = ClientId::new(require(CLIENT_ID)?);
		let client_secret = ClientSecret::new(require(CLIENT_SECRET)?);
		let redirect_base_url = parse_url(REDIRECT_BASE_URL, &require(REDIRECT_BASE_URL)?)?;
		let authorization_endpoint = parse_url(AUTHORIZE_URL, &require(AUTHORIZE_URL)?)?;
		let token_endpoint = parse_url(TOKEN_URL, &require(TOKEN_URL)?)?;
		let store_path = PathBuf::from(require(STORE_PATH)?);
		let account = match get(ACCOUNT_ID) {
			Some(value) => ExternalAccountId::new(value)?,
			None => ExternalAccountId::default_account(),
		};
		let callback_path =
			get(CALLBACK_PATH).unwrap_or_else(|| Self::DEFAULT_CALLBACK_PATH.to_owned());
		let safety_margin = parse_secs(
			SAFETY_MARGIN_SECS,
			get(SAFETY_MARGIN_SECS),
			TokenManager::DEFAULT_SAFETY_MARGIN,
		)?;
		let defaults = Timeouts::default();
		let timeouts = Timeouts {
			store: parse_secs(STORE_TIMEOUT_SECS, get(STORE_TIMEOUT_SECS), defaults.store)?,
			upstream: parse_secs(
				UPSTREAM_TIMEOUT_SECS,
				get(UPSTREAM_TIMEOUT_SECS),
				defaults.upstream,
			)?,
		};
		let api_base_url =
			get(API_BASE_URL).map(|value| parse_url(API_BASE_URL, &value)).transpose()?;

		Ok(Self {
			client_id,
			client_secret,
			redirect_base_url,
			callback_path,
			authorization_endpoint,
			token_endpoint,
			store_path,
			account,
			safety_margin,
			timeouts,
			api_base_url,
		})
	}

	/// Redirect URI sent in the authorize redirect and the code exchange.
	pub fn redirect_uri(&self) -> Result<Url, ConfigError> {
		let base = self.redirect_base_url.as_str().trim_end_matches('/');
		let path = self.callback_path.trim_start_matches('/');

		Url::parse(&format!("{base}/{path}"))
			.map_err(|source| ConfigError::InvalidRedirect { source })
	}

	/// Provider descriptor for the configured endpoints.
	pub fn descriptor(&self) -> Result<ProviderDescriptor, ConfigError> {
		let id = ProviderId::new("sellerlegend")?;

		Ok(ProviderDescriptor::builder(id)
			.authorization_endpoint(self.authorization_endpoint.clone())
			.token_endpoint(self.token_endpoint.clone())
			.build()?)
	}
}
impl Debug for Config {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Config")
			.field("client_id", &self.client_id)
			.field("client_secret", &"<redacted>")
			.field("redirect_base_url", &self.redirect_base_url)
			.field("callback_path", &self.callback_path)
			.field("authorization_endpoint", &self.authorization_endpoint)
			.field("token_endpoint", &self.token_endpoint)
			.field("store_path", &self.store_path)
			.field("account", &self.account)
			.field("safety_margin", &self.safety_margin)
			.field("timeouts", &self.timeouts)
			.field("api_base_url", &self.api_base_url)
			.finish()
	}
}

fn parse_url(name: &'static str, value: &str) -> Result<Url, ConfigError> {
	Url::parse(value).map_err(|e| ConfigError::InvalidSetting { name, reason: e.to_string() })
}

fn parse_secs(
	name: &'static str,
	value: Option<String>,
	default: Duration,
) -> Result<Duration, ConfigError> {
	let Some(value) = value else {
		return Ok(default);
	};
	let secs = value
		.parse::<u32>()
		.map_err(|e| ConfigError::InvalidSetting { name, reason: e.to_string() })?;

	Ok(Duration::seconds(i64::from(secs)))
}
