//! Bearer-authenticated partner API caller.
//!
//! [`PartnerClient`] attaches the manager's access token to every request. When the
//! partner answers `401` (the token may have been invalidated out-of-band) it forces one
//! refresh and retries exactly once; any other non-success status is surfaced as
//! [`Error::Api`].

// crates.io
use reqwest::{
	Response, StatusCode,
	header::{ACCEPT, AUTHORIZATION},
};
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	auth::{ExternalAccountId, TokenSecret},
	config::Config,
	error::{ConfigError, TransportError},
	flows::{TokenManager, TokenRequest},
	obs::{self, FlowKind, FlowOutcome, FlowSpan, events},
};

/// Optional filters for the monthly orders report; blank values are omitted.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderFilter {
	/// Seller SKU.
	pub sku: Option<String>,
	/// Amazon standard identification number.
	pub asin: Option<String>,
	/// Marketplace code.
	pub marketplace: Option<String>,
}

/// Partner API client bound to one connected account.
#[derive(Clone, Debug)]
pub struct PartnerClient {
	manager: TokenManager,
	account: ExternalAccountId,
	base_url: Url,
	http: ReqwestClient,
}
impl PartnerClient {
	/// Creates a client whose request timeout follows the manager's upstream bound.
	pub fn new(manager: TokenManager, account: ExternalAccountId, base_url: Url) -> Result<Self> {
		let http = ReqwestClient::builder()
			.timeout(manager.timeouts.upstream.unsigned_abs())
			.build()
			.map_err(ConfigError::from)?;

		Ok(Self::with_http_client(manager, account, base_url, http))
	}

	/// Creates a client that sends requests through `http`.
	pub fn with_http_client(
		manager: TokenManager,
		account: ExternalAccountId,
		mut base_url: Url,
		http: ReqwestClient,
	) -> Self {
		// `Url::join` replaces the last segment unless the base ends with a slash.
		if !base_url.path().ends_with('/') {
			let path = format!("{}/", base_url.path());

			base_url.set_path(&path);
		}

		Self { manager, account, base_url, http }
	}

	/// Builds a client for the account and API base URL named in `config`.
	pub fn from_config(manager: TokenManager, config: &Config) -> Result<Self> {
		let base_url = config
			.api_base_url
			.clone()
			.ok_or(ConfigError::MissingSetting { name: "SL_API_BASE_URL" })?;

		Self::new(manager, config.account.clone(), base_url)
	}

	/// Issues a `GET` against `path` and decodes the JSON body into `T`.
	pub async fn get_json<T>(&self, path: &str, query: &[(&str, &str)]) -> Result<T>
	where
		T: DeserializeOwned,
	{
		const KIND: FlowKind = FlowKind::PartnerApi;

		let span = FlowSpan::new(KIND, "get_json");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let url = self.endpoint(path, query)?;
				let token = self.manager.access_token(&self.account).await?;
				let mut response = self.send(&url, &token).await?;

				if response.status() == StatusCode::UNAUTHORIZED {
					events::api_retrying(url.path(), StatusCode::UNAUTHORIZED.as_u16());

					let request = TokenRequest::new(self.account.clone()).force_refresh();
					let token = self.manager.access_token_with(request).await?;

					response = self.send(&url, &token).await?;
				}

				decode(response).await
			})
			.await;

		if let Err(err) = &result {
			events::flow_failed(err);
		}

		obs::record_result(KIND, result)
	}

	/// Fetches orders for the calendar month containing `now` (UTC).
	pub async fn monthly_orders(
		&self,
		path: &str,
		filter: &OrderFilter,
		now: OffsetDateTime,
	) -> Result<serde_json::Value> {
		let (start, end) = month_range(now);
		let start = iso_midnight(start);
		let end = iso_midnight(end);
		let mut query = vec![("start_date", start.as_str()), ("end_date", end.as_str())];

		for (name, value) in [
			("sku", &filter.sku),
			("asin", &filter.asin),
			("marketplace", &filter.marketplace),
		] {
			if let Some(value) = value {
				query.push((name, value.as_str()));
			}
		}

		self.get_json(path, &query).await
	}

	fn endpoint(&self, path: &str, query: &[(&str, &str)]) -> Result<Url> {
		let mut url = self.base_url.join(path.trim_start_matches('/')).map_err(|source| {
			ConfigError::InvalidApiPath { path: path.to_owned(), source }
		})?;

		{
			let mut pairs = url.query_pairs_mut();

			for (name, value) in query.iter().filter(|(_, value)| !value.trim().is_empty()) {
				pairs.append_pair(name, value);
			}
		}

		if url.query() == Some("") {
			url.set_query(None);
		}

		Ok(url)
	}

	async fn send(&self, url: &Url, token: &TokenSecret) -> Result<Response> {
		self.http
			.get(url.clone())
			.header(AUTHORIZATION, token.bearer())
			.header(ACCEPT, "application/json")
			.send()
			.await
			.map_err(map_reqwest_error)
	}
}

async fn decode<T>(response: Response) -> Result<T>
where
	T: DeserializeOwned,
{
	let status = response.status();
	let body = response.text().await.map_err(map_reqwest_error)?;

	if !status.is_success() {
		return Err(Error::Api { status: status.as_u16(), body });
	}

	let mut deserializer = serde_json::Deserializer::from_str(&body);

	serde_path_to_error::deserialize(&mut deserializer)
		.map_err(|source| Error::ApiDecode { source })
}

fn map_reqwest_error(err: ReqwestError) -> Error {
	if err.is_timeout() {
		Error::Timeout { operation: "partner API" }
	} else {
		TransportError::api(err).into()
	}
}

/// First day of the month containing `now` and first day of the following month.
pub fn month_range(now: OffsetDateTime) -> (time::Date, time::Date) {
	let today = now.to_offset(time::UtcOffset::UTC).date();
	let start = today - Duration::days(i64::from(today.day()) - 1);
	// 32 days past the 1st always lands early in the next month.
	let next_month = start + Duration::days(32);
	let end = next_month - Duration::days(i64::from(next_month.day()) - 1);

	(start, end)
}

fn iso_midnight(date: time::Date) -> String {
	format!("{date}T00:00:00.000Z")
}
