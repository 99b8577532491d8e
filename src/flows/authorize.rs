//! Consent redirect sessions: random `state`, authorize URL, and callback validation.

// crates.io
use rand::{Rng, distr::Alphanumeric};
// self
use crate::_prelude::*;

const STATE_LEN: usize = 32;

/// Consent redirect metadata returned by `HttpAuthorizationClient::start_authorization`.
#[derive(Clone, Debug)]
pub struct AuthorizationSession {
	/// Opaque state value that must round-trip via the callback.
	pub state: String,
	/// Redirect URI embedded in the authorize URL; the code exchange must reuse it.
	pub redirect_uri: Url,
	/// Authorize URL the user should be sent to.
	pub authorize_url: Url,
}
impl AuthorizationSession {
	pub(crate) fn new(authorization_endpoint: &Url, client_id: &str, redirect_uri: &Url) -> Self {
		let state = random_string(STATE_LEN);
		let mut authorize_url = authorization_endpoint.clone();

		authorize_url
			.query_pairs_mut()
			.append_pair("response_type", "code")
			.append_pair("client_id", client_id)
			.append_pair("redirect_uri", redirect_uri.as_str())
			.append_pair("state", &state);

		Self { state, redirect_uri: redirect_uri.clone(), authorize_url }
	}

	/// Validates the returned `state` parameter after the consent redirect.
	pub fn validate_state(&self, returned_state: &str) -> Result<()> {
		if returned_state == self.state { Ok(()) } else { Err(Error::StateMismatch) }
	}

	/// Checks the callback's `state` and extracts its authorization code.
	pub fn validate_callback<'a>(
		&self,
		returned_state: Option<&str>,
		code: Option<&'a str>,
	) -> Result<&'a str> {
		self.validate_state(returned_state.unwrap_or_default())?;

		code.map(str::trim).filter(|code| !code.is_empty()).ok_or(Error::MissingCode)
	}
}

fn random_string(len: usize) -> String {
	rand::rng().sample_iter(Alphanumeric).take(len).map(char::from).collect()
}
