//! Shared HTTP client construction for scraping backends.
//!
//! Provides a configured [`reqwest::Client`] honouring the request's timeout
//! and proxy settings, with cookie support and rotating User-Agent strings.

use std::time::Duration;

use rand::seq::SliceRandom;

use crate::error::BackendError;
use crate::types::SearchParameters;

/// Realistic browser User-Agent strings, rotated per request.
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:133.0) Gecko/20100101 Firefox/133.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:133.0) Gecko/20100101 Firefox/133.0",
];

/// Build a [`reqwest::Client`] for one backend request.
///
/// The client has:
/// - Cookie store enabled
/// - Timeout from [`SearchParameters::timeout`]
/// - `http`/`https` proxies from [`SearchParameters::proxy`]
/// - The given User-Agent, or a random one from the rotation list
///
/// # Errors
///
/// Returns [`BackendError::Http`] if a proxy URL is rejected or the client
/// cannot be constructed.
pub fn build_client(
    params: &SearchParameters,
    user_agent: Option<&str>,
) -> Result<reqwest::Client, BackendError> {
    let ua = match user_agent {
        Some(ua) => ua,
        None => random_user_agent(),
    };

    let mut builder = reqwest::Client::builder()
        .cookie_store(true)
        .timeout(params.timeout())
        .connect_timeout(params.timeout().min(Duration::from_secs(5)))
        .user_agent(ua)
        .redirect(reqwest::redirect::Policy::limited(10));

    if let Some(proxy) = &params.proxy {
        if let Some(http) = &proxy.http {
            let p = reqwest::Proxy::http(http)
                .map_err(|e| BackendError::Http(format!("invalid http proxy: {e}")))?;
            builder = builder.proxy(p);
        }
        if let Some(https) = &proxy.https {
            let p = reqwest::Proxy::https(https)
                .map_err(|e| BackendError::Http(format!("invalid https proxy: {e}")))?;
            builder = builder.proxy(p);
        }
    }

    builder
        .build()
        .map_err(|e| BackendError::Http(format!("failed to build HTTP client: {e}")))
}

/// Map a transport error, distinguishing timeouts.
pub fn request_error(provider: &str, err: &reqwest::Error) -> BackendError {
    if err.is_timeout() {
        BackendError::Timeout(format!("{provider} request timed out: {err}"))
    } else {
        BackendError::Http(format!("{provider} request failed: {err}"))
    }
}

/// Select a random User-Agent string from the rotation list.
pub fn random_user_agent() -> &'static str {
    let mut rng = rand::thread_rng();
    USER_AGENTS
        .choose(&mut rng)
        .copied()
        // USER_AGENTS is a non-empty const array; choose only returns None on empty slices
        .unwrap_or(USER_AGENTS[0])
}
