//! Shared HTTP plumbing for both platform clients.
//!
//! Gradescope behaves differently (or rejects outright) without a realistic
//! browser `User-Agent`, so every request sends one. The login flow also
//! needs redirects left unfollowed: the 302 itself is the success signal, so
//! a dedicated no-redirect client exists alongside the ordinary one.

use crate::error::{Error, NetworkError};
use reqwest::{Client, Response, redirect};
use std::time::Duration;

/// Browser `User-Agent` sent on every Gradescope request.
pub const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Hard abort for any single request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for ordinary authenticated GETs; follows redirects.
pub fn browser_client() -> Result<Client, Error> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| Error::Network(NetworkError::ConnectionFailed(e.to_string())))
}

/// Client for the login sequence; redirects are the signal, never followed
/// automatically.
pub fn no_redirect_client() -> Result<Client, Error> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(REQUEST_TIMEOUT)
        .redirect(redirect::Policy::none())
        .build()
        .map_err(|e| Error::Network(NetworkError::ConnectionFailed(e.to_string())))
}

/// All `Set-Cookie` values of a response, in header order.
pub fn set_cookie_values(response: &Response) -> Vec<String> {
    response
        .headers()
        .get_all(reqwest::header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(|v| v.to_string())
        .collect()
}
