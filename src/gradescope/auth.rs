//! Gradescope login sequence.
//!
//! A finite-state walk: `Unauthenticated → CsrfFetched → FormSubmitted →
//! {Verified | Rejected}`. The login page GET harvests cookies and the CSRF
//! meta tag; the login POST carries both and is never auto-redirected — the
//! 302 response itself is the success signal, which the server also uses for
//! silent rejections, so the redirect target is fetched and inspected for a
//! login form before the session is declared verified.
//!
//! No retry lives here; retry policy belongs to the caller.

use crate::cookies::CookieStore;
use crate::error::{AuthError, Error, from_reqwest};
use crate::http::{self, REQUEST_TIMEOUT};
use crate::models::Session;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{Client, StatusCode, header};
use tracing::{debug, info, instrument, warn};
use url::Url;

/// CSRF meta tag on the login page: `<meta name="csrf-token" content="..." />`.
static CSRF_META: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<meta\s+name="csrf-token"\s+content="([^"]+)""#).expect("valid regex")
});

/// Drives the CSRF-fetch → credential-submit → redirect-follow → verify
/// sequence against the Gradescope login endpoint.
pub struct GradescopeAuthenticator {
    client: Client,
    base_url: String,
}

impl GradescopeAuthenticator {
    pub fn new() -> Result<Self, Error> {
        Self::with_base_url(super::BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, Error> {
        Ok(Self {
            client: http::no_redirect_client()?,
            base_url: base_url.into(),
        })
    }

    /// Log in with email and password, producing a verified [`Session`].
    ///
    /// # Errors
    ///
    /// - [`AuthError::CsrfNotFound`] - login page carried no CSRF meta tag;
    ///   the POST is never attempted with an empty token.
    /// - [`AuthError::InvalidCredentials`] - rejected outright, or silently
    ///   via a redirect back to the login form.
    /// - [`AuthError::VerificationRequired`] - a 2FA/CAPTCHA wall; terminal.
    /// - [`AuthError::UnexpectedResponse`] - anything outside the known
    ///   state machine.
    #[instrument(level = "info", skip_all)]
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<Session, Error> {
        let login_url = format!("{}/login", self.base_url);

        // Unauthenticated → CsrfFetched
        let response = self
            .client
            .get(&login_url)
            .send()
            .await
            .map_err(|e| from_reqwest(e, REQUEST_TIMEOUT))?;
        let mut cookies = CookieStore::new();
        cookies.merge(http::set_cookie_values(&response));
        let body = response
            .text()
            .await
            .map_err(|e| from_reqwest(e, REQUEST_TIMEOUT))?;

        let csrf_token = extract_csrf_token(&body).ok_or(AuthError::CsrfNotFound)?;
        debug!(cookie_count = cookies.len(), "login page harvested");

        // CsrfFetched → FormSubmitted
        let response = self
            .client
            .post(&login_url)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(header::COOKIE, cookies.header())
            .body(login_form_body(&csrf_token, email, password))
            .send()
            .await
            .map_err(|e| from_reqwest(e, REQUEST_TIMEOUT))?;

        // FormSubmitted → {Verified | Rejected}
        match response.status() {
            StatusCode::FOUND => {
                cookies.merge(http::set_cookie_values(&response));
                let target = redirect_target(&self.base_url, &response)?;
                self.verify_redirect(cookies, &target).await
            }
            StatusCode::OK => {
                // A 200 on the login POST is always a rejection; the body
                // says which kind.
                let body = response
                    .text()
                    .await
                    .map_err(|e| from_reqwest(e, REQUEST_TIMEOUT))?;
                Err(classify_rejection(&body).into())
            }
            other => Err(AuthError::UnexpectedResponse(format!(
                "status {other} from login POST"
            ))
            .into()),
        }
    }

    /// Fetch the redirect target with the merged cookies and make sure we
    /// did not bounce back to a login form.
    async fn verify_redirect(
        &self,
        mut cookies: CookieStore,
        target: &str,
    ) -> Result<Session, Error> {
        let response = self
            .client
            .get(target)
            .header(header::COOKIE, cookies.header())
            .send()
            .await
            .map_err(|e| from_reqwest(e, REQUEST_TIMEOUT))?;
        cookies.merge(http::set_cookie_values(&response));
        let body = response
            .text()
            .await
            .map_err(|e| from_reqwest(e, REQUEST_TIMEOUT))?;

        if looks_like_login_page(&body) {
            warn!("redirect target still shows the login form; silent rejection");
            return Err(AuthError::InvalidCredentials.into());
        }

        let domain = Url::parse(&self.base_url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.to_string()))
            .unwrap_or_else(|| self.base_url.clone());
        let session = Session::new(cookies, domain);
        info!(cookie_count = session.cookies.len(), "login verified");
        Ok(session)
    }
}

/// Pull the CSRF token out of the login page HTML.
pub(crate) fn extract_csrf_token(html: &str) -> Option<String> {
    CSRF_META
        .captures(html)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// The fixed urlencoded field set the login form expects.
fn login_form_body(csrf_token: &str, email: &str, password: &str) -> String {
    format!(
        "utf8=%E2%9C%93&authenticity_token={}&session%5Bemail%5D={}&session%5Bpassword%5D={}\
         &session%5Bremember_me%5D=0&commit=Log%20In&session%5Bremember_me_sso%5D=0",
        urlencoding::encode(csrf_token),
        urlencoding::encode(email),
        urlencoding::encode(password),
    )
}

/// Resolve the `Location` header against the base URL; relative targets are
/// the common case.
fn redirect_target(base_url: &str, response: &reqwest::Response) -> Result<String, Error> {
    let location = response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AuthError::UnexpectedResponse("302 without Location header".to_string()))?;
    let base = Url::parse(base_url)
        .map_err(|e| AuthError::UnexpectedResponse(format!("bad base url: {e}")))?;
    let target = base
        .join(location)
        .map_err(|e| AuthError::UnexpectedResponse(format!("bad redirect target: {e}")))?;
    Ok(target.to_string())
}

/// A page still offering the login form means credentials were silently
/// rejected even though the POST redirected.
pub(crate) fn looks_like_login_page(body: &str) -> bool {
    body.contains("session[email]") || body.contains("Log In")
}

/// Classify a 200-status rejection body.
pub(crate) fn classify_rejection(body: &str) -> AuthError {
    let lowered = body.to_lowercase();
    if lowered.contains("invalid email or password") {
        AuthError::InvalidCredentials
    } else if lowered.contains("verification")
        || lowered.contains("captcha")
        || lowered.contains("2fa")
        || lowered.contains("two-factor")
    {
        AuthError::VerificationRequired
    } else {
        AuthError::UnexpectedResponse(format!(
            "login rejected with unrecognized body ({} bytes)",
            body.len()
        ))
    }
}
