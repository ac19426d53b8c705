//! Authenticated Gradescope page fetching.
//!
//! The scraper owns a verified [`Session`] and replays its cookies on every
//! GET. Gradescope answers expired or bad sessions by bouncing to the login
//! page with a 200, so a successful status alone proves nothing; every
//! response body is checked for the login form before it is handed to the
//! extractor.
//!
//! Multi-course assignment fetches fan out concurrently, bounded to a small
//! pool so the site's anti-automation rate limiting is never provoked. Row
//! order within one course is preserved; across courses no order is
//! guaranteed.

use crate::error::{Error, UpstreamError, from_reqwest};
use crate::gradescope::{auth, extract};
use crate::http::{self, REQUEST_TIMEOUT};
use crate::models::{GradescopeAssignment, GradescopeCourse, Platform, Session};
use crate::retry::{RetryPolicy, with_backoff};
use futures::stream::{self, StreamExt};
use reqwest::{Client, header};
use tracing::{info, instrument, warn};

/// Fan-out bound for concurrent course fetches.
const MAX_CONCURRENT_FETCHES: usize = 4;

/// Issues authenticated GETs against account and course pages and feeds the
/// HTML to the extractor.
pub struct GradescopeScraper {
    client: Client,
    session: Session,
    base_url: String,
    retry: RetryPolicy,
}

impl GradescopeScraper {
    /// Build a scraper around a verified session.
    ///
    /// # Errors
    ///
    /// [`Error::UnusableSession`] if the session lacks the cookies required
    /// for authenticated requests; such a session must never reach the
    /// network.
    pub fn new(session: Session) -> Result<Self, Error> {
        Self::with_base_url(session, super::BASE_URL)
    }

    pub fn with_base_url(session: Session, base_url: impl Into<String>) -> Result<Self, Error> {
        if !session.is_usable() {
            return Err(Error::UnusableSession(session.missing_cookies().join(", ")));
        }
        Ok(Self {
            client: http::browser_client()?,
            session,
            base_url: base_url.into(),
            retry: RetryPolicy::default(),
        })
    }

    /// Fetch and extract the course list from the account page.
    #[instrument(level = "info", skip_all)]
    pub async fn fetch_courses(&self) -> Result<Vec<GradescopeCourse>, Error> {
        let html = self.authed_get("/account").await?;
        let courses = extract::extract_courses(&html);
        info!(count = courses.len(), "fetched Gradescope courses");
        Ok(courses)
    }

    /// Fetch and extract one course's assignment table, row order preserved.
    #[instrument(level = "info", skip(self))]
    pub async fn fetch_assignments(
        &self,
        course_id: &str,
    ) -> Result<Vec<GradescopeAssignment>, Error> {
        let html = self.authed_get(&format!("/courses/{course_id}")).await?;
        let assignments = extract::extract_assignments(&html, course_id);
        info!(
            course_id,
            count = assignments.len(),
            "fetched Gradescope assignments"
        );
        Ok(assignments)
    }

    /// Fetch assignments for several courses with bounded concurrency.
    ///
    /// The first authentication or network failure aborts the whole
    /// operation; there is no partial success across courses.
    #[instrument(level = "info", skip_all, fields(courses = courses.len()))]
    pub async fn fetch_assignments_for(
        &self,
        courses: &[GradescopeCourse],
    ) -> Result<Vec<GradescopeAssignment>, Error> {
        let results: Vec<Result<Vec<GradescopeAssignment>, Error>> =
            stream::iter(courses.iter())
                .map(|course| self.fetch_assignments(&course.id))
                .buffer_unordered(MAX_CONCURRENT_FETCHES)
                .collect()
                .await;

        let mut all = Vec::new();
        for result in results {
            all.extend(result?);
        }
        info!(count = all.len(), "fetched assignments across courses");
        Ok(all)
    }

    /// Whether the session still authenticates: `Ok(false)` for a rejected
    /// session, errors only for transport problems.
    pub async fn test_connection(&self) -> Result<bool, Error> {
        match self.authed_get("/account").await {
            Ok(_) => Ok(true),
            Err(Error::Upstream(UpstreamError::UnauthorizedResponse { .. })) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// GET a path with the session cookies attached, through the shared
    /// retry policy. A bounce to the login page surfaces as
    /// [`UpstreamError::UnauthorizedResponse`].
    async fn authed_get(&self, path: &str) -> Result<String, Error> {
        let url = format!("{}{}", self.base_url, path);
        with_backoff(path, &self.retry, || {
            let client = self.client.clone();
            let url = url.clone();
            let cookie_header = self.session.cookies.header();
            let endpoint = path.to_string();
            async move {
                let response = client
                    .get(&url)
                    .header(header::COOKIE, cookie_header)
                    .send()
                    .await
                    .map_err(|e| from_reqwest(e, REQUEST_TIMEOUT))?;

                let status = response.status();
                if status == reqwest::StatusCode::UNAUTHORIZED
                    || status == reqwest::StatusCode::FORBIDDEN
                {
                    return Err(UpstreamError::UnauthorizedResponse {
                        platform: Platform::Gradescope,
                    }
                    .into());
                }
                if !status.is_success() {
                    return Err(UpstreamError::UnexpectedStatus {
                        status: status.as_u16(),
                        endpoint,
                    }
                    .into());
                }

                let bounced_to_login = response.url().path().starts_with("/login");
                let body = response
                    .text()
                    .await
                    .map_err(|e| from_reqwest(e, REQUEST_TIMEOUT))?;
                if bounced_to_login || auth::looks_like_login_page(&body) {
                    warn!(endpoint, "session rejected; bounced to login page");
                    return Err(UpstreamError::UnauthorizedResponse {
                        platform: Platform::Gradescope,
                    }
                    .into());
                }
                Ok(body)
            }
        })
        .await
    }
}
