//! # course_sync
//!
//! Aggregates coursework (courses, assignments, grades) from two academic
//! platforms into one normalized model. Canvas exposes a documented,
//! token-authenticated REST API; Gradescope exposes no API at all and is
//! driven through its ordinary HTML web session: CSRF-protected login,
//! accumulated cookies, and fragile DOM extraction with fallbacks.
//!
//! ## Architecture
//!
//! Data flows leaves-first:
//! 1. **Authentication**: [`gradescope::auth`] drives the login state
//!    machine; [`gradescope::stabilize`] settles cookies captured from an
//!    embedded browser.
//! 2. **Fetching**: [`gradescope::scrape`] issues authenticated GETs;
//!    [`canvas::client`] calls the REST API through a TTL/single-flight
//!    [`cache::RequestCache`].
//! 3. **Parsing**: [`gradescope::extract`] turns HTML into raw records;
//!    [`dates`] resolves due dates to instants.
//! 4. **Normalization**: [`normalize`] collapses both platforms onto
//!    [`models::UniversalCourse`]/[`models::UniversalAssignment`].
//!
//! The facade functions below are the surface the consumer app calls.

pub mod cache;
pub mod canvas;
pub mod cookies;
pub mod dates;
pub mod error;
pub mod gradescope;
pub mod http;
pub mod models;
pub mod normalize;
pub mod retry;

pub use error::Error;
pub use models::{
    AssignmentStatus, Credentials, Platform, Session, UniversalAssignment, UniversalCourse,
};

use canvas::CanvasClient;
use cookies::CookieStore;
use gradescope::auth::GradescopeAuthenticator;
use gradescope::scrape::GradescopeScraper;
use normalize::{
    normalize_canvas_assignment, normalize_canvas_course, normalize_gradescope_assignment,
    normalize_gradescope_course, term_matches,
};
use tracing::instrument;

/// Default Canvas instance when the caller does not name one.
pub const CANVAS_BASE_URL: &str = "https://canvas.instructure.com";

/// Fetch all courses for a platform, filtered by term.
///
/// The filter matches when every whitespace-separated word of it appears in
/// the course's term, case-insensitively; the empty filter returns all
/// courses.
///
/// # Errors
///
/// [`Error::CredentialMismatch`] if the credential variant does not fit the
/// platform, plus the authentication/network/upstream kinds from below.
#[instrument(level = "info", skip(credentials))]
pub async fn fetch_courses(
    platform: Platform,
    credentials: &Credentials,
    term_filter: &str,
) -> Result<Vec<UniversalCourse>, Error> {
    let courses = match platform {
        Platform::Canvas => {
            let client = canvas_client(credentials)?;
            client
                .fetch_courses()
                .await?
                .iter()
                .map(normalize_canvas_course)
                .collect::<Vec<_>>()
        }
        Platform::Gradescope => {
            let scraper = gradescope_scraper(credentials).await?;
            scraper
                .fetch_courses()
                .await?
                .iter()
                .map(normalize_gradescope_course)
                .collect::<Vec<_>>()
        }
    };
    Ok(courses
        .into_iter()
        .filter(|course| term_matches(term_filter, &course.term))
        .collect())
}

/// Fetch assignments for one course on a platform.
#[instrument(level = "info", skip(credentials))]
pub async fn fetch_assignments(
    platform: Platform,
    credentials: &Credentials,
    course_id: &str,
) -> Result<Vec<UniversalAssignment>, Error> {
    match platform {
        Platform::Canvas => {
            let client = canvas_client(credentials)?;
            Ok(client
                .fetch_assignments(course_id)
                .await?
                .iter()
                .map(|a| normalize_canvas_assignment(a, course_id))
                .collect())
        }
        Platform::Gradescope => {
            let scraper = gradescope_scraper(credentials).await?;
            Ok(scraper
                .fetch_assignments(course_id)
                .await?
                .iter()
                .map(normalize_gradescope_assignment)
                .collect())
        }
    }
}

/// Fetch assignments across every course on the platform.
///
/// Gradescope courses are fetched with the scraper's bounded fan-out; Canvas
/// courses go through the request cache, so repeated course pages within the
/// TTL cost nothing. No ordering is guaranteed across courses; row order
/// within one course is preserved.
#[instrument(level = "info", skip(credentials))]
pub async fn fetch_all_assignments(
    platform: Platform,
    credentials: &Credentials,
) -> Result<Vec<UniversalAssignment>, Error> {
    match platform {
        Platform::Canvas => {
            let client = canvas_client(credentials)?;
            let courses = client.fetch_courses().await?;
            let mut all = Vec::new();
            for course in &courses {
                let assignments = client.fetch_assignments(&course.id).await?;
                all.extend(
                    assignments
                        .iter()
                        .map(|a| normalize_canvas_assignment(a, &course.id)),
                );
            }
            Ok(all)
        }
        Platform::Gradescope => {
            let scraper = gradescope_scraper(credentials).await?;
            let courses = scraper.fetch_courses().await?;
            let assignments = scraper.fetch_assignments_for(&courses).await?;
            Ok(assignments
                .iter()
                .map(normalize_gradescope_assignment)
                .collect())
        }
    }
}

/// Whether the supplied credentials currently authenticate against the
/// platform. `Ok(false)` means "reached the platform, credentials
/// rejected"; transport failures stay errors.
#[instrument(level = "info", skip(credentials))]
pub async fn test_connection(platform: Platform, credentials: &Credentials) -> Result<bool, Error> {
    match platform {
        Platform::Canvas => canvas_client(credentials)?.test_connection().await,
        Platform::Gradescope => match gradescope_scraper(credentials).await {
            Ok(scraper) => scraper.test_connection().await,
            Err(Error::Auth(error::AuthError::InvalidCredentials)) => Ok(false),
            Err(e) => Err(e),
        },
    }
}

/// Exhaustive credential dispatch for Canvas: only the token variant fits.
fn canvas_client(credentials: &Credentials) -> Result<CanvasClient, Error> {
    match credentials {
        Credentials::Token { token } => CanvasClient::new(CANVAS_BASE_URL, token.clone()),
        Credentials::Password { .. } | Credentials::Cookies { .. } => {
            Err(Error::CredentialMismatch(Platform::Canvas))
        }
    }
}

/// Exhaustive credential dispatch for Gradescope: a password logs in, a
/// cookie set becomes a session directly. A cookie session missing the
/// required cookies is rejected before any network traffic.
async fn gradescope_scraper(credentials: &Credentials) -> Result<GradescopeScraper, Error> {
    match credentials {
        Credentials::Password { email, password } => {
            let session = GradescopeAuthenticator::new()?
                .authenticate(email, password)
                .await?;
            GradescopeScraper::new(session)
        }
        Credentials::Cookies { cookies } => {
            let store = CookieStore::from_pairs(cookies.iter().cloned());
            let session = Session::new(store, gradescope::BASE_URL);
            GradescopeScraper::new(session)
        }
        Credentials::Token { .. } => Err(Error::CredentialMismatch(Platform::Gradescope)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_wrong_credential_shape_is_rejected() {
        let token = Credentials::Token {
            token: "abc".to_string(),
        };
        let got = fetch_courses(Platform::Gradescope, &token, "").await;
        assert_eq!(got, Err(Error::CredentialMismatch(Platform::Gradescope)));

        let password = Credentials::Password {
            email: "a@b.edu".to_string(),
            password: "pw".to_string(),
        };
        let got = fetch_courses(Platform::Canvas, &password, "").await;
        assert_eq!(got, Err(Error::CredentialMismatch(Platform::Canvas)));
    }

    #[tokio::test]
    async fn test_incomplete_cookie_session_rejected_before_network() {
        let cookies = Credentials::Cookies {
            cookies: vec![("_gradescope_session".to_string(), "s".to_string())],
        };
        let got = fetch_assignments(Platform::Gradescope, &cookies, "123").await;
        assert!(matches!(got, Err(Error::UnusableSession(_))));
    }
}
