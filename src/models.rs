//! Data models for both platforms and the universal schema they collapse into.
//!
//! Three layers live here:
//! - Platform-native records: [`CanvasCourse`]/[`CanvasAssignment`] decoded
//!   from the REST API, [`GradescopeCourse`]/[`GradescopeAssignment`] produced
//!   by the HTML extractor. No cross-platform invariants beyond the presence
//!   of an id and a name.
//! - The universal schema: [`UniversalCourse`]/[`UniversalAssignment`], the
//!   platform-agnostic shape handed to the consumer app. Ids collide across
//!   platforms by construction, so every record carries its [`Platform`].
//! - Session material: [`Credentials`] (an explicit tagged union, one valid
//!   variant per platform) and [`Session`] (immutable once verified,
//!   superseded rather than mutated on re-login).
//!
//! Universal fields serialize in camelCase to match the JSON the consumer
//! app expects.

use crate::cookies::CookieStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which academic platform a record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Canvas,
    Gradescope,
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::Canvas => write!(f, "canvas"),
            Platform::Gradescope => write!(f, "gradescope"),
        }
    }
}

/// Credentials as an explicit tagged union. Exactly one variant is valid per
/// platform: `Token` for Canvas, `Password` or `Cookies` for Gradescope.
/// Supplying the wrong shape is a caller error
/// ([`crate::error::Error::CredentialMismatch`]), never a silent fallback.
#[derive(Debug, Clone)]
pub enum Credentials {
    /// Canvas bearer token.
    Token { token: String },
    /// Gradescope email/password login.
    Password { email: String, password: String },
    /// Gradescope session cookies captured out-of-band (e.g. from an
    /// embedded browser), as `(name, value)` pairs.
    Cookies { cookies: Vec<(String, String)> },
}

/// Cookie names a Gradescope session must hold before the scraper will
/// accept it: the primary session id and the signed token.
pub const REQUIRED_SESSION_COOKIES: [&str; 2] = ["_gradescope_session", "signed_token"];

/// An authenticated Gradescope session.
///
/// Owned by the authenticator or stabilizer. Immutable once verified; a
/// re-login produces a new `Session` instead of mutating this one.
#[derive(Debug, Clone)]
pub struct Session {
    /// Accumulated cookies in first-seen order.
    pub cookies: CookieStore,
    /// When the session was established or captured.
    pub captured_at: DateTime<Utc>,
    /// Domain the cookies were issued for.
    pub source_domain: String,
}

impl Session {
    pub fn new(cookies: CookieStore, source_domain: impl Into<String>) -> Self {
        Self {
            cookies,
            captured_at: Utc::now(),
            source_domain: source_domain.into(),
        }
    }

    /// A session is usable only if it holds every cookie in
    /// [`REQUIRED_SESSION_COOKIES`]. Anything less must not be handed to the
    /// scraper.
    pub fn is_usable(&self) -> bool {
        self.cookies.contains_all(&REQUIRED_SESSION_COOKIES)
    }

    /// Names from [`REQUIRED_SESSION_COOKIES`] that are still missing.
    pub fn missing_cookies(&self) -> Vec<&'static str> {
        REQUIRED_SESSION_COOKIES
            .iter()
            .copied()
            .filter(|name| self.cookies.get(name).is_none())
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Canvas-native records (REST JSON, string ids via json+canvas-string-ids)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct CanvasTerm {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CanvasCourse {
    pub id: String,
    pub name: Option<String>,
    pub course_code: Option<String>,
    pub term: Option<CanvasTerm>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CanvasSubmission {
    pub workflow_state: Option<String>,
    pub score: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CanvasAssignment {
    pub id: String,
    pub name: Option<String>,
    /// ISO-8601 instant as emitted by Canvas, e.g. `2025-07-16T03:59:00Z`.
    pub due_at: Option<String>,
    pub points_possible: Option<f64>,
    pub submission: Option<CanvasSubmission>,
}

// ---------------------------------------------------------------------------
// Gradescope-native records (HTML extractor output)
// ---------------------------------------------------------------------------

/// A course box as scraped from the Gradescope account page.
#[derive(Debug, Clone, PartialEq)]
pub struct GradescopeCourse {
    /// Trailing path segment of the course link, e.g. `123456`.
    pub id: String,
    pub name: String,
    /// Short name from the course box, e.g. `CS 101`.
    pub course_code: Option<String>,
    /// Term header text the box was grouped under, e.g. `Fall 2025`.
    pub term: Option<String>,
}

/// An assignment row as scraped from a Gradescope course page.
#[derive(Debug, Clone, PartialEq)]
pub struct GradescopeAssignment {
    pub id: String,
    pub title: String,
    /// First (regular) due date of the row, timezone-resolved. The second
    /// (late) due-date element, when present, is ignored.
    pub due_date: Option<DateTime<Utc>>,
    pub score: Option<f64>,
    pub max_points: Option<f64>,
    /// Platform status text, e.g. `Graded`, `Submitted (Late)`, `No Submission`.
    pub status: String,
    pub course_id: String,
}

// ---------------------------------------------------------------------------
// Universal schema
// ---------------------------------------------------------------------------

/// Submission status in the universal schema.
///
/// Invariant: `Graded` iff a numeric score is present on the assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssignmentStatus {
    Missing,
    Submitted,
    Graded,
}

/// A course in the universal schema. `id` is globally unique only combined
/// with `platform`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UniversalCourse {
    pub id: String,
    pub name: String,
    pub term: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub course_code: Option<String>,
    pub platform: Platform,
}

/// An assignment in the universal schema. Carries its owning course's
/// composite `(course_id, platform)` key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UniversalAssignment {
    pub id: String,
    pub title: String,
    /// When non-null, always a valid timezone-resolved instant, serialized
    /// as ISO-8601.
    pub due_date: Option<DateTime<Utc>>,
    pub max_points: Option<f64>,
    pub score: Option<f64>,
    pub status: AssignmentStatus,
    pub course_id: String,
    pub platform: Platform,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_usable_with_required_cookies() {
        let mut cookies = CookieStore::new();
        cookies.merge([
            "_gradescope_session=abc123; path=/; HttpOnly",
            "signed_token=tok456; path=/",
        ]);
        let session = Session::new(cookies, "www.gradescope.com");
        assert!(session.is_usable());
        assert!(session.missing_cookies().is_empty());
    }

    #[test]
    fn test_session_unusable_without_signed_token() {
        let mut cookies = CookieStore::new();
        cookies.merge(["_gradescope_session=abc123; path=/"]);
        let session = Session::new(cookies, "www.gradescope.com");
        assert!(!session.is_usable());
        assert_eq!(session.missing_cookies(), vec!["signed_token"]);
    }

    #[test]
    fn test_universal_assignment_serializes_camel_case() {
        let assignment = UniversalAssignment {
            id: "42".to_string(),
            title: "Problem Set 1".to_string(),
            due_date: None,
            max_points: Some(100.0),
            score: Some(85.0),
            status: AssignmentStatus::Graded,
            course_id: "7".to_string(),
            platform: Platform::Gradescope,
        };
        let json = serde_json::to_string(&assignment).unwrap();
        assert!(json.contains("\"maxPoints\":100.0"));
        assert!(json.contains("\"courseId\":\"7\""));
        assert!(json.contains("\"status\":\"graded\""));
        assert!(json.contains("\"platform\":\"gradescope\""));
    }

    #[test]
    fn test_canvas_course_deserializes_string_ids() {
        let json = r#"{
            "id": "10234",
            "name": "Linear Algebra",
            "course_code": "MATH 310",
            "term": {"name": "Fall 2025"}
        }"#;
        let course: CanvasCourse = serde_json::from_str(json).unwrap();
        assert_eq!(course.id, "10234");
        assert_eq!(course.term.unwrap().name.unwrap(), "Fall 2025");
    }

    #[test]
    fn test_canvas_assignment_tolerates_missing_submission() {
        let json = r#"{"id": "9", "name": "Quiz 1", "due_at": null, "points_possible": 10.0}"#;
        let assignment: CanvasAssignment = serde_json::from_str(json).unwrap();
        assert!(assignment.submission.is_none());
        assert!(assignment.due_at.is_none());
    }
}
