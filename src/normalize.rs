//! Field normalization onto the universal schema.
//!
//! Pure mappings, no I/O. Each platform's status vocabulary collapses onto
//! the 3-value [`AssignmentStatus`] via a fixed lookup; unrecognized source
//! statuses default to `missing` so a new platform status never crashes
//! normalization. A non-null numeric score always forces `graded`, keeping
//! the `graded iff score present` invariant regardless of what the status
//! text claimed.
//!
//! Term strings are stored unchanged, case and punctuation preserved; only
//! [`term_matches`] lowercases, and only for comparison.
//!
//! # Status lookup tables
//!
//! | Canvas `workflow_state` | Universal |
//! |-------------------------|-----------|
//! | `graded` (with score)   | graded    |
//! | `graded` (score null)   | submitted |
//! | `submitted`             | submitted |
//! | `pending_review`        | submitted |
//! | `unsubmitted`           | missing   |
//! | anything else / absent  | missing   |
//!
//! | Gradescope status text   | Universal |
//! |--------------------------|-----------|
//! | `Graded`                 | graded    |
//! | `Submitted`              | submitted |
//! | `Ungraded` / `Submitted (Late)` | submitted |
//! | `No Submission` / `Missing`     | missing |
//! | anything else            | missing   |

use crate::dates::parse_due_date;
use crate::models::{
    AssignmentStatus, CanvasAssignment, CanvasCourse, GradescopeAssignment, GradescopeCourse,
    Platform, UniversalAssignment, UniversalCourse,
};
use chrono::{DateTime, Utc};

/// Whether a course term satisfies a filter: every whitespace-separated word
/// of the lowercased filter must be a substring of the lowercased term. The
/// empty filter matches everything.
pub fn term_matches(filter: &str, term: &str) -> bool {
    let term = term.to_lowercase();
    filter
        .to_lowercase()
        .split_whitespace()
        .all(|word| term.contains(word))
}

/// Map a Canvas course onto the universal schema.
pub fn normalize_canvas_course(course: &CanvasCourse) -> UniversalCourse {
    UniversalCourse {
        id: course.id.clone(),
        name: course
            .name
            .clone()
            .unwrap_or_else(|| course.id.clone()),
        term: course
            .term
            .as_ref()
            .and_then(|t| t.name.clone())
            .unwrap_or_default(),
        course_code: course.course_code.clone(),
        platform: Platform::Canvas,
    }
}

/// Map a Canvas assignment onto the universal schema.
pub fn normalize_canvas_assignment(
    assignment: &CanvasAssignment,
    course_id: &str,
) -> UniversalAssignment {
    let submission = assignment.submission.as_ref();
    let score = submission.and_then(|s| s.score);
    let workflow_state = submission.and_then(|s| s.workflow_state.as_deref());

    UniversalAssignment {
        id: assignment.id.clone(),
        title: assignment
            .name
            .clone()
            .unwrap_or_else(|| assignment.id.clone()),
        due_date: assignment.due_at.as_deref().and_then(parse_canvas_instant),
        max_points: assignment.points_possible,
        score,
        status: canvas_status(workflow_state, score),
        course_id: course_id.to_string(),
        platform: Platform::Canvas,
    }
}

/// Map a Gradescope course onto the universal schema.
pub fn normalize_gradescope_course(course: &GradescopeCourse) -> UniversalCourse {
    UniversalCourse {
        id: course.id.clone(),
        name: course.name.clone(),
        term: course.term.clone().unwrap_or_default(),
        course_code: course.course_code.clone(),
        platform: Platform::Gradescope,
    }
}

/// Map a scraped Gradescope assignment onto the universal schema.
pub fn normalize_gradescope_assignment(assignment: &GradescopeAssignment) -> UniversalAssignment {
    UniversalAssignment {
        id: assignment.id.clone(),
        title: assignment.title.clone(),
        due_date: assignment.due_date,
        max_points: assignment.max_points,
        score: assignment.score,
        status: gradescope_status(&assignment.status, assignment.score),
        course_id: assignment.course_id.clone(),
        platform: Platform::Gradescope,
    }
}

/// Canvas `submission.workflow_state` lookup. A numeric score wins over the
/// state text in both directions: score present forces `graded`, and a
/// `graded` state without a score degrades to `submitted`.
fn canvas_status(workflow_state: Option<&str>, score: Option<f64>) -> AssignmentStatus {
    if score.is_some() {
        return AssignmentStatus::Graded;
    }
    match workflow_state {
        Some("graded") | Some("submitted") | Some("pending_review") => AssignmentStatus::Submitted,
        // "unsubmitted", anything unrecognized, or no submission at all.
        _ => AssignmentStatus::Missing,
    }
}

/// Gradescope `submissions_status` text lookup. The extractor may append a
/// `(Late)` suffix; matching is on the leading word.
fn gradescope_status(status_text: &str, score: Option<f64>) -> AssignmentStatus {
    if score.is_some() {
        return AssignmentStatus::Graded;
    }
    let lowered = status_text.to_lowercase();
    if lowered.starts_with("graded")
        || lowered.starts_with("submitted")
        || lowered.starts_with("ungraded")
    {
        AssignmentStatus::Submitted
    } else {
        AssignmentStatus::Missing
    }
}

/// Canvas emits strict ISO-8601 (`2025-07-16T03:59:00Z`); fall back to the
/// shared normalizer for anything unusual.
fn parse_canvas_instant(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| parse_due_date(raw))
}
