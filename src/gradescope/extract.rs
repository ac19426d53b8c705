//! Course and assignment extraction from Gradescope HTML.
//!
//! The markup varies by account type and page variant, so element location
//! runs through ordered selector chains: try the first selector, and only on
//! zero matches fall through to the next. A single malformed course box or
//! assignment row is logged and skipped; it never fails the whole page.
//!
//! # Course boxes
//!
//! ```text
//! <div class="courseList--term">Fall 2025</div>
//! <div class="courseList--coursesForTerm">
//!   <a class="courseBox" href="/courses/123456">
//!     <h3 class="courseBox--shortname">CS 101</h3>
//!     <div class="courseBox--name">Intro to Computer Science</div>
//!   </a>
//! </div>
//! ```
//!
//! The term is resolved by walking up the ancestor chain to the grouping
//! container and reading its preceding term-header sibling.

use crate::dates::parse_due_date;
use crate::models::{GradescopeAssignment, GradescopeCourse};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, instrument, warn};

fn selectors(sources: &[&str]) -> Vec<Selector> {
    sources
        .iter()
        .map(|s| Selector::parse(s).expect("valid selector"))
        .collect()
}

/// Course container chain, most specific page variant first.
static COURSE_SELECTORS: Lazy<Vec<Selector>> = Lazy::new(|| {
    selectors(&[
        "a.courseBox",
        ".courseBox",
        ".courseList a[href*='/courses/']",
    ])
});

/// Assignment row chain.
static ROW_SELECTORS: Lazy<Vec<Selector>> = Lazy::new(|| {
    selectors(&[
        "table#assignments-student-table tbody tr",
        "table.table tbody tr",
        "table tbody tr",
    ])
});

static COURSE_NAME_SEL: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".courseBox--name").expect("valid selector"));
static COURSE_SHORTNAME_SEL: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".courseBox--shortname").expect("valid selector"));
static ANCHOR_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").expect("valid selector"));
static CELL_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse("th, td").expect("valid selector"));
static STATUS_TEXT_SEL: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".submissionStatus--text").expect("valid selector"));
static STATUS_CELL_SEL: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".submissionStatus").expect("valid selector"));
static DUE_DATE_SELS: Lazy<Vec<Selector>> =
    Lazy::new(|| selectors(&["time.submissionTimeChart--dueDate", "time[datetime]"]));

/// `85.0 / 100.0` style grade text.
static GRADE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+(?:\.\d+)?)\s*/\s*(\d+(?:\.\d+)?)").expect("valid regex"));

/// Extract course records from the account page.
///
/// An element with no resolvable name or id is dropped, not defaulted.
#[instrument(level = "debug", skip_all)]
pub fn extract_courses(html: &str) -> Vec<GradescopeCourse> {
    let document = Html::parse_document(html);

    let elements = first_match(&document, &COURSE_SELECTORS);
    let mut courses = Vec::new();
    for element in &elements {
        match parse_course_box(element) {
            Some(course) => courses.push(course),
            None => warn!("skipping course box with no resolvable name or id"),
        }
    }
    debug!(
        found = elements.len(),
        kept = courses.len(),
        "extracted course boxes"
    );
    courses
}

/// Extract assignment records from a course page, preserving row order.
///
/// A record is never emitted with an empty id; rows that resolve to neither
/// a link id nor a title slug are dropped.
#[instrument(level = "debug", skip(html))]
pub fn extract_assignments(html: &str, course_id: &str) -> Vec<GradescopeAssignment> {
    let document = Html::parse_document(html);

    let rows = first_match(&document, &ROW_SELECTORS);
    let mut assignments = Vec::new();
    for row in &rows {
        match parse_assignment_row(row, course_id) {
            Some(assignment) => assignments.push(assignment),
            None => warn!(course_id, "skipping assignment row with no title or id"),
        }
    }
    debug!(
        course_id,
        found = rows.len(),
        kept = assignments.len(),
        "extracted assignment rows"
    );
    assignments
}

/// Run the selector chain: the first selector with any matches wins.
fn first_match<'a>(document: &'a Html, chain: &[Selector]) -> Vec<ElementRef<'a>> {
    for selector in chain {
        let matches: Vec<_> = document.select(selector).collect();
        if !matches.is_empty() {
            return matches;
        }
    }
    Vec::new()
}

// ---------------------------------------------------------------------------
// Courses
// ---------------------------------------------------------------------------

fn parse_course_box(element: &ElementRef<'_>) -> Option<GradescopeCourse> {
    let href = element
        .value()
        .attr("href")
        .or_else(|| {
            element
                .select(&ANCHOR_SEL)
                .next()
                .and_then(|a| a.value().attr("href"))
        })?;
    let id = trailing_segment(href)?;

    let name = element
        .select(&COURSE_NAME_SEL)
        .next()
        .map(|el| clean_text(&el))
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| clean_text(element));
    if name.is_empty() {
        return None;
    }

    let course_code = element
        .select(&COURSE_SHORTNAME_SEL)
        .next()
        .map(|el| clean_text(&el))
        .filter(|t| !t.is_empty());

    Some(GradescopeCourse {
        id,
        name,
        course_code,
        term: resolve_term(element),
    })
}

/// Walk up the ancestor chain until a term header is found: the grouping
/// container's preceding `courseList--term` sibling names the term.
fn resolve_term(element: &ElementRef<'_>) -> Option<String> {
    for ancestor in element.ancestors() {
        if ElementRef::wrap(ancestor).is_none() {
            continue;
        }
        for sibling in ancestor.prev_siblings() {
            let Some(sib) = ElementRef::wrap(sibling) else {
                continue;
            };
            if has_class(&sib, "courseList--term") {
                let term = clean_text(&sib);
                if !term.is_empty() {
                    return Some(term);
                }
            }
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Assignments
// ---------------------------------------------------------------------------

fn parse_assignment_row(row: &ElementRef<'_>, course_id: &str) -> Option<GradescopeAssignment> {
    let cells: Vec<ElementRef<'_>> = row.select(&CELL_SEL).collect();
    if cells.is_empty() {
        return None;
    }

    // Title and id: prefer the row's anchor; fall back to plain cell text
    // with a synthesized slug id.
    let anchor = row.select(&ANCHOR_SEL).next();
    let (title, id) = match anchor {
        Some(a) => {
            let title = clean_text(&a);
            let id = a
                .value()
                .attr("href")
                .and_then(assignment_id_from_href)
                .or_else(|| (!title.is_empty()).then(|| slugify(&title)))?;
            (title, id)
        }
        None => {
            let title = clean_text(&cells[0]);
            if title.is_empty() {
                return None;
            }
            let id = slugify(&title);
            (title, id)
        }
    };
    if title.is_empty() || id.is_empty() {
        return None;
    }

    // Grade and late markers live in the status cell. The due-date column
    // can carry a "Late Due Date: ..." second deadline and the title can
    // contain an "x / y" of its own, so neither may feed these scans.
    let status_cell_text = row.select(&STATUS_CELL_SEL).next().map(|el| clean_text(&el));
    let non_title_text = cells
        .iter()
        .skip(1)
        .map(clean_text)
        .collect::<Vec<_>>()
        .join(" ");
    let grade_haystack = status_cell_text.as_deref().unwrap_or(&non_title_text);

    let (score, max_points) = parse_grade(grade_haystack);
    let status_text = explicit_status(row);

    // Priority: explicit status text, then graded-if-scored, then a
    // submitted marker in the cells, then missing.
    let mut status = if let Some(text) = status_text {
        text
    } else if score.is_some() {
        "Graded".to_string()
    } else if non_title_text.to_lowercase().contains("submitted") {
        "Submitted".to_string()
    } else {
        "No Submission".to_string()
    };
    if status_cell_text.as_deref().is_some_and(is_late) && !status.contains("(Late)") {
        status.push_str(" (Late)");
    }

    Some(GradescopeAssignment {
        id,
        title,
        due_date: first_due_date(row),
        score,
        max_points,
        status,
        course_id: course_id.to_string(),
    })
}

/// Assignment id from an href path. `/courses/1/assignments/42/submissions/7`
/// and `/courses/1/assignments/42` both yield `42`; hrefs with no
/// `assignments` segment fall back to the trailing segment.
fn assignment_id_from_href(href: &str) -> Option<String> {
    let path = href.split(['?', '#']).next().unwrap_or(href);
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if let Some(pos) = segments.iter().position(|s| *s == "assignments") {
        if let Some(id) = segments.get(pos + 1) {
            return Some((*id).to_string());
        }
    }
    trailing_segment(path)
}

/// Only the first due-date element in a row is authoritative; the second
/// (the late due date) is ignored by design.
fn first_due_date(row: &ElementRef<'_>) -> Option<DateTime<Utc>> {
    for selector in DUE_DATE_SELS.iter() {
        if let Some(el) = row.select(selector).next() {
            if let Some(attr) = el.value().attr("datetime") {
                if let Some(parsed) = parse_due_date(attr) {
                    return Some(parsed);
                }
            }
            return parse_due_date(&clean_text(&el));
        }
    }
    None
}

/// Score and max points from an `x / y` pattern in the status text; no
/// match yields `None` for both, never zero.
fn parse_grade(haystack: &str) -> (Option<f64>, Option<f64>) {
    match GRADE_RE.captures(haystack) {
        Some(caps) => {
            let score = caps.get(1).and_then(|m| m.as_str().parse().ok());
            let max = caps.get(2).and_then(|m| m.as_str().parse().ok());
            (score, max)
        }
        None => (None, None),
    }
}

fn explicit_status(row: &ElementRef<'_>) -> Option<String> {
    row.select(&STATUS_TEXT_SEL)
        .next()
        .map(|el| clean_text(&el))
        .filter(|t| !t.is_empty())
}

/// A late marker in the status cell's text. The "Late Due Date" label is
/// still excluded in case a page variant folds both columns into one cell.
fn is_late(status_text: &str) -> bool {
    status_text.contains("Late") && !status_text.trim_start().starts_with("Late Due Date")
}

// ---------------------------------------------------------------------------
// Small shared helpers
// ---------------------------------------------------------------------------

/// Element text with whitespace collapsed.
fn clean_text(element: &ElementRef<'_>) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn has_class(element: &ElementRef<'_>, class: &str) -> bool {
    element
        .value()
        .attr("class")
        .map(|c| c.split_whitespace().any(|x| x == class))
        .unwrap_or(false)
}

/// Trailing path segment of an href, e.g. `/courses/123456` → `123456`.
fn trailing_segment(href: &str) -> Option<String> {
    href.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

/// Synthesized id for link-less rows: lowercase, alphanumerics and hyphens.
fn slugify(title: &str) -> String {
    title
        .to_lowercase()
        .replace(|c: char| !c.is_alphanumeric() && c != ' ' && c != '-', "")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const ACCOUNT_PAGE: &str = r#"
    <html><body><div class="courseList">
      <div class="courseList--term">Fall 2025</div>
      <div class="courseList--coursesForTerm">
        <a class="courseBox" href="/courses/123456">
          <h3 class="courseBox--shortname">CS 101</h3>
          <div class="courseBox--name">Intro to Computer Science</div>
        </a>
        <a class="courseBox" href="/courses/654321">
          <div class="courseBox--name">Data Structures</div>
        </a>
      </div>
      <div class="courseList--term">Spring 2025</div>
      <div class="courseList--coursesForTerm">
        <a class="courseBox" href="/courses/111222">
          <div class="courseBox--name">Linear Algebra</div>
        </a>
      </div>
    </div></body></html>"#;

    #[test]
    fn test_courses_extracted_with_terms() {
        let courses = extract_courses(ACCOUNT_PAGE);
        assert_eq!(courses.len(), 3);

        assert_eq!(courses[0].id, "123456");
        assert_eq!(courses[0].name, "Intro to Computer Science");
        assert_eq!(courses[0].course_code.as_deref(), Some("CS 101"));
        assert_eq!(courses[0].term.as_deref(), Some("Fall 2025"));

        assert_eq!(courses[1].term.as_deref(), Some("Fall 2025"));
        assert_eq!(courses[2].term.as_deref(), Some("Spring 2025"));
        assert_eq!(courses[2].name, "Linear Algebra");
    }

    #[test]
    fn test_course_box_without_href_is_dropped() {
        let html = r#"<div class="courseList--coursesForTerm">
          <a class="courseBox" href="/courses/1"><div class="courseBox--name">A</div></a>
          <a class="courseBox"><div class="courseBox--name">No Link</div></a>
          <a class="courseBox" href="/courses/3"><div class="courseBox--name">C</div></a>
        </div>"#;
        let courses = extract_courses(html);
        assert_eq!(courses.len(), 2);
        assert_eq!(courses[0].id, "1");
        assert_eq!(courses[1].id, "3");
    }

    #[test]
    fn test_fallback_selector_variant() {
        // Older instructor layout: div boxes wrapping an inner anchor.
        let html = r#"<div class="courseBox">
            <a href="/courses/987/">Algorithms</a>
        </div>"#;
        let courses = extract_courses(html);
        assert_eq!(courses.len(), 1);
        assert_eq!(courses[0].id, "987");
        assert_eq!(courses[0].name, "Algorithms");
        assert_eq!(courses[0].term, None);
    }

    #[test]
    fn test_no_courses_in_unrelated_html() {
        assert!(extract_courses("<html><body><p>nothing here</p></body></html>").is_empty());
    }

    const COURSE_PAGE: &str = r#"
    <table id="assignments-student-table"><tbody>
      <tr>
        <th class="table--primaryLink">
          <a href="/courses/123/assignments/777/submissions/42">Homework 1</a>
        </th>
        <td class="submissionStatus">
          <div class="submissionStatus--text">Graded</div>
          <div class="submissionStatus--score">85.0 / 100.0</div>
        </td>
        <td>
          <time class="submissionTimeChart--dueDate" datetime="2025-07-15 23:59:00 -0400">Jul 15</time>
          <time class="submissionTimeChart--dueDate" datetime="2025-07-20 23:59:00 -0400">Jul 20</time>
        </td>
      </tr>
      <tr>
        <th class="table--primaryLink">
          <a href="/courses/123/assignments/778">Homework 2</a>
        </th>
        <td class="submissionStatus">
          <div class="submissionStatus--text">No Submission</div>
        </td>
        <td></td>
      </tr>
      <tr>
        <th>Attendance Quiz</th>
        <td class="submissionStatus">Submitted</td>
        <td></td>
      </tr>
    </tbody></table>"#;

    #[test]
    fn test_assignment_ids_disambiguate_submissions_href() {
        let assignments = extract_assignments(COURSE_PAGE, "123");
        assert_eq!(assignments.len(), 3);
        // Id is the segment after "assignments", not the submission id.
        assert_eq!(assignments[0].id, "777");
        assert_eq!(assignments[1].id, "778");
    }

    #[test]
    fn test_row_order_preserved() {
        let assignments = extract_assignments(COURSE_PAGE, "123");
        let titles: Vec<&str> = assignments.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, vec!["Homework 1", "Homework 2", "Attendance Quiz"]);
    }

    #[test]
    fn test_grade_and_first_due_date_parsed() {
        let assignments = extract_assignments(COURSE_PAGE, "123");
        let hw1 = &assignments[0];
        assert_eq!(hw1.score, Some(85.0));
        assert_eq!(hw1.max_points, Some(100.0));
        assert_eq!(hw1.status, "Graded");
        // First due-date element wins; the late one is ignored.
        assert_eq!(
            hw1.due_date,
            Some(Utc.with_ymd_and_hms(2025, 7, 16, 3, 59, 0).unwrap())
        );
    }

    #[test]
    fn test_linkless_row_gets_slug_id() {
        let assignments = extract_assignments(COURSE_PAGE, "123");
        let quiz = &assignments[2];
        assert_eq!(quiz.id, "attendance-quiz");
        assert_eq!(quiz.title, "Attendance Quiz");
        assert_eq!(quiz.status, "Submitted");
    }

    #[test]
    fn test_no_grade_yields_none_not_zero() {
        let assignments = extract_assignments(COURSE_PAGE, "123");
        assert_eq!(assignments[1].score, None);
        assert_eq!(assignments[1].max_points, None);
        assert_eq!(assignments[1].status, "No Submission");
    }

    #[test]
    fn test_score_without_status_text_means_graded() {
        let html = r#"<table><tbody><tr>
          <th><a href="/courses/1/assignments/5">Lab 3</a></th>
          <td class="submissionStatus">85.0 / 100.0</td>
        </tr></tbody></table>"#;
        let assignments = extract_assignments(html, "1");
        assert_eq!(assignments.len(), 1);
        assert_eq!(assignments[0].status, "Graded");
        assert_eq!(assignments[0].score, Some(85.0));
        assert_eq!(assignments[0].max_points, Some(100.0));
    }

    #[test]
    fn test_late_due_date_column_does_not_mark_row_late() {
        // On-time row whose due-date column also renders the second, late
        // deadline; the label must not bleed into the status.
        let html = r#"<table><tbody><tr>
          <th><a href="/courses/1/assignments/7">Project 1</a></th>
          <td class="submissionStatus">
            <div class="submissionStatus--text">Graded</div>
            <div class="submissionStatus--score">92.0 / 100.0</div>
          </td>
          <td>
            <time class="submissionTimeChart--dueDate" datetime="2025-07-15 23:59:00 -0400">Jul 15</time>
            <time>Late Due Date: Jul 20 at 11:59PM</time>
          </td>
        </tr></tbody></table>"#;
        let assignments = extract_assignments(html, "1");
        assert_eq!(assignments[0].status, "Graded");
        assert_eq!(assignments[0].score, Some(92.0));
    }

    #[test]
    fn test_slash_in_title_is_not_a_grade() {
        // The "3 / 4" belongs to the title, not the grade; an unsubmitted
        // row stays score-less.
        let html = r#"<table><tbody><tr>
          <th>Reading 3 / 4 Response</th>
          <td class="submissionStatus">No Submission</td>
        </tr></tbody></table>"#;
        let assignments = extract_assignments(html, "1");
        assert_eq!(assignments.len(), 1);
        assert_eq!(assignments[0].title, "Reading 3 / 4 Response");
        assert_eq!(assignments[0].score, None);
        assert_eq!(assignments[0].max_points, None);
        assert_eq!(assignments[0].status, "No Submission");
    }

    #[test]
    fn test_titleless_grade_fallback_skips_title_cell() {
        // No .submissionStatus cell at all: the fallback scan covers the
        // non-title cells, never the title.
        let html = r#"<table><tbody><tr>
          <th>Worksheet 1 / 2</th>
          <td>8.0 / 10.0</td>
        </tr></tbody></table>"#;
        let assignments = extract_assignments(html, "1");
        assert_eq!(assignments[0].score, Some(8.0));
        assert_eq!(assignments[0].max_points, Some(10.0));
    }

    #[test]
    fn test_late_marker_appends_suffix() {
        let html = r#"<table><tbody><tr>
          <th><a href="/courses/1/assignments/6">Lab 4</a></th>
          <td class="submissionStatus"><div class="submissionStatus--text">Submitted</div> Late</td>
        </tr></tbody></table>"#;
        let assignments = extract_assignments(html, "1");
        assert_eq!(assignments[0].status, "Submitted (Late)");
    }

    #[test]
    fn test_empty_title_row_is_skipped() {
        let html = r#"<table><tbody>
          <tr><th></th><td></td></tr>
          <tr><th><a href="/courses/1/assignments/9">Real One</a></th><td></td></tr>
        </tbody></table>"#;
        let assignments = extract_assignments(html, "1");
        assert_eq!(assignments.len(), 1);
        assert_eq!(assignments[0].id, "9");
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Attendance Quiz"), "attendance-quiz");
        assert_eq!(slugify("Midterm #2 (Review)"), "midterm-2-review");
        assert_eq!(slugify("  Spaced   Out  "), "spaced-out");
    }
}
