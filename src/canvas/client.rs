//! Token-authenticated Canvas REST calls.
//!
//! Every request sends `Accept: application/json+canvas-string-ids`; without
//! it Canvas returns numeric ids that overflow JavaScript consumers and
//! would split the id scheme across platforms. Responses are decoded per
//! record:
//! one malformed course or assignment object is logged and skipped, it never
//! fails the whole fetch.

use crate::cache::{CacheKey, RequestCache};
use crate::error::{Error, UpstreamError, from_reqwest};
use crate::http::REQUEST_TIMEOUT;
use crate::models::{CanvasAssignment, CanvasCourse, Platform};
use crate::retry::{RetryPolicy, with_backoff};
use reqwest::{Client, StatusCode, header};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{info, instrument, warn};

/// Accept header that makes Canvas emit string-typed ids.
const CANVAS_ACCEPT: &str = "application/json+canvas-string-ids";

/// REST client for one Canvas account, caching through a [`RequestCache`].
pub struct CanvasClient {
    client: Client,
    base_url: String,
    token: String,
    cache: RequestCache<Value>,
    retry: RetryPolicy,
}

impl CanvasClient {
    /// Build a client for the given instance base URL (e.g.
    /// `https://school.instructure.com`) with a fresh cache.
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Result<Self, Error> {
        Self::with_cache(base_url, token, RequestCache::new())
    }

    /// Build a client around an existing cache, letting the owner share one
    /// cache across clients for the same account.
    pub fn with_cache(
        base_url: impl Into<String>,
        token: impl Into<String>,
        cache: RequestCache<Value>,
    ) -> Result<Self, Error> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| from_reqwest(e, REQUEST_TIMEOUT))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            cache,
            retry: RetryPolicy::default(),
        })
    }

    /// Active courses for the token's user, term included.
    #[instrument(level = "info", skip_all)]
    pub async fn fetch_courses(&self) -> Result<Vec<CanvasCourse>, Error> {
        let value = self
            .get_json("/api/v1/courses?enrollment_state=active&include[]=term&per_page=100")
            .await?;
        let courses = decode_records(value, "course");
        info!(count = courses.len(), "fetched Canvas courses");
        Ok(courses)
    }

    /// Assignments for one course, the user's submission included.
    #[instrument(level = "info", skip(self))]
    pub async fn fetch_assignments(&self, course_id: &str) -> Result<Vec<CanvasAssignment>, Error> {
        let value = self
            .get_json(&format!(
                "/api/v1/courses/{course_id}/assignments?include[]=submission&per_page=100"
            ))
            .await?;
        let assignments = decode_records(value, "assignment");
        info!(
            course_id,
            count = assignments.len(),
            "fetched Canvas assignments"
        );
        Ok(assignments)
    }

    /// Whether the token authenticates: `Ok(false)` for a rejected token,
    /// errors only for transport problems.
    pub async fn test_connection(&self) -> Result<bool, Error> {
        match self.get_json("/api/v1/users/self").await {
            Ok(_) => Ok(true),
            Err(Error::Upstream(UpstreamError::UnauthorizedResponse { .. })) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// GET an endpoint through the cache; concurrent calls for the same
    /// endpoint share one network request, and a fresh entry skips the
    /// network entirely.
    async fn get_json(&self, endpoint: &str) -> Result<Value, Error> {
        let key = CacheKey::new(endpoint, &self.token);
        let client = self.client.clone();
        let url = format!("{}{}", self.base_url, endpoint);
        let token = self.token.clone();
        let endpoint_owned = endpoint.to_string();
        let retry = self.retry.clone();

        self.cache
            .fetch(key, move || async move {
                with_backoff(&endpoint_owned, &retry, || {
                    fetch_value(
                        client.clone(),
                        url.clone(),
                        token.clone(),
                        endpoint_owned.clone(),
                    )
                })
                .await
            })
            .await
    }
}

async fn fetch_value(
    client: Client,
    url: String,
    token: String,
    endpoint: String,
) -> Result<Value, Error> {
    let response = client
        .get(&url)
        .bearer_auth(&token)
        .header(header::ACCEPT, CANVAS_ACCEPT)
        .send()
        .await
        .map_err(|e| from_reqwest(e, REQUEST_TIMEOUT))?;

    let status = response.status();
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(UpstreamError::UnauthorizedResponse {
            platform: Platform::Canvas,
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

    let text = response
        .text()
        .await
        .map_err(|e| from_reqwest(e, REQUEST_TIMEOUT))?;
    serde_json::from_str(&text).map_err(|e| {
        warn!(endpoint, error = %e, "Canvas returned a non-JSON success body");
        UpstreamError::UnexpectedStatus {
            status: status.as_u16(),
            endpoint,
        }
        .into()
    })
}

/// Decode a JSON array per record; malformed records are logged and
/// skipped, never failing the batch.
fn decode_records<T: DeserializeOwned>(value: Value, what: &str) -> Vec<T> {
    let Value::Array(items) = value else {
        warn!(what, "expected a JSON array from Canvas");
        return Vec::new();
    };
    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value(item) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(what, error = %e, "skipping malformed Canvas record");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_records_skips_malformed_entries() {
        let value = json!([
            {"id": "1", "name": "Chemistry", "course_code": "CHEM 101", "term": {"name": "Fall 2025"}},
            {"name": "missing id entirely"},
            {"id": "3", "name": "Physics"}
        ]);
        let courses: Vec<CanvasCourse> = decode_records(value, "course");
        assert_eq!(courses.len(), 2);
        assert_eq!(courses[0].id, "1");
        assert_eq!(courses[1].id, "3");
        assert!(courses[1].term.is_none());
    }

    #[test]
    fn test_decode_records_rejects_non_array() {
        let courses: Vec<CanvasCourse> = decode_records(json!({"error": "nope"}), "course");
        assert!(courses.is_empty());
    }

    #[test]
    fn test_decode_assignment_with_submission() {
        let value = json!([{
            "id": "9",
            "name": "Quiz 1",
            "due_at": "2025-07-16T03:59:00Z",
            "points_possible": 10.0,
            "submission": {"workflow_state": "graded", "score": 9.5}
        }]);
        let assignments: Vec<CanvasAssignment> = decode_records(value, "assignment");
        assert_eq!(assignments.len(), 1);
        let submission = assignments[0].submission.as_ref().unwrap();
        assert_eq!(submission.score, Some(9.5));
    }
}
