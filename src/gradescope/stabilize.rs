//! Session stabilization for cookies captured out-of-band.
//!
//! When the session comes from an embedded browser surface instead of the
//! login sequence, the browser may still be writing cookies when the app
//! asks for them. This module polls the cookie source until the cookies
//! required for API calls have actually landed — bounded, never open-ended.
//!
//! Stabilization never fails outright: callers decide whether an incomplete
//! session is acceptable, since partial functionality may still work.

use crate::cookies::CookieStore;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// A surface that cookies are read from, typically an embedded browser's
/// cookie jar. This is the one place genuine non-determinism is expected.
#[allow(async_fn_in_trait)]
pub trait CookieSource {
    /// Current `(name, value)` snapshot of the surface's cookies.
    async fn snapshot(&mut self) -> Vec<(String, String)>;

    /// Issue one navigation/reload side-effect to coax the surface into
    /// flushing pending cookies.
    async fn nudge(&mut self);
}

/// Polling bounds for [`stabilize`].
#[derive(Debug, Clone)]
pub struct StabilizeConfig {
    /// Polls in the first pass.
    pub max_attempts: usize,
    /// Wait between polls.
    pub delay: Duration,
    /// Polls in the shorter pass after the nudge.
    pub retry_attempts: usize,
}

impl Default for StabilizeConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            delay: Duration::from_millis(300),
            retry_attempts: 3,
        }
    }
}

/// Poll `source` until every cookie in `required` is present, or the bounds
/// are exhausted.
///
/// Returns as soon as the set is complete. If the first pass comes up short,
/// one nudge is issued and a shorter pass runs; the more complete of the two
/// results wins. The returned set may still be incomplete — that is the
/// caller's call to make.
#[instrument(level = "info", skip(source, config), fields(required = ?required))]
pub async fn stabilize<S: CookieSource>(
    source: &mut S,
    required: &[&str],
    config: &StabilizeConfig,
) -> CookieStore {
    let first = poll(source, required, config.max_attempts, config.delay).await;
    if first.contains_all(required) {
        info!(cookie_count = first.len(), "session cookies settled");
        return first;
    }

    warn!(
        have = first.len(),
        "required cookies incomplete after first pass; nudging source"
    );
    source.nudge().await;
    let second = poll(source, required, config.retry_attempts, config.delay).await;

    let best = more_complete(first, second, required);
    if best.contains_all(required) {
        info!(cookie_count = best.len(), "session cookies settled after nudge");
    } else {
        warn!(
            cookie_count = best.len(),
            "returning incomplete cookie set; caller decides acceptability"
        );
    }
    best
}

async fn poll<S: CookieSource>(
    source: &mut S,
    required: &[&str],
    attempts: usize,
    delay: Duration,
) -> CookieStore {
    let mut best = CookieStore::new();
    for attempt in 0..attempts {
        if attempt > 0 {
            tokio::time::sleep(delay).await;
        }
        let snapshot = CookieStore::from_pairs(source.snapshot().await);
        debug!(attempt, cookie_count = snapshot.len(), "polled cookie source");
        best = more_complete(best, snapshot, required);
        if best.contains_all(required) {
            return best;
        }
    }
    best
}

/// Prefer the set holding more of the required cookies; ties go to the one
/// with more cookies overall, newest last.
fn more_complete(a: CookieStore, b: CookieStore, required: &[&str]) -> CookieStore {
    let score = |store: &CookieStore| {
        required
            .iter()
            .filter(|name| store.get(name).is_some())
            .count()
    };
    let (sa, sb) = (score(&a), score(&b));
    if sb > sa || (sb == sa && b.len() >= a.len()) {
        b
    } else {
        a
    }
}
