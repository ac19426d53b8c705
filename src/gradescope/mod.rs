//! Gradescope session-and-scrape engine.
//!
//! Gradescope exposes no API; this module drives its ordinary HTML web
//! session programmatically. The flow is split across submodules, each owning
//! one phase:
//!
//! | Phase | Module | Notes |
//! |-------|--------|-------|
//! | Login | [`auth`] | CSRF fetch → credential POST → redirect check |
//! | Cookie settling | [`stabilize`] | For sessions captured from an embedded browser |
//! | HTML parsing | [`extract`] | Course boxes and assignment tables, selector chains |
//! | Orchestration | [`scrape`] | Authenticated GETs, bounded fan-out |
//!
//! # Common patterns
//!
//! - Every request sends a realistic browser `User-Agent`; the site rejects
//!   or degrades without one.
//! - Cookies from the login page, the login POST, and the redirect GET are
//!   one accumulating session, merged by name.
//! - Row-level parse failures are logged and skipped; they never fail a
//!   whole fetch.

pub mod auth;
pub mod extract;
pub mod scrape;
pub mod stabilize;

/// Production base URL. Clients accept an override for tests.
pub const BASE_URL: &str = "https://www.gradescope.com";
