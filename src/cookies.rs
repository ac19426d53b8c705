//! Cookie accumulation across a request chain.
//!
//! Gradescope issues cookies at three points of the login flow: the login
//! page GET, the login POST, and the redirect-target GET. All three feed one
//! accumulating [`CookieStore`]; treating them as independent cookie sets is
//! exactly the bug this type exists to prevent.
//!
//! # Merge rule
//!
//! Given an existing set and a new batch of `Set-Cookie` directives, merge by
//! cookie name: a name present in the new batch overwrites the old value,
//! names absent from the batch are preserved unchanged. Serialization keeps
//! first-seen order and never emits duplicate names.

use std::fmt;

/// Ordered cookie-name → value map with `Set-Cookie` merge semantics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieStore {
    // (name, value), first-seen order.
    cookies: Vec<(String, String)>,
}

impl CookieStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from bare `(name, value)` pairs, e.g. cookies captured
    /// from an embedded browser.
    pub fn from_pairs<I, N, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (N, V)>,
        N: Into<String>,
        V: Into<String>,
    {
        let mut store = Self::new();
        for (name, value) in pairs {
            store.set(name.into(), value.into());
        }
        store
    }

    /// Merge a batch of `Set-Cookie` header values into the store.
    ///
    /// Attributes after the first `;` (path, expiry, HttpOnly, ...) are
    /// dropped; only the leading `name=value` pair matters for replaying the
    /// session. Malformed directives without `=` are ignored.
    pub fn merge<I, S>(&mut self, set_cookie_values: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for directive in set_cookie_values {
            let head = directive
                .as_ref()
                .split(';')
                .next()
                .unwrap_or_default()
                .trim();
            if let Some((name, value)) = head.split_once('=') {
                let name = name.trim();
                if !name.is_empty() {
                    self.set(name.to_string(), value.trim().to_string());
                }
            }
        }
    }

    /// Insert or overwrite a single cookie, preserving first-seen position
    /// on overwrite.
    pub fn set(&mut self, name: String, value: String) {
        match self.cookies.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.cookies.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Whether every named cookie is present.
    pub fn contains_all(&self, names: &[&str]) -> bool {
        names.iter().all(|name| self.get(name).is_some())
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    /// Serialize to a single `Cookie` request-header value in first-seen
    /// order: `name=value; name2=value2`.
    pub fn header(&self) -> String {
        self.cookies
            .iter()
            .map(|(n, v)| format!("{n}={v}"))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

// Display shows names only; values are session secrets and must not land in
// logs.
impl fmt::Display for CookieStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = self
            .cookies
            .iter()
            .map(|(n, _)| n.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        write!(f, "CookieStore[{names}]")
    }
}
