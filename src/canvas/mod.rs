//! Canvas REST client.
//!
//! Canvas is the easy half of the aggregation: a documented, token
//! authenticated JSON API. The client still routes every GET through the
//! shared [`RequestCache`](crate::cache::RequestCache) and retry policy so
//! both platforms observe the same caching and backoff contract.

pub mod client;

pub use client::CanvasClient;
