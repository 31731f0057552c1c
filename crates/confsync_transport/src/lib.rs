//! # confsync Transport
//!
//! REST transport contract and retry/backoff wrapper.
//!
//! This crate provides:
//! - The narrow request/response contract the engine consumes
//! - An HTTP-client abstraction so any HTTP library can sit underneath
//! - The retry/backoff wrapper around every call: rate-limit responses are
//!   retried with jittered exponential backoff, everything else non-2xx is
//!   fatal immediately
//! - A scripted mock backend for tests
//!
//! ## Key Invariants
//!
//! - Only HTTP 429 and 503 are ever retried
//! - Retries are bounded; exhausting them is a fatal error
//! - Rate limiting is invisible to callers unless retries are exhausted

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod client;
mod error;
mod http;
mod mock;
mod retry;

pub use client::RestClient;
pub use error::{TransportError, TransportResult};
pub use http::{HttpBackend, HttpRequest, HttpResponse, Method, RestTransport};
pub use mock::MockBackend;
pub use retry::{RetryPolicy, MAX_RETRIES};
