//! Shared test utilities: a counting in-memory content store and a manual clock.
//!
//! # Usage
//!
//! ```rust,ignore
//! use crate::test_helpers::*;
//!
//! let store = StubStore::routes(&[("_type == \"home\"", json!({"heroTitle": "Hi"}))]);
//! let clock = ManualClock::at(0);
//! let fetcher = CachedFetcher::with_clock(&store, &clock);
//! // ... fetch ...
//! clock.advance(3600);
//! assert_eq!(store.calls(), 1);
//! ```

use crate::cache::Clock;
use crate::store::{ContentStore, QueryRequest, StoreError};
use serde_json::Value;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

// =========================================================================
// Stub store
// =========================================================================

enum Reply {
    /// First route whose pattern occurs in the query wins; otherwise null.
    Routes(Vec<(String, Value)>),
    Fail(String),
}

/// In-memory [`ContentStore`] that counts live fetches.
pub struct StubStore {
    reply: Reply,
    calls: AtomicUsize,
    requests: Mutex<Vec<QueryRequest>>,
}

impl StubStore {
    /// Answer every query with `value`.
    pub fn returning(value: Value) -> Self {
        Self::routes(&[("", value)])
    }

    /// Answer queries containing a pattern with its value, others with null.
    pub fn routes(routes: &[(&str, Value)]) -> Self {
        Self::with_reply(Reply::Routes(
            routes
                .iter()
                .map(|(pattern, value)| (pattern.to_string(), value.clone()))
                .collect(),
        ))
    }

    /// Fail every query with a transport error.
    pub fn failing(message: &str) -> Self {
        Self::with_reply(Reply::Fail(message.to_string()))
    }

    fn with_reply(reply: Reply) -> Self {
        Self {
            reply,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Number of live fetches so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every request received, in order.
    pub fn requests(&self) -> Vec<QueryRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl ContentStore for StubStore {
    fn query(&self, request: &QueryRequest) -> Result<Value, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        match &self.reply {
            Reply::Routes(routes) => Ok(routes
                .iter()
                .find(|(pattern, _)| request.query.contains(pattern.as_str()))
                .map(|(_, value)| value.clone())
                .unwrap_or(Value::Null)),
            Reply::Fail(message) => Err(StoreError::Transport(message.clone())),
        }
    }
}

// =========================================================================
// Manual clock
// =========================================================================

/// A [`Clock`] that only moves when told to.
pub struct ManualClock(AtomicU64);

impl ManualClock {
    pub fn at(now: u64) -> Self {
        Self(AtomicU64::new(now))
    }

    pub fn advance(&self, secs: u64) {
        self.0.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}
